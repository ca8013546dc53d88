use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::backend_home::BackendHome;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create weights directory: {0}")]
    WeightsDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve model weights by file name.
///
/// Resolution order:
/// 1. The backend home's `weights/` directory
/// 2. Bundled path (for development / pre-packaged installs)
/// 3. Download from URL into the backend home
pub fn resolve(
    name: &str,
    url: &str,
    home: &BackendHome,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let weights_dir = home.weights_dir();
    let cached_path = weights_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    fs::create_dir_all(&weights_dir).map_err(ModelResolveError::WeightsDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let bytes = response.bytes().map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let write_err = |source| ModelResolveError::Write {
        path: temp_path.clone(),
        source,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let chunk_size = 1024 * 1024;
    for chunk in bytes.chunks(chunk_size) {
        file.write_all(chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE_URL: &str = "http://invalid.nonexistent.example.com/model.onnx";

    #[test]
    fn test_resolve_prefers_weights_dir() {
        let tmp = TempDir::new().unwrap();
        let home = BackendHome::create(tmp.path()).unwrap();
        let model_path = home.weights_dir().join("model.onnx");
        fs::write(&model_path, b"cached").unwrap();

        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("model.onnx"), b"bundled").unwrap();

        let resolved = resolve("model.onnx", UNREACHABLE_URL, &home, Some(&bundled), None).unwrap();
        assert_eq!(resolved, model_path);
    }

    #[test]
    fn test_resolve_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let home = BackendHome::create(&tmp.path().join("home")).unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("model.onnx"), b"bundled").unwrap();

        let resolved = resolve("model.onnx", UNREACHABLE_URL, &home, Some(&bundled), None).unwrap();
        assert_eq!(resolved, bundled.join("model.onnx"));
    }

    #[test]
    fn test_resolve_download_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let home = BackendHome::create(tmp.path()).unwrap();
        let result = resolve("model.onnx", UNREACHABLE_URL, &home, None, None);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let _ = download(UNREACHABLE_URL, &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
