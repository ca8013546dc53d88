use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum BackendHomeError {
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("failed to create backend home {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

static HOME: OnceLock<BackendHome> = OnceLock::new();

/// Root directory where the face backend keeps its model weights.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendHome {
    root: PathBuf,
}

impl BackendHome {
    /// Creates `<root>/weights` if missing. Safe to call repeatedly.
    pub fn create(root: &Path) -> Result<Self, BackendHomeError> {
        let home = Self {
            root: root.to_path_buf(),
        };
        let weights = home.weights_dir();
        fs::create_dir_all(&weights).map_err(|source| BackendHomeError::Create {
            path: weights,
            source,
        })?;
        Ok(home)
    }

    /// Process-wide home, provisioned on first call.
    ///
    /// `root` is only consulted by the first successful call; later calls
    /// return the already-provisioned home.
    pub fn init(root: Option<&Path>) -> Result<&'static BackendHome, BackendHomeError> {
        if let Some(home) = HOME.get() {
            return Ok(home);
        }
        let root = match root {
            Some(r) => r.to_path_buf(),
            None => default_root()?,
        };
        let home = Self::create(&root)?;
        log::debug!("Backend home provisioned at {}", home.root.display());
        Ok(HOME.get_or_init(|| home))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn weights_dir(&self) -> PathBuf {
        self.root.join("weights")
    }
}

/// Platform cache root: `$XDG_CACHE_HOME/FaceVerify`, `~/Library/Caches/FaceVerify`, ...
pub fn default_root() -> Result<PathBuf, BackendHomeError> {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or(BackendHomeError::NoCacheDir)
}
