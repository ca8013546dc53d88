use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use faceverify_core::detection::domain::backend_error::BackendError;
use faceverify_core::detection::infrastructure::onnx_face_detector::{
    OnnxFaceDetector, DEFAULT_CONFIDENCE, SUPPORTED_DETECTOR,
};
use faceverify_core::detection::infrastructure::onnx_face_verifier::{
    OnnxFaceVerifier, SUPPORTED_MODEL,
};
use faceverify_core::pipeline::extract_faces_use_case::ExtractFacesUseCase;
use faceverify_core::pipeline::face_image::FaceImage;
use faceverify_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceverify_core::pipeline::result_assembly::AssembledResult;
use faceverify_core::pipeline::verify_faces_use_case::VerifyFacesUseCase;
use faceverify_core::shared::backend_home::BackendHome;
use faceverify_core::shared::backend_identity::{BackendConfig, DetectorBackend, FaceModel};
use faceverify_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
    IMAGE_EXTENSIONS,
};
use faceverify_core::shared::image::Image;
use faceverify_core::shared::model_resolver;
use faceverify_core::shared::settings::VerifySettings;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Batch face extraction and one-to-many face verification.
#[derive(Parser)]
#[command(name = "faceverify")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory searched for model weights before downloading.
    #[arg(long, global = true)]
    models: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Save every detected face as a 224x224 crop.
    Extract(ExtractArgs),
    /// Verify probe images against a set of reference images.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Input image files or directories.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory the face crops are written to.
    #[arg(long, short)]
    output: PathBuf,

    /// Face detector backend.
    #[arg(long)]
    detector: Option<DetectorBackend>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Probe image files or directories.
    #[arg(long, required = true, num_args = 1..)]
    probe: Vec<PathBuf>,

    /// Reference image files or directories.
    #[arg(long, required = true, num_args = 1..)]
    reference: Vec<PathBuf>,

    /// Average-distance threshold (0.0-1.0); probes strictly below it are verified.
    #[arg(long)]
    threshold: Option<f64>,

    /// Face detector backend.
    #[arg(long)]
    detector: Option<DetectorBackend>,

    /// Face recognition model.
    #[arg(long)]
    model: Option<FaceModel>,

    /// Also write the JSON report to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Persist the effective threshold, detector and model as new defaults.
    #[arg(long)]
    save_settings: bool,
}

/// A decoded input image that remembers where it came from.
#[derive(Clone, Debug)]
struct InputImage {
    path: PathBuf,
    image: Image,
}

impl FaceImage for InputImage {
    fn to_backend(&self) -> Result<Image, BackendError> {
        self.image.to_backend()
    }

    fn placeholder() -> Self {
        Self {
            path: PathBuf::new(),
            image: Image::placeholder(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    threshold: f64,
    detector: DetectorBackend,
    model: FaceModel,
    verified: Vec<ReportEntry>,
    rejected: Vec<ReportEntry>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ReportEntry {
    path: PathBuf,
    distance: f64,
    ratio: f64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let models = cli.models.as_deref();
    match cli.command {
        Command::Extract(args) => run_extract(args, models),
        Command::Verify(args) => run_verify(args, models),
    }
}

fn run_extract(args: ExtractArgs, models: Option<&Path>) -> CliResult<()> {
    let settings = load_settings();
    let detector_backend = args.detector.unwrap_or(settings.detector);

    let inputs = load_images(&args.images)?;
    let detector = build_detector(models)?;
    let mut use_case = ExtractFacesUseCase::new(
        Box::new(detector),
        detector_backend,
        Box::new(StdoutPipelineLogger::default()),
    );
    let faces = use_case.execute(&inputs)?;
    use_case.logger().summary();

    fs::create_dir_all(&args.output)?;
    for (index, face) in faces.iter().enumerate() {
        let path = args.output.join(format!("face_{}.png", index + 1));
        let rgb = face
            .to_rgb_image()
            .ok_or_else(|| format!("Face crop #{} has inconsistent dimensions", index + 1))?;
        rgb.save(&path)?;
    }
    log::info!(
        "Saved {} face crops to {}",
        faces.len(),
        args.output.display()
    );
    Ok(())
}

fn run_verify(args: VerifyArgs, models: Option<&Path>) -> CliResult<()> {
    let mut settings = load_settings();
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    if let Some(detector) = args.detector {
        settings.detector = detector;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }
    settings.validate()?;
    if args.save_settings {
        settings.save()?;
    }

    let probes = load_images(&args.probe)?;
    let references = load_images(&args.reference)?;
    if references.is_empty() {
        return Err("No reference images found".into());
    }

    let detector = build_detector(models)?;
    let embedding_path = resolve_model(EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, models)?;
    let verifier = OnnxFaceVerifier::new(detector, &embedding_path)?;

    let mut use_case = VerifyFacesUseCase::new(
        Box::new(verifier),
        Box::new(StdoutPipelineLogger::default()),
    );
    let config = settings.backend_config();
    let result = use_case.execute(&probes, &references, settings.threshold, &config)?;
    use_case.logger().summary();

    let report = build_report(&settings, &config, &result.verified, &result.rejected);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{json}");
    if let Some(path) = args.report {
        fs::write(&path, &json)?;
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}

/// Settings from the config file, or defaults matched to the bundled backend.
fn load_settings() -> VerifySettings {
    match VerifySettings::default_path() {
        Some(path) if path.exists() => VerifySettings::load_from(&path),
        _ => VerifySettings {
            detector: SUPPORTED_DETECTOR,
            model: SUPPORTED_MODEL,
            ..VerifySettings::default()
        },
    }
}

fn build_report(
    settings: &VerifySettings,
    config: &BackendConfig,
    verified: &AssembledResult<InputImage>,
    rejected: &AssembledResult<InputImage>,
) -> Report {
    Report {
        threshold: settings.threshold,
        detector: config.detector,
        model: config.model,
        verified: report_entries(verified),
        rejected: report_entries(rejected),
    }
}

fn report_entries(bucket: &AssembledResult<InputImage>) -> Vec<ReportEntry> {
    bucket
        .entries()
        .map(|(input, distance, ratio)| ReportEntry {
            path: input.path.clone(),
            distance,
            ratio,
        })
        .collect()
}

fn build_detector(models: Option<&Path>) -> CliResult<OnnxFaceDetector> {
    let model_path = resolve_model(DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, models)?;
    Ok(OnnxFaceDetector::new(&model_path, DEFAULT_CONFIDENCE)?)
}

fn resolve_model(name: &str, url: &str, models: Option<&Path>) -> CliResult<PathBuf> {
    let home = BackendHome::init(None)?;
    log::info!("Resolving model: {name}");
    let label = name.to_string();
    let path = model_resolver::resolve(
        name,
        url,
        home,
        models,
        Some(Box::new(move |downloaded, total| {
            download_progress(&label, downloaded, total)
        })),
    )?;
    Ok(path)
}

/// Decodes every image named by `paths`, expanding directories in name order.
fn load_images(paths: &[PathBuf]) -> CliResult<Vec<InputImage>> {
    let files = collect_inputs(paths)?;
    files
        .into_iter()
        .map(|path| {
            let decoded = image::open(&path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            Ok(InputImage {
                image: Image::from_rgb_image(decoded.to_rgb8()),
                path,
            })
        })
        .collect()
}

fn collect_inputs(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            entries.sort();
            files.extend(entries);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
