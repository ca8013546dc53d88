pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Directory name used under the platform cache/config roots.
pub const APP_DIR_NAME: &str = "FaceVerify";

/// Side length of every face crop produced by extraction.
pub const FACE_CROP_SIZE: u32 = 224;

/// Average-distance threshold below which a probe counts as verified.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
