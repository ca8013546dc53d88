/// ArcFace embedding-based face verifier using ONNX Runtime.
///
/// Each image is reduced to its largest detected face, embedded, and the
/// pair is compared by cosine distance against the model's own threshold.
use std::path::Path;

use crate::detection::domain::backend_error::BackendError;
use crate::detection::domain::face_verifier::{Comparison, FaceVerifier};
use crate::shared::backend_identity::{BackendConfig, FaceModel};
use crate::shared::image::Image;

use super::execution_provider::preferred_execution_providers;
use super::math::{cosine_distance, l2_normalize};
use super::onnx_face_detector::{ensure_outputs, OnnxFaceDetector, SUPPORTED_DETECTOR};

/// Embedding model identity served by the bundled ArcFace weights.
pub const SUPPORTED_MODEL: FaceModel = FaceModel::ArcFace;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxFaceVerifier {
    detector: OnnxFaceDetector,
    session: ort::session::Session,
}

impl OnnxFaceVerifier {
    pub fn new(detector: OnnxFaceDetector, model_path: &Path) -> Result<Self, BackendError> {
        let load_err =
            |e: String| BackendError::ModelLoad(format!("{}: {e}", model_path.display()));
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()
            .map_err(|e| load_err(e.to_string()))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(e.to_string()))?
            .with_intra_threads(intra_threads)
            .map_err(|e| load_err(e.to_string()))?
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| load_err(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(e.to_string()))?;
        Ok(Self { detector, session })
    }

    /// Embedding of the largest face in `image`.
    ///
    /// Without enforced detection a face-less image is embedded whole.
    fn represent(
        &mut self,
        image: &Image,
        enforce_detection: bool,
    ) -> Result<Vec<f32>, BackendError> {
        let boxes = self.detector.detect_boxes(image)?;
        let largest = boxes
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()));

        let face = match largest {
            Some(b) => b.crop(image),
            None if enforce_detection => return Err(BackendError::NoFaceDetected),
            None => image.clone(),
        };
        self.embed(&face)
    }

    fn embed(&mut self, face: &Image) -> Result<Vec<f32>, BackendError> {
        let tensor = preprocess(face)?;
        let input_value = ort::value::Tensor::from_array(tensor).map_err(inference)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference)?;
        ensure_outputs(outputs.len(), "ArcFace")?;
        let embedding_array = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or_else(|| BackendError::Inference("cannot get embedding slice".into()))?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceVerifier for OnnxFaceVerifier {
    fn verify(
        &mut self,
        reference: &Image,
        probe: &Image,
        config: &BackendConfig,
        enforce_detection: bool,
    ) -> Result<Comparison, BackendError> {
        if config.detector != SUPPORTED_DETECTOR {
            return Err(BackendError::UnsupportedDetector(config.detector));
        }
        if config.model != SUPPORTED_MODEL {
            return Err(BackendError::UnsupportedModel(config.model));
        }

        let a = self.represent(reference, enforce_detection)?;
        let b = self.represent(probe, enforce_detection)?;
        Ok(compare(&a, &b, config.model))
    }
}

/// Distance and the backend's own match decision for two embeddings.
fn compare(a: &[f32], b: &[f32], model: FaceModel) -> Comparison {
    let distance = cosine_distance(a, b);
    Comparison {
        distance,
        verified: distance <= model.cosine_threshold(),
    }
}

fn inference(e: impl std::fmt::Display) -> BackendError {
    BackendError::Inference(e.to_string())
}

/// Resize face to 112x112, normalize, NCHW layout in RGB order.
fn preprocess(face: &Image) -> Result<ndarray::Array4<f32>, BackendError> {
    if face.is_empty() {
        return Err(BackendError::InvalidImage("empty face crop".into()));
    }
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let rgb = face.rgb_at(src_y, src_x);
            for (c, v) in rgb.iter().enumerate() {
                tensor[[0, c, y, x]] = (*v as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    Ok(tensor)
}
