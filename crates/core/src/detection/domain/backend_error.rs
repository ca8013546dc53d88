use thiserror::Error;

use crate::shared::backend_identity::{DetectorBackend, FaceModel};

/// Failure reported by a face detection or verification backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("detector backend '{0}' is not supported by this backend")]
    UnsupportedDetector(DetectorBackend),
    #[error("face model '{0}' is not supported by this backend")]
    UnsupportedModel(FaceModel),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("malformed image: {0}")]
    InvalidImage(String),
    #[error("no face detected in image")]
    NoFaceDetected,
}

impl BackendError {
    /// Errors caused by how the backend was set up rather than by one input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BackendError::UnsupportedDetector(_)
                | BackendError::UnsupportedModel(_)
                | BackendError::ModelLoad(_)
        )
    }
}
