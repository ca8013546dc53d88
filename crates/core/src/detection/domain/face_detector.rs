use crate::detection::domain::backend_error::BackendError;
use crate::shared::backend_identity::DetectorBackend;
use crate::shared::image::Image;

/// One face found by a detector, already cropped and resized.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub face: Image,
    pub confidence: f64,
}

/// Per-call detection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectOptions {
    pub detector: DetectorBackend,
    pub target_size: (u32, u32),
    /// When false, an image without faces yields an empty list instead of an error.
    pub enforce_detection: bool,
}

/// Domain interface for the detect-and-crop capability.
///
/// Input images are in backend (BGR) order; crops are returned in the same
/// order, in the detector's own detection order.
pub trait FaceDetector: Send {
    fn extract_faces(
        &mut self,
        image: &Image,
        options: &DetectOptions,
    ) -> Result<Vec<DetectedFace>, BackendError>;
}
