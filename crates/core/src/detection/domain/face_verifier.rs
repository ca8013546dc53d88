use crate::detection::domain::backend_error::BackendError;
use crate::shared::backend_identity::BackendConfig;
use crate::shared::image::Image;

/// Outcome of comparing one probe against one reference.
///
/// `verified` is the backend's own decision and is independent of any
/// threshold applied by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Comparison {
    pub distance: f64,
    pub verified: bool,
}

/// Domain interface for the same-identity check between two images.
///
/// Implementations may hold mutable inference sessions, hence `&mut self`.
pub trait FaceVerifier: Send {
    fn verify(
        &mut self,
        reference: &Image,
        probe: &Image,
        config: &BackendConfig,
        enforce_detection: bool,
    ) -> Result<Comparison, BackendError>;
}
