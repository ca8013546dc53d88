use crate::detection::domain::backend_error::BackendError;
use crate::shared::image::{ChannelOrder, Image};

/// Anything a pipeline can carry through to its results while handing a
/// backend-form copy to the face backend.
pub trait FaceImage: Clone {
    /// Backend-form (8-bit, BGR) copy of this image.
    ///
    /// Fails with [`BackendError::InvalidImage`] when the image cannot be
    /// represented as 3-channel pixels.
    fn to_backend(&self) -> Result<Image, BackendError>;

    /// Sentinel emitted when a result bucket is empty.
    fn placeholder() -> Self;
}

impl FaceImage for Image {
    fn to_backend(&self) -> Result<Image, BackendError> {
        Ok(self.clone().with_order(ChannelOrder::Bgr))
    }

    fn placeholder() -> Self {
        Image::placeholder()
    }
}
