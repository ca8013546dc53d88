//! Conversion between host tensors and backend images.
//!
//! Host images are `f32` arrays in `(height, width, channel)` layout, RGB,
//! normalized to `[0, 1]`. Batches add a leading image axis.

use ndarray::{Array3, Array4, ArrayView3, ArrayView4, Axis};
use thiserror::Error;

use crate::detection::domain::backend_error::BackendError;
use crate::pipeline::face_image::FaceImage;
use crate::shared::image::{ChannelOrder, Image, PLACEHOLDER_SIZE};

pub type HostImage = Array3<f32>;
pub type HostBatch = Array4<f32>;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("expected 3 channels, got {0}")]
    ChannelCount(usize),
    #[error("cannot stack images of different shapes: {0}")]
    Stack(#[from] ndarray::ShapeError),
}

/// Scales to `[0, 255]`, clips, truncates to `u8` and reverses RGB to BGR.
pub fn to_backend(image: ArrayView3<'_, f32>) -> Result<Image, TensorError> {
    let (height, width, channels) = image.dim();
    if channels != Image::CHANNELS {
        return Err(TensorError::ChannelCount(channels));
    }
    let mut data = Vec::with_capacity(height * width * channels);
    for row in image.outer_iter() {
        for px in row.outer_iter() {
            for c in (0..channels).rev() {
                data.push((px[c] * 255.0).clamp(0.0, 255.0) as u8);
            }
        }
    }
    Ok(Image::new(data, width as u32, height as u32, ChannelOrder::Bgr))
}

/// Widens to `f32` and adds a leading batch axis.
///
/// Values stay in the backend's `[0, 255]` range and channel order; no
/// renormalization happens on the way back.
pub fn from_backend(image: &Image) -> HostBatch {
    image
        .as_ndarray()
        .mapv(f32::from)
        .insert_axis(Axis(0))
}

/// Splits a host batch into owned images.
pub fn unstack(batch: ArrayView4<'_, f32>) -> Result<Vec<HostImage>, TensorError> {
    let channels = batch.dim().3;
    if channels != Image::CHANNELS {
        return Err(TensorError::ChannelCount(channels));
    }
    Ok(batch.outer_iter().map(|img| img.to_owned()).collect())
}

/// Stacks same-shaped images into one batch.
pub fn stack(images: &[HostImage]) -> Result<HostBatch, TensorError> {
    let views: Vec<_> = images.iter().map(|i| i.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Concatenates single-image batches along the batch axis.
pub fn concatenate(batches: &[HostBatch]) -> Result<HostBatch, TensorError> {
    let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
    Ok(ndarray::concatenate(Axis(0), &views)?)
}

impl FaceImage for HostImage {
    fn to_backend(&self) -> Result<Image, BackendError> {
        to_backend(self.view()).map_err(|e| BackendError::InvalidImage(e.to_string()))
    }

    fn placeholder() -> Self {
        let size = PLACEHOLDER_SIZE as usize;
        Array3::zeros((size, size, Image::CHANNELS))
    }
}
