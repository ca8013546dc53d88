//! Batch-in, batch-out surface for tensor-based hosts.
//!
//! Wraps the extraction and verification use cases so a host can pass
//! whole image batches and receive batches back.

use ndarray::{Array4, ArrayView4};
use thiserror::Error;

use crate::detection::domain::backend_error::BackendError;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_verifier::FaceVerifier;
use crate::host::tensor::{self, HostBatch, HostImage, TensorError};
use crate::pipeline::extract_faces_use_case::ExtractFacesUseCase;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::result_assembly::AssembledResult;
use crate::pipeline::verify_faces_use_case::{VerifyError, VerifyFacesUseCase};
use crate::shared::backend_identity::{BackendConfig, DetectorBackend, FaceModel};
use crate::shared::constants::FACE_CROP_SIZE;
use crate::shared::image::Image;

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// "Extract faces from an image batch".
pub struct ExtractFacesNode {
    use_case: ExtractFacesUseCase,
}

impl ExtractFacesNode {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        detector_backend: DetectorBackend,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            use_case: ExtractFacesUseCase::new(detector, detector_backend, logger),
        }
    }

    /// Returns every crop as one batch; a zero-length batch when no face was found.
    pub fn run(&mut self, images: ArrayView4<'_, f32>) -> Result<HostBatch, HostError> {
        let images = tensor::unstack(images)?;
        let faces = self.use_case.execute(&images)?;
        if faces.is_empty() {
            let size = FACE_CROP_SIZE as usize;
            return Ok(Array4::zeros((0, size, size, Image::CHANNELS)));
        }
        let batches: Vec<HostBatch> = faces.iter().map(tensor::from_backend).collect();
        Ok(tensor::concatenate(&batches)?)
    }
}

/// Output of [`VerifyFacesNode::run`]: two image batches plus their metadata.
///
/// `*_distance_labels` hold the same distances rendered with three decimals
/// for hosts that display them as text.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyNodeOutput {
    pub verified_images: HostBatch,
    pub verified_distances: Vec<f64>,
    pub verified_distance_labels: Vec<String>,
    pub verified_ratios: Vec<f64>,
    pub rejected_images: HostBatch,
    pub rejected_distances: Vec<f64>,
    pub rejected_distance_labels: Vec<String>,
    pub rejected_ratios: Vec<f64>,
}

/// "Verify a probe batch against a reference batch".
pub struct VerifyFacesNode {
    use_case: VerifyFacesUseCase,
}

impl VerifyFacesNode {
    pub fn new(verifier: Box<dyn FaceVerifier>, logger: Box<dyn PipelineLogger>) -> Self {
        Self {
            use_case: VerifyFacesUseCase::new(verifier, logger),
        }
    }

    /// Verified and rejected probes come back as the original host images.
    pub fn run(
        &mut self,
        images: ArrayView4<'_, f32>,
        reference_images: ArrayView4<'_, f32>,
        threshold: f64,
        detector: DetectorBackend,
        model: FaceModel,
    ) -> Result<VerifyNodeOutput, HostError> {
        let probes = tensor::unstack(images)?;
        let references = tensor::unstack(reference_images)?;
        let config = BackendConfig::new(detector, model);

        let result = self
            .use_case
            .execute(&probes, &references, threshold, &config)?;

        let verified = BucketBatch::from_result(result.verified)?;
        let rejected = BucketBatch::from_result(result.rejected)?;
        Ok(VerifyNodeOutput {
            verified_images: verified.images,
            verified_distances: verified.distances,
            verified_distance_labels: verified.labels,
            verified_ratios: verified.ratios,
            rejected_images: rejected.images,
            rejected_distances: rejected.distances,
            rejected_distance_labels: rejected.labels,
            rejected_ratios: rejected.ratios,
        })
    }
}

struct BucketBatch {
    images: HostBatch,
    distances: Vec<f64>,
    labels: Vec<String>,
    ratios: Vec<f64>,
}

impl BucketBatch {
    fn from_result(result: AssembledResult<HostImage>) -> Result<Self, TensorError> {
        let labels = result.formatted_distances();
        Ok(Self {
            images: tensor::stack(&result.images)?,
            distances: result.distances,
            labels,
            ratios: result.ratios,
        })
    }
}
