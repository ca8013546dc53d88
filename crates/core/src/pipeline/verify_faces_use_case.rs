use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::backend_error::BackendError;
use crate::detection::domain::face_verifier::FaceVerifier;
use crate::pipeline::face_image::FaceImage;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::probe_aggregate::{Bucket, ProbeAccumulator};
use crate::pipeline::result_assembly::{assemble, AssembledResult, ScoredImage};
use crate::shared::backend_identity::BackendConfig;
use crate::shared::image::Image;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("reference set is empty; at least one reference image is required")]
    EmptyReferences,
    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f64),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Both buckets of a verification run, each assembled independently.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationResult<T> {
    pub verified: AssembledResult<T>,
    pub rejected: AssembledResult<T>,
}

/// Compares every probe against every reference and buckets probes by
/// their average distance.
///
/// Comparisons run probe-major and strictly in sequence. A backend failure
/// aborts the whole batch; no partial result is returned.
pub struct VerifyFacesUseCase {
    verifier: Box<dyn FaceVerifier>,
    logger: Box<dyn PipelineLogger>,
}

impl VerifyFacesUseCase {
    pub fn new(verifier: Box<dyn FaceVerifier>, logger: Box<dyn PipelineLogger>) -> Self {
        Self { verifier, logger }
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn execute<T: FaceImage>(
        &mut self,
        probes: &[T],
        references: &[T],
        threshold: f64,
        config: &BackendConfig,
    ) -> Result<VerificationResult<T>, VerifyError> {
        if references.is_empty() {
            return Err(VerifyError::EmptyReferences);
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(VerifyError::InvalidThreshold(threshold));
        }

        let backend_refs = references
            .iter()
            .map(FaceImage::to_backend)
            .collect::<Result<Vec<Image>, _>>()?;

        let mut verified = Vec::new();
        let mut rejected = Vec::new();

        self.logger.begin(probes.len() * backend_refs.len());
        self.logger.info(&format!(
            "Verifying {} probe(s) against {} reference(s) with {}/{}",
            probes.len(),
            backend_refs.len(),
            config.detector,
            config.model
        ));

        for (probe_index, probe) in probes.iter().enumerate() {
            let backend_probe = probe.to_backend()?;
            let mut acc = ProbeAccumulator::new();

            for (ref_index, reference) in backend_refs.iter().enumerate() {
                let started = Instant::now();
                let comparison = self.verifier.verify(reference, &backend_probe, config, false)?;
                self.logger.timing("verify", started.elapsed().as_secs_f64() * 1000.0);

                log::debug!(
                    "Probe #{}: distance to reference #{}: {:.4} ({})",
                    probe_index + 1,
                    ref_index + 1,
                    comparison.distance,
                    comparison.verified
                );
                acc.push(&comparison);
                self.logger.advance();
            }

            // Non-empty references guarantee at least one comparison.
            let Some(aggregate) = acc.finish() else {
                return Err(VerifyError::EmptyReferences);
            };
            log::info!(
                "Probe #{}: average distance {:.4}, verified ratio {:.2}",
                probe_index + 1,
                aggregate.average_distance,
                aggregate.verified_ratio
            );

            let scored = ScoredImage {
                image: probe.clone(),
                average_distance: aggregate.average_distance,
                verified_ratio: aggregate.verified_ratio,
            };
            match aggregate.classify(threshold) {
                Bucket::Verified => verified.push(scored),
                Bucket::Rejected => rejected.push(scored),
            }
        }

        self.logger.info(&format!(
            "{} verified, {} rejected",
            verified.len(),
            rejected.len()
        ));

        Ok(VerificationResult {
            verified: assemble(verified),
            rejected: assemble(rejected),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_verifier::Comparison;
    use crate::host::tensor::HostImage;
    use crate::shared::backend_identity::{DetectorBackend, FaceModel};
    use crate::shared::image::ChannelOrder;
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    /// Looks up comparisons by (reference tag, probe tag), where the tag is
    /// the first byte of the image data.
    struct StubVerifier {
        results: HashMap<(u8, u8), Comparison>,
        calls: Arc<Mutex<Vec<(u8, u8)>>>,
        fail_on: Option<(u8, u8)>,
    }

    impl StubVerifier {
        fn new(results: HashMap<(u8, u8), Comparison>) -> Self {
            Self {
                results,
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_on: None,
            }
        }
    }

    impl FaceVerifier for StubVerifier {
        fn verify(
            &mut self,
            reference: &Image,
            probe: &Image,
            _config: &BackendConfig,
            enforce_detection: bool,
        ) -> Result<Comparison, BackendError> {
            assert!(!enforce_detection);
            assert_eq!(reference.order(), ChannelOrder::Bgr);
            assert_eq!(probe.order(), ChannelOrder::Bgr);
            let key = (reference.data()[0], probe.data()[0]);
            self.calls.lock().unwrap().push(key);
            if self.fail_on == Some(key) {
                return Err(BackendError::InvalidImage("unreadable".into()));
            }
            Ok(self.results.get(&key).copied().unwrap_or(Comparison {
                distance: 1.0,
                verified: false,
            }))
        }
    }

    #[derive(Default)]
    struct Recorded {
        total: Option<usize>,
        steps: usize,
    }

    struct RecordingLogger(Arc<Mutex<Recorded>>);

    impl PipelineLogger for RecordingLogger {
        fn begin(&mut self, total_steps: usize) {
            self.0.lock().unwrap().total = Some(total_steps);
        }
        fn advance(&mut self) {
            self.0.lock().unwrap().steps += 1;
        }
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn info(&mut self, _message: &str) {}
    }

    // --- Helpers ---

    fn image(tag: u8) -> Image {
        Image::filled(4, 4, tag, ChannelOrder::Bgr)
    }

    fn cmp(distance: f64, verified: bool) -> Comparison {
        Comparison { distance, verified }
    }

    fn config() -> BackendConfig {
        BackendConfig::new(DetectorBackend::RetinaFace, FaceModel::Facenet512)
    }

    fn use_case(verifier: StubVerifier) -> (VerifyFacesUseCase, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let logger = RecordingLogger(recorded.clone());
        (
            VerifyFacesUseCase::new(Box::new(verifier), Box::new(logger)),
            recorded,
        )
    }

    // --- Tests ---

    #[test]
    fn test_single_reference_two_probes_split_by_threshold() {
        let results = HashMap::from([
            ((100, 1), cmp(0.5, false)),
            ((100, 2), cmp(0.2, true)),
        ]);
        let (mut uc, _) = use_case(StubVerifier::new(results));

        let result = uc
            .execute(&[image(1), image(2)], &[image(100)], 0.3, &config())
            .unwrap();

        assert_eq!(result.verified.images, vec![image(2)]);
        assert_eq!(result.verified.distances, vec![0.2]);
        assert_eq!(result.verified.ratios, vec![1.0]);
        assert_eq!(result.rejected.images, vec![image(1)]);
        assert_eq!(result.rejected.distances, vec![0.5]);
        assert_eq!(result.rejected.ratios, vec![0.0]);
    }

    #[test]
    fn test_ratio_over_three_references() {
        let results = HashMap::from([
            ((100, 1), cmp(0.1, true)),
            ((101, 1), cmp(0.2, true)),
            ((102, 1), cmp(0.3, false)),
        ]);
        let (mut uc, _) = use_case(StubVerifier::new(results));

        let result = uc
            .execute(
                &[image(1)],
                &[image(100), image(101), image(102)],
                0.5,
                &config(),
            )
            .unwrap();

        assert_relative_eq!(result.verified.distances[0], 0.2);
        assert_relative_eq!(result.verified.ratios[0], 0.67);
        assert!(result.rejected.is_placeholder());
    }

    #[test]
    fn test_distance_equal_to_threshold_is_rejected() {
        let results = HashMap::from([((100, 1), cmp(0.25, true))]);
        let (mut uc, _) = use_case(StubVerifier::new(results));

        let result = uc
            .execute(&[image(1)], &[image(100)], 0.25, &config())
            .unwrap();

        assert!(result.verified.is_placeholder());
        assert_eq!(result.rejected.images, vec![image(1)]);
    }

    #[test]
    fn test_buckets_partition_probes_and_are_sorted() {
        let results = HashMap::from([
            ((100, 1), cmp(0.40, false)),
            ((100, 2), cmp(0.05, true)),
            ((100, 3), cmp(0.90, false)),
            ((100, 4), cmp(0.15, true)),
            ((100, 5), cmp(0.40, false)),
        ]);
        let (mut uc, _) = use_case(StubVerifier::new(results));
        let probes: Vec<_> = (1..=5).map(image).collect();

        let result = uc.execute(&probes, &[image(100)], 0.3, &config()).unwrap();

        assert_eq!(result.verified.len() + result.rejected.len(), probes.len());
        assert_eq!(result.verified.images, vec![image(2), image(4)]);
        // equal distances keep probe order
        assert_eq!(result.rejected.images, vec![image(1), image(5), image(3)]);
        assert!(result.rejected.distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_probes_yield_two_placeholders() {
        let (mut uc, recorded) = use_case(StubVerifier::new(HashMap::new()));

        let result = uc.execute(&[], &[image(100)], 0.3, &config()).unwrap();

        for bucket in [&result.verified, &result.rejected] {
            assert_eq!(bucket.images, vec![Image::placeholder()]);
            assert!(bucket.distances.is_empty());
            assert!(bucket.ratios.is_empty());
        }
        assert_eq!(recorded.lock().unwrap().total, Some(0));
    }

    #[test]
    fn test_empty_references_rejected_before_any_call() {
        let verifier = StubVerifier::new(HashMap::new());
        let calls = verifier.calls.clone();
        let (mut uc, recorded) = use_case(verifier);

        let err = uc.execute(&[image(1)], &[], 0.3, &config()).unwrap_err();

        assert!(matches!(err, VerifyError::EmptyReferences));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(recorded.lock().unwrap().total, None);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let (mut uc, _) = use_case(StubVerifier::new(HashMap::new()));
        let err = uc
            .execute(&[image(1)], &[image(100)], 1.5, &config())
            .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidThreshold(t) if t == 1.5));
    }

    #[test]
    fn test_comparisons_are_probe_major() {
        let verifier = StubVerifier::new(HashMap::new());
        let calls = verifier.calls.clone();
        let (mut uc, _) = use_case(verifier);

        uc.execute(&[image(1), image(2)], &[image(100), image(101)], 0.3, &config())
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(100, 1), (101, 1), (100, 2), (101, 2)]
        );
    }

    #[test]
    fn test_progress_counts_every_comparison() {
        let (mut uc, recorded) = use_case(StubVerifier::new(HashMap::new()));

        uc.execute(
            &[image(1), image(2), image(3)],
            &[image(100), image(101)],
            0.3,
            &config(),
        )
        .unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.total, Some(6));
        assert_eq!(recorded.steps, 6);
    }

    #[test]
    fn test_backend_failure_aborts_batch() {
        let mut verifier = StubVerifier::new(HashMap::new());
        verifier.fail_on = Some((100, 2));
        let calls = verifier.calls.clone();
        let (mut uc, _) = use_case(verifier);

        let err = uc
            .execute(&[image(1), image(2), image(3)], &[image(100)], 0.3, &config())
            .unwrap_err();

        assert!(matches!(
            err,
            VerifyError::Backend(BackendError::InvalidImage(_))
        ));
        // probe 3 is never compared
        assert_eq!(*calls.lock().unwrap(), vec![(100, 1), (100, 2)]);
    }

    #[test]
    fn test_rgb_inputs_are_returned_unchanged() {
        let probe = Image::new(vec![9, 0, 0].repeat(4), 2, 2, ChannelOrder::Rgb);
        let reference = Image::new(vec![7, 0, 0].repeat(4), 2, 2, ChannelOrder::Rgb);
        // After the BGR swap the verifier sees tags 0 (first byte of [0, 0, 9])
        let results = HashMap::from([((0, 0), cmp(0.1, true))]);
        let (mut uc, _) = use_case(StubVerifier::new(results));

        let result = uc
            .execute(&[probe.clone()], &[reference], 0.3, &config())
            .unwrap();

        assert_eq!(result.verified.images, vec![probe]);
    }

    #[test]
    fn test_four_channel_host_probe_is_rejected() {
        let verifier = StubVerifier::new(HashMap::new());
        let calls = verifier.calls.clone();
        let (mut uc, _) = use_case(verifier);
        let probe: HostImage = Array3::zeros((8, 8, 4));
        let reference: HostImage = Array3::from_elem((8, 8, 3), 0.5);

        let err = uc
            .execute(&[probe], &[reference], 0.3, &config())
            .unwrap_err();

        assert!(matches!(
            err,
            VerifyError::Backend(BackendError::InvalidImage(_))
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_channel_host_reference_is_rejected_before_any_call() {
        let verifier = StubVerifier::new(HashMap::new());
        let calls = verifier.calls.clone();
        let (mut uc, recorded) = use_case(verifier);
        let probe: HostImage = Array3::from_elem((8, 8, 3), 0.5);
        let reference: HostImage = Array3::zeros((8, 8, 1));

        let result = uc.execute(&[probe], &[reference], 0.3, &config());

        assert!(result.is_err());
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(recorded.lock().unwrap().total, None);
    }
}
