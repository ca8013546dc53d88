use std::time::Instant;

use crate::detection::domain::backend_error::BackendError;
use crate::detection::domain::face_detector::{DetectOptions, FaceDetector};
use crate::pipeline::face_image::FaceImage;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::backend_identity::DetectorBackend;
use crate::shared::constants::FACE_CROP_SIZE;
use crate::shared::image::Image;

/// Detects every face in a batch of images and returns all crops flattened.
///
/// Output order is input order, then detection order within an image.
/// Detection failures on a single image are logged and skipped; only
/// configuration errors (unsupported detector, unloadable model) and
/// images that cannot be converted to backend form abort.
pub struct ExtractFacesUseCase {
    detector: Box<dyn FaceDetector>,
    options: DetectOptions,
    logger: Box<dyn PipelineLogger>,
}

impl ExtractFacesUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        detector_backend: DetectorBackend,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            detector,
            options: DetectOptions {
                detector: detector_backend,
                target_size: (FACE_CROP_SIZE, FACE_CROP_SIZE),
                enforce_detection: false,
            },
            logger,
        }
    }

    pub fn options(&self) -> &DetectOptions {
        &self.options
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn execute<T: FaceImage>(&mut self, images: &[T]) -> Result<Vec<Image>, BackendError> {
        let mut faces = Vec::new();
        self.logger.begin(images.len());

        for (index, image) in images.iter().enumerate() {
            let backend_image = image.to_backend()?;
            let started = Instant::now();
            let result = self.detector.extract_faces(&backend_image, &self.options);
            self.logger.timing("detect", started.elapsed().as_secs_f64() * 1000.0);

            match result {
                Ok(detected) => {
                    log::debug!("Image #{}: {} face(s)", index + 1, detected.len());
                    faces.extend(detected.into_iter().map(|d| d.face));
                }
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => log::warn!("Image #{}: detection failed, skipping: {e}", index + 1),
            }
            self.logger.advance();
        }

        self.logger.info(&format!(
            "Extracted {} face(s) from {} image(s)",
            faces.len(),
            images.len()
        ));
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::DetectedFace;
    use crate::host::tensor::HostImage;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::image::ChannelOrder;
    use ndarray::Array3;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    enum Outcome {
        Faces(Vec<u8>),
        Fail,
    }

    /// Keyed by the first byte of each input image; each face crop is
    /// filled with its tag byte.
    struct StubDetector {
        outcomes: HashMap<u8, Outcome>,
        seen: Arc<Mutex<Vec<DetectOptions>>>,
    }

    impl StubDetector {
        fn new(outcomes: HashMap<u8, Outcome>) -> Self {
            Self {
                outcomes,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceDetector for StubDetector {
        fn extract_faces(
            &mut self,
            image: &Image,
            options: &DetectOptions,
        ) -> Result<Vec<DetectedFace>, BackendError> {
            assert_eq!(image.order(), ChannelOrder::Bgr);
            self.seen.lock().unwrap().push(*options);
            match self.outcomes.get(&image.data()[0]) {
                Some(Outcome::Faces(tags)) => Ok(tags
                    .iter()
                    .map(|&t| DetectedFace {
                        face: crop(t),
                        confidence: 0.9,
                    })
                    .collect()),
                Some(Outcome::Fail) => Err(BackendError::Inference("detector crashed".into())),
                None => Ok(Vec::new()),
            }
        }
    }

    struct UnsupportedDetector;

    impl FaceDetector for UnsupportedDetector {
        fn extract_faces(
            &mut self,
            _image: &Image,
            options: &DetectOptions,
        ) -> Result<Vec<DetectedFace>, BackendError> {
            Err(BackendError::UnsupportedDetector(options.detector))
        }
    }

    // --- Helpers ---

    fn image(tag: u8) -> Image {
        Image::filled(8, 8, tag, ChannelOrder::Bgr)
    }

    fn crop(tag: u8) -> Image {
        Image::filled(FACE_CROP_SIZE, FACE_CROP_SIZE, tag, ChannelOrder::Bgr)
    }

    fn use_case(detector: impl FaceDetector + 'static) -> ExtractFacesUseCase {
        ExtractFacesUseCase::new(
            Box::new(detector),
            DetectorBackend::RetinaFace,
            Box::new(NullPipelineLogger),
        )
    }

    // --- Tests ---

    #[test]
    fn test_concatenates_in_input_then_detection_order() {
        let outcomes = HashMap::from([
            (1, Outcome::Faces(vec![10, 11])),
            (2, Outcome::Faces(vec![])),
            (3, Outcome::Faces(vec![30])),
        ]);
        let mut uc = use_case(StubDetector::new(outcomes));

        let faces = uc.execute(&[image(1), image(2), image(3)]).unwrap();

        assert_eq!(faces, vec![crop(10), crop(11), crop(30)]);
    }

    #[test]
    fn test_failure_on_one_image_does_not_abort() {
        let outcomes = HashMap::from([
            (1, Outcome::Fail),
            (2, Outcome::Faces(vec![20])),
        ]);
        let mut uc = use_case(StubDetector::new(outcomes));

        let faces = uc.execute(&[image(1), image(2)]).unwrap();

        assert_eq!(faces, vec![crop(20)]);
    }

    #[test]
    fn test_no_faces_yields_empty_sequence() {
        let mut uc = use_case(StubDetector::new(HashMap::new()));
        assert!(uc.execute(&[image(1), image(2)]).unwrap().is_empty());
        assert!(uc.execute::<Image>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_requests_tolerant_detection_at_crop_size() {
        let detector = StubDetector::new(HashMap::new());
        let seen = detector.seen.clone();
        let mut uc = use_case(detector);

        uc.execute(&[image(1)]).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target_size, (224, 224));
        assert_eq!(seen[0].detector, DetectorBackend::RetinaFace);
        assert!(!seen[0].enforce_detection);
    }

    #[test]
    fn test_configuration_error_aborts() {
        let mut uc = use_case(UnsupportedDetector);
        let err = uc.execute(&[image(1), image(2)]).unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedDetector(DetectorBackend::RetinaFace)
        ));
    }

    #[test]
    fn test_rgb_inputs_are_swapped_before_detection() {
        let outcomes = HashMap::from([(5, Outcome::Faces(vec![50]))]);
        let mut uc = use_case(StubDetector::new(outcomes));
        // RGB [0, 0, 5] becomes BGR [5, 0, 0]
        let rgb = Image::new([0, 0, 5].repeat(4), 2, 2, ChannelOrder::Rgb);

        let faces = uc.execute(&[rgb]).unwrap();

        assert_eq!(faces, vec![crop(50)]);
    }

    #[test]
    fn test_malformed_host_image_aborts() {
        let detector = StubDetector::new(HashMap::new());
        let seen = detector.seen.clone();
        let mut uc = use_case(detector);
        let images: Vec<HostImage> = vec![
            Array3::from_elem((8, 8, 3), 0.5),
            Array3::zeros((8, 8, 4)),
        ];

        let err = uc.execute(&images).unwrap_err();

        assert!(matches!(err, BackendError::InvalidImage(_)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
