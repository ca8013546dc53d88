/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, NMS post-processing and
/// cropping of each detected face to the requested size.
use std::path::Path;

use crate::detection::domain::backend_error::BackendError;
use crate::detection::domain::face_detector::{DetectOptions, DetectedFace, FaceDetector};
use crate::shared::backend_identity::DetectorBackend;
use crate::shared::image::Image;

use super::execution_provider::preferred_execution_providers;
use super::math::bbox_iou;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Detector identity served by the bundled YOLO model.
///
/// The weights are a YOLO11 face/pose model (`yolo11n-pose_widerface.onnx`);
/// `yolov8` is the closest selectable identity and acts as its alias.
pub const SUPPORTED_DETECTOR: DetectorBackend = DetectorBackend::Yolov8;

/// Axis-aligned face box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl FaceBox {
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Clamps the box to a `width` x `height` image; `None` if nothing remains.
    fn clamped(&self, width: u32, height: u32) -> Option<FaceBox> {
        let b = FaceBox {
            x1: self.x1.clamp(0.0, width as f64),
            y1: self.y1.clamp(0.0, height as f64),
            x2: self.x2.clamp(0.0, width as f64),
            y2: self.y2.clamp(0.0, height as f64),
            confidence: self.confidence,
        };
        (b.x2 - b.x1 >= 1.0 && b.y2 - b.y1 >= 1.0).then_some(b)
    }

    /// Copies the boxed pixels out of `image`.
    pub fn crop(&self, image: &Image) -> Image {
        let x = self.x1.floor() as u32;
        let y = self.y1.floor() as u32;
        let w = (self.x2.ceil() as u32).saturating_sub(x);
        let h = (self.y2.ceil() as u32).saturating_sub(y);
        image.crop(x, y, w, h)
    }
}

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, BackendError> {
        let load_err =
            |e: String| BackendError::ModelLoad(format!("{}: {e}", model_path.display()));
        let session = ort::session::Session::builder()
            .map_err(|e| load_err(e.to_string()))?
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| load_err(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(e.to_string()))?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    (shape.len() >= 4 && shape[2] > 0).then(|| shape[2] as u32)
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    /// Runs the model and returns NMS-filtered boxes, highest confidence first.
    pub fn detect_boxes(&mut self, image: &Image) -> Result<Vec<FaceBox>, BackendError> {
        if image.is_empty() {
            return Err(BackendError::InvalidImage(format!(
                "{}x{} image has no pixels",
                image.width(),
                image.height()
            )));
        }

        let (input_tensor, scale, pad_x, pad_y) = letterbox(image, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference)?;
        ensure_outputs(outputs.len(), "YOLO")?;
        let tensor = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(BackendError::Inference(format!(
                "unexpected YOLO output shape: {shape:?}"
            )));
        }
        let data = tensor
            .as_slice()
            .ok_or_else(|| BackendError::Inference("cannot get tensor slice".into()))?;

        let mut raw = parse_rows(data, &shape, self.confidence, scale, pad_x, pad_y);
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .filter_map(|b| b.clamped(image.width(), image.height()))
            .collect())
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn extract_faces(
        &mut self,
        image: &Image,
        options: &DetectOptions,
    ) -> Result<Vec<DetectedFace>, BackendError> {
        if options.detector != SUPPORTED_DETECTOR {
            return Err(BackendError::UnsupportedDetector(options.detector));
        }

        let boxes = self.detect_boxes(image)?;
        if boxes.is_empty() && options.enforce_detection {
            return Err(BackendError::NoFaceDetected);
        }

        let (tw, th) = options.target_size;
        Ok(boxes
            .iter()
            .map(|b| DetectedFace {
                face: b.crop(image).resize(tw, th),
                confidence: b.confidence,
            })
            .collect())
    }
}

fn inference(e: impl std::fmt::Display) -> BackendError {
    BackendError::Inference(e.to_string())
}

/// Fails with [`BackendError::Inference`] when a session run returned nothing.
pub(super) fn ensure_outputs(count: usize, model: &str) -> Result<(), BackendError> {
    if count == 0 {
        return Err(BackendError::Inference(format!(
            "{model} model produced no outputs"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize an image to `target_size` × `target_size` RGB.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(image: &Image, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = image.width() as f64;
    let fh = image.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_h = image.height() as usize;
    let src_w = image.width() as usize;

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let rgb = image.rgb_at(src_y, src_x);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for (c, v) in rgb.iter().enumerate() {
                tensor[[0, c, ty, tx]] = *v as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes `[cx, cy, w, h, conf, ...]` rows into boxes in source coordinates.
///
/// YOLO output is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; both are handled.
fn parse_rows(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Vec<FaceBox> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Vec::new();
    }

    let feature = |det: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_dets + det] as f64
        } else {
            data[det * num_feats + f] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = feature(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
        boxes.push(FaceBox {
            x1: ((cx - w / 2.0) - pad_x as f64) / scale,
            y1: ((cy - h / 2.0) - pad_y as f64) / scale,
            x2: ((cx + w / 2.0) - pad_x as f64) / scale,
            y2: ((cy + h / 2.0) - pad_y as f64) / scale,
            confidence: conf,
        });
    }
    boxes
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i].corners(), &dets[j].corners()) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
