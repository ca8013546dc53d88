use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseIdentityError {
    kind: &'static str,
    value: String,
    expected: String,
}

/// Face detector identity understood by a detection backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DetectorBackend {
    #[serde(rename = "opencv")]
    OpenCv,
    #[serde(rename = "ssd")]
    Ssd,
    #[serde(rename = "dlib")]
    Dlib,
    #[serde(rename = "mtcnn")]
    Mtcnn,
    #[default]
    #[serde(rename = "retinaface")]
    RetinaFace,
    #[serde(rename = "mediapipe")]
    MediaPipe,
    #[serde(rename = "yolov8")]
    Yolov8,
    #[serde(rename = "yunet")]
    YuNet,
    #[serde(rename = "fastmtcnn")]
    FastMtcnn,
}

impl DetectorBackend {
    pub const ALL: &[DetectorBackend] = &[
        DetectorBackend::OpenCv,
        DetectorBackend::Ssd,
        DetectorBackend::Dlib,
        DetectorBackend::Mtcnn,
        DetectorBackend::RetinaFace,
        DetectorBackend::MediaPipe,
        DetectorBackend::Yolov8,
        DetectorBackend::YuNet,
        DetectorBackend::FastMtcnn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectorBackend::OpenCv => "opencv",
            DetectorBackend::Ssd => "ssd",
            DetectorBackend::Dlib => "dlib",
            DetectorBackend::Mtcnn => "mtcnn",
            DetectorBackend::RetinaFace => "retinaface",
            DetectorBackend::MediaPipe => "mediapipe",
            DetectorBackend::Yolov8 => "yolov8",
            DetectorBackend::YuNet => "yunet",
            DetectorBackend::FastMtcnn => "fastmtcnn",
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorBackend {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseIdentityError {
                kind: "detector backend",
                value: s.to_string(),
                expected: join(Self::ALL.iter().map(|d| d.as_str())),
            })
    }
}

/// Face embedding model identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FaceModel {
    #[serde(rename = "VGG-Face")]
    VggFace,
    #[serde(rename = "Facenet")]
    Facenet,
    #[default]
    #[serde(rename = "Facenet512")]
    Facenet512,
    #[serde(rename = "OpenFace")]
    OpenFace,
    #[serde(rename = "DeepFace")]
    DeepFace,
    #[serde(rename = "DeepID")]
    DeepId,
    #[serde(rename = "ArcFace")]
    ArcFace,
    #[serde(rename = "Dlib")]
    Dlib,
    #[serde(rename = "SFace")]
    SFace,
}

impl FaceModel {
    pub const ALL: &[FaceModel] = &[
        FaceModel::VggFace,
        FaceModel::Facenet,
        FaceModel::Facenet512,
        FaceModel::OpenFace,
        FaceModel::DeepFace,
        FaceModel::DeepId,
        FaceModel::ArcFace,
        FaceModel::Dlib,
        FaceModel::SFace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FaceModel::VggFace => "VGG-Face",
            FaceModel::Facenet => "Facenet",
            FaceModel::Facenet512 => "Facenet512",
            FaceModel::OpenFace => "OpenFace",
            FaceModel::DeepFace => "DeepFace",
            FaceModel::DeepId => "DeepID",
            FaceModel::ArcFace => "ArcFace",
            FaceModel::Dlib => "Dlib",
            FaceModel::SFace => "SFace",
        }
    }

    /// Cosine distance at or below which the backend reports a match.
    pub fn cosine_threshold(self) -> f64 {
        match self {
            FaceModel::VggFace => 0.68,
            FaceModel::Facenet => 0.40,
            FaceModel::Facenet512 => 0.30,
            FaceModel::OpenFace => 0.10,
            FaceModel::DeepFace => 0.23,
            FaceModel::DeepId => 0.015,
            FaceModel::ArcFace => 0.68,
            FaceModel::Dlib => 0.07,
            FaceModel::SFace => 0.593,
        }
    }
}

impl fmt::Display for FaceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaceModel {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseIdentityError {
                kind: "face model",
                value: s.to_string(),
                expected: join(Self::ALL.iter().map(|m| m.as_str())),
            })
    }
}

/// Detector and model pair passed to every verify call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub detector: DetectorBackend,
    pub model: FaceModel,
}

impl BackendConfig {
    pub fn new(detector: DetectorBackend, model: FaceModel) -> Self {
        Self { detector, model }
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
