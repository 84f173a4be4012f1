//! Face encoder seam: image in, one embedding per detected face out.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceEncoding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Detects faces in an image and encodes each one as an embedding.
///
/// Implementations return one [`FaceEncoding`] per detected face. Callers
/// rely only on that; the order is whatever the implementation considers
/// most relevant first.
pub trait FaceEncoder {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, EncoderError>;
}

impl<E: FaceEncoder + ?Sized> FaceEncoder for &mut E {
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, EncoderError> {
        (**self).detect_and_encode(image)
    }
}

/// SCRFD detection followed by ArcFace recognition.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, EncoderError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE).to_string_lossy())?;
        let recognizer =
            FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE).to_string_lossy())?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    /// Faces come back most confident first.
    fn detect_and_encode(&mut self, image: &RgbImage) -> Result<Vec<FaceEncoding>, EncoderError> {
        let faces = self.detector.detect(image)?;
        let mut encodings = Vec::with_capacity(faces.len());

        for face in faces {
            match self.recognizer.extract(image, &face) {
                Ok(embedding) => encodings.push(FaceEncoding { bbox: face, embedding }),
                Err(RecognizerError::NoLandmarks | RecognizerError::DegenerateLandmarks) => {
                    tracing::debug!(confidence = face.confidence, "face without usable landmarks skipped");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(encodings)
    }
}
