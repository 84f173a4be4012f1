//! rollcall-core: Face identification for attendance tracking.
//!
//! Loads a gallery of known identities from reference images, extracts
//! embeddings with SCRFD + ArcFace via ONNX Runtime, and matches probe
//! embeddings against the gallery by nearest-neighbor Euclidean distance.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod recognizer;
pub mod types;

pub use encoder::{EncoderError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{Gallery, GalleryError};
pub use types::{
    BoundingBox, Embedding, EuclideanMatcher, FaceEncoding, GalleryEntry, MatchResult, Matcher,
};

use std::path::PathBuf;

/// Default matching threshold: maximum Euclidean distance accepted as a match.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default directory for the ONNX model files (`$XDG_DATA_HOME/rollcall/models`).
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
        .join("models")
}
