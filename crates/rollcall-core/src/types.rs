use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of components in the vector.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Both embeddings must have the same dimension; callers check this
    /// before comparing (see [`EuclideanMatcher`]).
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found by an extractor: where it is and what it looks like.
#[derive(Debug, Clone)]
pub struct FaceEncoding {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// A known identity and its reference embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    /// Person label, taken from the reference image file stem. Compared exactly.
    pub identity: String,
    pub embedding: Embedding,
}

/// Outcome of matching a probe embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Known { identity: String, distance: f32 },
    Unknown,
}

impl MatchResult {
    /// Identity of the match, if any.
    pub fn identity(&self) -> Option<&str> {
        match self {
            MatchResult::Known { identity, .. } => Some(identity),
            MatchResult::Unknown => None,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery of known faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult;
}

/// Nearest-neighbor matcher over Euclidean distance.
///
/// Linear scan of the whole gallery. The closest entry wins when its
/// distance is strictly below the threshold; on equal distances the entry
/// that appears first in the gallery is kept. Entries whose dimension
/// differs from the probe are never considered.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult {
        let mut best: Option<(&GalleryEntry, f32)> = None;

        for entry in gallery {
            if entry.embedding.dimension() != probe.dimension() {
                tracing::warn!(
                    identity = %entry.identity,
                    expected = entry.embedding.dimension(),
                    got = probe.dimension(),
                    "embedding dimension mismatch; entry skipped"
                );
                continue;
            }
            let distance = probe.euclidean_distance(&entry.embedding);
            // Strict `<` keeps the first entry on ties.
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((entry, distance));
            }
        }

        match best {
            Some((entry, distance)) if distance < threshold => MatchResult::Known {
                identity: entry.identity.clone(),
                distance,
            },
            _ => MatchResult::Unknown,
        }
    }
}
