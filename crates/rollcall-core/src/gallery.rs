//! Gallery of known identities, built from a directory of reference images.
//!
//! Each image file `<identity>.<ext>` contributes the first face the encoder
//! finds in it. Images that fail to decode or contain no face are skipped
//! with a warning.

use crate::encoder::FaceEncoder;
use crate::types::{Embedding, EuclideanMatcher, GalleryEntry, MatchResult, Matcher};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted as reference images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("no known faces found in {0}; add one image per person named <name>.png/.jpg")]
    Empty(PathBuf),
    #[error("cannot read gallery directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// In-memory table of known identities. Never empty once loaded.
#[derive(Debug, Clone)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// Load every reference image in `dir` through `encoder`.
    ///
    /// Files are visited in file-name order so entry order, and with it the
    /// matcher's tie-break, is stable across runs. When two files share a
    /// stem the later one replaces the earlier embedding. A missing
    /// directory is created so the operator knows where images belong.
    pub fn load(dir: &Path, mut encoder: impl FaceEncoder) -> Result<Self, GalleryError> {
        let io_err = |source| GalleryError::Io { path: dir.to_path_buf(), source };

        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
            tracing::info!(dir = %dir.display(), "created empty gallery directory");
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();

        let mut gallery = Gallery { entries: Vec::new() };
        for path in paths {
            let Some(identity) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                tracing::warn!(path = %path.display(), "file name is not valid UTF-8; skipped");
                continue;
            };

            let image = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable reference image; skipped");
                    continue;
                }
            };

            let faces = match encoder.detect_and_encode(&image) {
                Ok(faces) => faces,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "encoding failed; skipped");
                    continue;
                }
            };

            let Some(first) = faces.into_iter().next() else {
                tracing::warn!(path = %path.display(), "no face detected in reference image; skipped");
                continue;
            };

            tracing::info!(identity = %identity, dimension = first.embedding.dimension(), "loaded gallery entry");
            gallery.insert(identity, first.embedding);
        }

        if gallery.entries.is_empty() {
            return Err(GalleryError::Empty(dir.to_path_buf()));
        }
        Ok(gallery)
    }

    /// Build a gallery from prepared entries, applying the same
    /// last-one-wins rule for repeated identities.
    pub fn from_entries(entries: impl IntoIterator<Item = GalleryEntry>) -> Result<Self, GalleryError> {
        let mut gallery = Gallery { entries: Vec::new() };
        for entry in entries {
            gallery.insert(entry.identity, entry.embedding);
        }
        if gallery.entries.is_empty() {
            return Err(GalleryError::Empty(PathBuf::new()));
        }
        Ok(gallery)
    }

    fn insert(&mut self, identity: String, embedding: Embedding) {
        match self.entries.iter_mut().find(|e| e.identity == identity) {
            Some(existing) => {
                tracing::warn!(identity = %identity, "duplicate identity; later image replaces earlier one");
                existing.embedding = embedding;
            }
            None => self.entries.push(GalleryEntry { identity, embedding }),
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Identities in gallery order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identity.as_str())
    }

    /// Match `probe` against this gallery with the Euclidean matcher.
    pub fn identify(&self, probe: &Embedding, threshold: f32) -> MatchResult {
        EuclideanMatcher.compare(probe, &self.entries, threshold)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
