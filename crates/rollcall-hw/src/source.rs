//! Frame sources consumed by the attendance session loop.

use crate::camera::{CameraError, CameraStream};
use crate::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

const STILL_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("cannot read frame directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces frames one at a time. Blocks until a frame is available.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl FrameSource for CameraStream<'_> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(Some(self.capture()?))
    }
}

/// Image files from a directory, replayed in file-name order.
///
/// Files that fail to decode are skipped with a warning.
pub struct StillImages {
    pending: VecDeque<PathBuf>,
    sequence: u32,
}

impl StillImages {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let io_err = |source| SourceError::Io { path: dir.to_path_buf(), source };
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| STILL_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)))
            })
            .collect();
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), "opened still-image source");
        Ok(Self { pending: paths.into(), sequence: 0 })
    }
}

impl FrameSource for StillImages {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        while let Some(path) = self.pending.pop_front() {
            match image::open(&path) {
                Ok(img) => {
                    let frame = Frame::new(img.to_rgb8(), self.sequence);
                    self.sequence += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable frame; skipped");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_still_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([200, 0, 0])).save(dir.path().join("b.png")).unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 200, 0])).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("c.png"), b"garbage").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"# frames").unwrap();

        let mut source = StillImages::open(dir.path()).unwrap();
        assert_eq!(source.pending.len(), 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(*first.image.get_pixel(0, 0), Rgb([0, 200, 0]));
        assert_eq!(first.sequence, 0);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(*second.image.get_pixel(0, 0), Rgb([200, 0, 0]));
        assert_eq!(second.sequence, 1);

        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_still_images_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = StillImages::open(&dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
