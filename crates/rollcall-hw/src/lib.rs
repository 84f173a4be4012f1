//! rollcall-hw: Frame acquisition for attendance sessions.
//!
//! Provides V4L2 camera capture converted to RGB, and a still-image
//! directory source for offline runs, both behind [`FrameSource`].

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
pub use frame::Frame;
pub use source::{FrameSource, SourceError, StillImages};
