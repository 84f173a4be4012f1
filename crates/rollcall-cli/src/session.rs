use chrono::NaiveDateTime;
use rollcall_attendance::{AttendanceController, LedgerError, LedgerStore, SessionState};
use rollcall_core::FaceEncoder;
use rollcall_hw::{FrameSource, SourceError};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Pull frames until the controller reaches a terminal state.
///
/// `stop` is checked between frames. The session aborts when the source
/// runs dry, when `max_frames` (if non-zero) frames pass without a
/// recognition, or when the source fails. Frames that are dark or fail to
/// encode are skipped.
pub fn run_session<S: LedgerStore>(
    source: &mut dyn FrameSource,
    encoder: &mut dyn FaceEncoder,
    controller: &mut AttendanceController<'_, S>,
    stop: &AtomicBool,
    max_frames: usize,
    clock: impl Fn() -> NaiveDateTime,
) -> Result<SessionState, SessionError> {
    tracing::info!(mode = %controller.mode(), "session started");
    let mut frames = 0usize;

    while !controller.is_finished() {
        if stop.load(Ordering::Relaxed) {
            tracing::info!(frames, "stop requested");
            controller.abort();
            break;
        }
        if max_frames > 0 && frames >= max_frames {
            tracing::warn!(frames, "no known face within the frame limit");
            controller.abort();
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(frames, "frame source exhausted");
                controller.abort();
                break;
            }
            Err(e) => {
                controller.abort();
                return Err(e.into());
            }
        };
        frames += 1;

        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, brightness = frame.avg_brightness(), "skipping dark frame");
            continue;
        }

        let faces = match encoder.detect_and_encode(&frame.image) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "face encoding failed; frame skipped");
                continue;
            }
        };
        tracing::debug!(seq = frame.sequence, faces = faces.len(), "frame processed");

        controller.observe_frame(faces.iter().map(|f| &f.embedding), clock())?;
    }

    Ok(controller.state().clone())
}
