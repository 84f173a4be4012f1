//! Attendance session state machine.
//!
//! A session waits for the first embedding that matches a known identity,
//! applies one mark-IN or mark-OUT for it, and completes. Unknown faces are
//! ignored; nothing after completion reaches the ledger.

use crate::ledger::Ledger;
use crate::record::MarkResult;
use crate::store::{LedgerError, LedgerStore};
use chrono::NaiveDateTime;
use rollcall_core::{Embedding, Gallery, MatchResult};
use serde::Serialize;
use std::fmt;

/// Which ledger operation a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    In,
    Out,
}

impl Mode {
    /// Parse `IN` / `OUT`, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Some(Mode::In),
            "OUT" => Some(Mode::Out),
            _ => None,
        }
    }

    /// Resolve an optional selector; absent or unrecognized values mean IN.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None => Mode::In,
            Some(s) => Mode::parse(s).unwrap_or_else(|| {
                tracing::warn!(mode = s, "unrecognized mode; defaulting to IN");
                Mode::In
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::In => "IN",
            Mode::Out => "OUT",
        })
    }
}

/// What a completed session did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub identity: String,
    pub distance: f32,
    pub mode: Mode,
    pub result: MarkResult,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitingFace,
    /// Terminal: one identity was recognized and the ledger consulted.
    Complete(Outcome),
    /// Terminal: stopped before any recognition, or the ledger write failed.
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::AwaitingFace)
    }
}

/// Drives one attendance session over a gallery and a ledger.
pub struct AttendanceController<'a, S: LedgerStore> {
    gallery: &'a Gallery,
    ledger: &'a mut Ledger<S>,
    mode: Mode,
    threshold: f32,
    state: SessionState,
}

impl<'a, S: LedgerStore> AttendanceController<'a, S> {
    pub fn new(gallery: &'a Gallery, ledger: &'a mut Ledger<S>, mode: Mode, threshold: f32) -> Self {
        Self {
            gallery,
            ledger,
            mode,
            threshold,
            state: SessionState::AwaitingFace,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Feed one embedding.
    ///
    /// While awaiting a face, a known match is committed to the ledger and
    /// the session completes whatever the [`MarkResult`]. A ledger write
    /// failure aborts the session and is returned. Once terminal, input is
    /// ignored.
    pub fn observe(&mut self, embedding: &Embedding, now: NaiveDateTime) -> Result<&SessionState, LedgerError> {
        if self.state.is_terminal() {
            return Ok(&self.state);
        }

        let (identity, distance) = match self.gallery.identify(embedding, self.threshold) {
            MatchResult::Known { identity, distance } => (identity, distance),
            MatchResult::Unknown => {
                tracing::debug!("unknown face");
                return Ok(&self.state);
            }
        };

        tracing::info!(identity = %identity, distance, mode = %self.mode, "face recognized");
        let marked = match self.mode {
            Mode::In => self.ledger.mark_in(&identity, now),
            Mode::Out => self.ledger.mark_out(&identity, now),
        };
        let result = match marked {
            Ok(result) => result,
            Err(e) => {
                self.state = SessionState::Aborted;
                return Err(e);
            }
        };

        self.state = SessionState::Complete(Outcome {
            identity,
            distance,
            mode: self.mode,
            result,
            at: now,
        });
        Ok(&self.state)
    }

    /// Feed every face of one frame, in extractor order. The first
    /// recognized face wins; the rest of the frame is ignored.
    pub fn observe_frame<'e>(
        &mut self,
        embeddings: impl IntoIterator<Item = &'e Embedding>,
        now: NaiveDateTime,
    ) -> Result<&SessionState, LedgerError> {
        for embedding in embeddings {
            if self.observe(embedding, now)?.is_terminal() {
                break;
            }
        }
        Ok(&self.state)
    }

    /// Stop an unfinished session. No effect once terminal.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            tracing::info!("session aborted");
            self.state = SessionState::Aborted;
        }
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }
}
