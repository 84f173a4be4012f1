//! rollcall-attendance: Daily attendance ledger and session controller.
//!
//! The [`Ledger`] owns the attendance table and only exposes idempotent
//! mark-IN / mark-OUT upserts, so at most one record exists per person per
//! day. The [`AttendanceController`] turns a stream of face embeddings into
//! exactly one ledger call per session.

pub mod controller;
pub mod ledger;
pub mod record;
pub mod report;
pub mod store;

pub use controller::{AttendanceController, Mode, Outcome, SessionState};
pub use ledger::Ledger;
pub use record::{AttendanceRecord, MarkResult};
pub use store::{CsvStore, LedgerError, LedgerStore};
