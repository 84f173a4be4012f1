use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

/// Date column format (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Time column format (`HH:MM:SS`).
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// One person's attendance for one day. Keyed by (`name`, `date`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub in_time: Option<NaiveTime>,
    pub out_time: Option<NaiveTime>,
}

impl AttendanceRecord {
    pub fn is_key(&self, name: &str, date: NaiveDate) -> bool {
        self.name == name && self.date == date
    }
}

/// Outcome of a mark-IN or mark-OUT request.
///
/// Only `Marked` changes the ledger. The other two are expected results of
/// repeated or out-of-order recognition, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkResult {
    Marked,
    AlreadyMarked,
    NoInRecord,
}

impl fmt::Display for MarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarkResult::Marked => "marked",
            MarkResult::AlreadyMarked => "already marked",
            MarkResult::NoInRecord => "no IN record",
        })
    }
}

pub(crate) fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string()).unwrap_or_default()
}
