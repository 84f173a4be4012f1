//! Plain-text rendering of the attendance table.

use crate::record::{format_time, AttendanceRecord, DATE_FORMAT};
use std::fmt::Write;

const RULE_WIDTH: usize = 65;

/// Render records as a fixed-width table, one row per record.
pub fn render_table<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(RULE_WIDTH);

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "{:<20}{:<15}{:<15}{:<15}", "Name", "Date", "In_Time", "Out_Time");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for r in records {
        let _ = writeln!(
            out,
            "{:<20}{:<15}{:<15}{:<15}",
            r.name,
            r.date.format(DATE_FORMAT).to_string(),
            format_time(r.in_time),
            format_time(r.out_time),
        );
    }
    let _ = writeln!(out, "{heavy}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_render_table() {
        let records = vec![AttendanceRecord {
            name: "alice".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            in_time: NaiveTime::from_hms_opt(9, 0, 0),
            out_time: None,
        }];

        let table = render_table(&records);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "=".repeat(65));
        assert!(lines[1].starts_with("Name                Date"));
        assert_eq!(lines[3].trim_end(), "alice               2024-01-01     09:00:00");
    }

    #[test]
    fn test_render_empty_table() {
        assert_eq!(render_table(&Vec::<AttendanceRecord>::new()).lines().count(), 4);
    }
}
