//! Per-day attendance ledger with write-through persistence.

use crate::record::{AttendanceRecord, MarkResult};
use crate::store::{CsvStore, LedgerError, LedgerStore};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashSet;
use std::path::PathBuf;

/// The attendance table, exclusively owned.
///
/// Records are kept in load order followed by insertion order. Every
/// mutation is flushed to the store before it is reported; a failed flush
/// rolls the in-memory change back.
pub struct Ledger<S = CsvStore> {
    store: S,
    records: Vec<AttendanceRecord>,
}

impl Ledger<CsvStore> {
    /// Open the CSV ledger at `path`, creating it with the header if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        Self::with_store(CsvStore::new(path))
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn with_store(store: S) -> Result<Self, LedgerError> {
        let records = match store.load()? {
            Some(records) => records,
            None => {
                store.save(&[])?;
                tracing::info!("created empty attendance ledger");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        for r in &records {
            if !seen.insert((r.name.as_str(), r.date)) {
                tracing::warn!(name = %r.name, date = %r.date, "duplicate ledger row; the first one is used");
            }
        }

        tracing::info!(records = records.len(), "attendance ledger opened");
        Ok(Self { store, records })
    }

    /// Record `identity` as arrived at `now`, unless already marked that day.
    pub fn mark_in(&mut self, identity: &str, now: NaiveDateTime) -> Result<MarkResult, LedgerError> {
        let date = now.date();
        if self.find(identity, date).is_some() {
            tracing::info!(identity, %date, "IN already recorded today");
            return Ok(MarkResult::AlreadyMarked);
        }

        self.records.push(AttendanceRecord {
            name: identity.to_string(),
            date,
            in_time: Some(whole_seconds(now)),
            out_time: None,
        });
        if let Err(e) = self.store.save(&self.records) {
            self.records.pop();
            return Err(e);
        }

        tracing::info!(identity, %date, time = %whole_seconds(now), "marked IN");
        Ok(MarkResult::Marked)
    }

    /// Record `identity` as leaving at `now`.
    ///
    /// Requires an IN for the same day; a second OUT is a no-op.
    pub fn mark_out(&mut self, identity: &str, now: NaiveDateTime) -> Result<MarkResult, LedgerError> {
        let date = now.date();
        let idx = match self.find(identity, date) {
            Some(idx) if self.records[idx].in_time.is_some() => idx,
            _ => {
                tracing::info!(identity, %date, "no IN recorded today; OUT not marked");
                return Ok(MarkResult::NoInRecord);
            }
        };
        if self.records[idx].out_time.is_some() {
            tracing::info!(identity, %date, "OUT already recorded today");
            return Ok(MarkResult::AlreadyMarked);
        }

        self.records[idx].out_time = Some(whole_seconds(now));
        if let Err(e) = self.store.save(&self.records) {
            self.records[idx].out_time = None;
            return Err(e);
        }

        tracing::info!(identity, %date, time = %whole_seconds(now), "marked OUT");
        Ok(MarkResult::Marked)
    }

    /// All records in ledger order.
    pub fn snapshot(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// The record for (`identity`, `date`), if any.
    pub fn get(&self, identity: &str, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.find(identity, date).map(|idx| &self.records[idx])
    }

    fn find(&self, identity: &str, date: NaiveDate) -> Option<usize> {
        self.records.iter().position(|r| r.is_key(identity, date))
    }
}

/// Ledger times have second precision.
fn whole_seconds(now: NaiveDateTime) -> NaiveTime {
    let time = now.time();
    time.with_nanosecond(0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// In-memory store that can be told to fail the next save.
    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Option<Vec<AttendanceRecord>>>,
        fail_next_save: Cell<bool>,
    }

    impl LedgerStore for &MemoryStore {
        fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, LedgerError> {
            Ok(self.saved.borrow().clone())
        }

        fn save(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
            if self.fail_next_save.replace(false) {
                return Err(LedgerError::Write {
                    path: PathBuf::from("memory"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            *self.saved.borrow_mut() = Some(records.to_vec());
            Ok(())
        }
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn t(time: &str) -> Option<NaiveTime> {
        Some(NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap())
    }

    #[test]
    fn test_open_creates_empty_store() {
        let store = MemoryStore::default();
        let ledger = Ledger::with_store(&store).unwrap();
        assert!(ledger.snapshot().is_empty());
        assert_eq!(*store.saved.borrow(), Some(Vec::new()));
    }

    #[test]
    fn test_mark_in_then_out() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        assert_eq!(ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap(), MarkResult::Marked);
        assert_eq!(ledger.mark_out("alice", at("2024-01-01", "17:00:00")).unwrap(), MarkResult::Marked);

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let record = ledger.get("alice", day).unwrap();
        assert_eq!(record.in_time, t("09:00:00"));
        assert_eq!(record.out_time, t("17:00:00"));
        assert_eq!(store.saved.borrow().as_deref(), Some(ledger.snapshot()));
    }

    #[test]
    fn test_second_mark_in_same_day() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();
        let before = ledger.snapshot().to_vec();
        let result = ledger.mark_in("alice", at("2024-01-01", "10:30:00")).unwrap();

        assert_eq!(result, MarkResult::AlreadyMarked);
        assert_eq!(ledger.snapshot(), before.as_slice());
    }

    #[test]
    fn test_mark_in_next_day_creates_new_record() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();
        ledger.mark_in("alice", at("2024-01-02", "09:05:00")).unwrap();
        ledger.mark_in("Alice", at("2024-01-02", "09:06:00")).unwrap();
        assert_eq!(ledger.snapshot().len(), 3);
    }

    #[test]
    fn test_mark_out_without_in() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        let result = ledger.mark_out("bob", at("2024-01-01", "17:00:00")).unwrap();
        assert_eq!(result, MarkResult::NoInRecord);
        assert!(ledger.snapshot().is_empty());

        // An IN from yesterday does not count.
        ledger.mark_in("bob", at("2023-12-31", "09:00:00")).unwrap();
        let result = ledger.mark_out("bob", at("2024-01-01", "17:00:00")).unwrap();
        assert_eq!(result, MarkResult::NoInRecord);
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[test]
    fn test_second_mark_out_keeps_first_time() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();
        ledger.mark_out("alice", at("2024-01-01", "17:00:00")).unwrap();
        let result = ledger.mark_out("alice", at("2024-01-01", "18:00:00")).unwrap();

        assert_eq!(result, MarkResult::AlreadyMarked);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(ledger.get("alice", day).unwrap().out_time, t("17:00:00"));
    }

    #[test]
    fn test_subsecond_time_truncated() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();
        let now = at("2024-01-01", "09:00:00") + chrono::Duration::milliseconds(750);

        ledger.mark_in("alice", now).unwrap();
        assert_eq!(ledger.snapshot()[0].in_time, t("09:00:00"));
    }

    #[test]
    fn test_failed_flush_rolls_back_mark_in() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();

        store.fail_next_save.set(true);
        let err = ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap_err();
        assert!(matches!(err, LedgerError::Write { .. }));
        assert!(ledger.snapshot().is_empty());

        // Retrying after the store recovers succeeds.
        assert_eq!(ledger.mark_in("alice", at("2024-01-01", "09:00:05")).unwrap(), MarkResult::Marked);
    }

    #[test]
    fn test_failed_flush_rolls_back_mark_out() {
        let store = MemoryStore::default();
        let mut ledger = Ledger::with_store(&store).unwrap();
        ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();

        store.fail_next_save.set(true);
        assert!(ledger.mark_out("alice", at("2024-01-01", "17:00:00")).is_err());

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(ledger.get("alice", day).unwrap().out_time, None);
        assert_eq!(store.saved.borrow().as_ref().unwrap()[0].out_time, None);
    }

    #[test]
    fn test_blank_in_time_blocks_out() {
        let store = MemoryStore::default();
        *store.saved.borrow_mut() = Some(vec![AttendanceRecord {
            name: "carol".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            in_time: None,
            out_time: None,
        }]);
        let mut ledger = Ledger::with_store(&store).unwrap();

        let result = ledger.mark_out("carol", at("2024-01-01", "17:00:00")).unwrap();
        assert_eq!(result, MarkResult::NoInRecord);
    }

    #[test]
    fn test_csv_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");

        let mut ledger = Ledger::open(&path).unwrap();
        ledger.mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();
        ledger.mark_in("bob", at("2024-01-01", "09:10:00")).unwrap();
        ledger.mark_out("alice", at("2024-01-01", "17:00:00")).unwrap();
        let before: HashSet<_> = ledger.snapshot().iter().cloned().collect();
        drop(ledger);

        let reopened = Ledger::open(&path).unwrap();
        let after: HashSet<_> = reopened.snapshot().iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_in_then_out_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");

        Ledger::open(&path).unwrap().mark_in("alice", at("2024-01-01", "09:00:00")).unwrap();
        Ledger::open(&path).unwrap().mark_out("alice", at("2024-01-01", "17:00:00")).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Name,Date,In_Time,Out_Time\nalice,2024-01-01,09:00:00,17:00:00\n"
        );
    }

    #[test]
    fn test_padded_identity_stays_one_record_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");

        Ledger::open(&path).unwrap().mark_in("alice ", at("2024-01-01", "09:00:00")).unwrap();
        let mut reopened = Ledger::open(&path).unwrap();
        let result = reopened.mark_in("alice ", at("2024-01-01", "09:30:00")).unwrap();

        assert_eq!(result, MarkResult::AlreadyMarked);
        assert_eq!(reopened.snapshot().len(), 1);
        assert_eq!(reopened.snapshot()[0].name, "alice ");
    }
}
