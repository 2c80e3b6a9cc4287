//! Lifetime progress aggregation.
//!
//! Each user directory holds `history.wal` (every session record, JSONL) and
//! `progress.json` (the running counters). Recording appends to the WAL first,
//! then updates the counters. The WAL is the source of truth: whenever
//! `progress.json` is missing, unreadable or does not cover exactly the ids in
//! the WAL, the counters are rebuilt from it. The record id makes every retry
//! idempotent.

use crate::wal::{JsonlSink, SessionSink};
use crate::{Error, Result, SessionRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Lifetime statistics for one user
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserProgress {
    pub total_workouts: u32,
    pub total_calories_burned: u64,
    pub total_minutes: u64,
    pub last_workout_date: Option<NaiveDate>,
    pub last_workout_at: Option<DateTime<Utc>>,
    /// Consecutive days with a workout, ending on `last_workout_date`
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    pub recorded_session_ids: BTreeSet<Uuid>,
}

impl UserProgress {
    /// Rebuild counters by replaying records in completion order
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let mut ordered: Vec<&SessionRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.completed_at);

        let mut progress = Self::default();
        for record in ordered {
            progress.apply(record);
        }
        progress
    }

    pub fn contains(&self, session_id: &Uuid) -> bool {
        self.recorded_session_ids.contains(session_id)
    }

    /// Fold a record into the counters; returns false if it was already counted
    pub fn apply(&mut self, record: &SessionRecord) -> bool {
        if !self.recorded_session_ids.insert(record.id) {
            return false;
        }

        self.total_workouts += 1;
        self.total_calories_burned += u64::from(record.calories_burned);
        self.total_minutes += u64::from(record.total_duration_minutes);

        let day = record.completed_at.date_naive();
        match self.last_workout_date {
            None => self.current_streak_days = 1,
            Some(last) if day == last => {}
            Some(last) if last.succ_opt() == Some(day) => self.current_streak_days += 1,
            Some(last) if day > last => self.current_streak_days = 1,
            // Late arrivals count toward totals but not the running streak
            Some(_) => {}
        }
        self.longest_streak_days = self.longest_streak_days.max(self.current_streak_days);

        if self.last_workout_date.map_or(true, |last| day >= last) {
            self.last_workout_date = Some(day);
        }
        if self.last_workout_at.map_or(true, |at| record.completed_at > at) {
            self.last_workout_at = Some(record.completed_at);
        }
        true
    }

    /// The streak as seen on `today`: broken once a full day passes without a workout
    pub fn streak_on(&self, today: NaiveDate) -> u32 {
        match self.last_workout_date {
            Some(last) if last == today || last.succ_opt() == Some(today) => {
                self.current_streak_days
            }
            _ => 0,
        }
    }
}

/// Result of handing a record to a progress store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// The record id was counted before; nothing changed
    AlreadyRecorded,
}

/// Sink for finished sessions
pub trait ProgressStore {
    fn record_session(&mut self, user_id: &str, record: &SessionRecord) -> Result<RecordOutcome>;

    fn load_progress(&self, user_id: &str) -> Result<UserProgress>;
}

/// Hand `record` to `store`, retrying retryable failures
///
/// `on_failure` sees each error with its 1-based attempt number and decides
/// whether to try again. The same record is resent on every attempt.
pub fn record_with_retry<S, F>(
    store: &mut S,
    user_id: &str,
    record: &SessionRecord,
    mut on_failure: F,
) -> Result<RecordOutcome>
where
    S: ProgressStore + ?Sized,
    F: FnMut(&Error, u32) -> bool,
{
    let mut attempt = 1;
    loop {
        match store.record_session(user_id, record) {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() && on_failure(&e, attempt) => {
                tracing::warn!("Recording session {} failed (attempt {}): {}", record.id, attempt, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// File-backed progress store rooted at the data directory
pub struct JsonProgressStore {
    root: PathBuf,
}

impl JsonProgressStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join("users").join(crate::lock::encode_user_id(user_id))
    }

    pub fn progress_path(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join("progress.json")
    }

    pub fn history_path(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join("history.wal")
    }

    /// All recorded sessions, newest first
    pub fn history(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        crate::history::load_history(&self.history_path(user_id))
    }

    /// Load the counters, replaying the WAL when they are missing, unreadable
    /// or behind it
    fn load_or_rebuild(&self, progress_path: &Path, wal_path: &Path) -> Result<UserProgress> {
        let records = crate::wal::read_records(wal_path)?;

        if let Some(progress) = crate::state::load_json::<UserProgress>(progress_path)? {
            let in_sync = progress.recorded_session_ids.len() == records.len()
                && records.iter().all(|r| progress.contains(&r.id));
            if in_sync {
                return Ok(progress);
            }
            tracing::warn!(
                "Progress counts {} sessions but history holds {}, rebuilding",
                progress.recorded_session_ids.len(),
                records.len()
            );
        }

        if !records.is_empty() {
            tracing::info!("Rebuilding progress from {} logged sessions", records.len());
        }
        Ok(UserProgress::from_records(&records))
    }
}

impl ProgressStore for JsonProgressStore {
    fn record_session(&mut self, user_id: &str, record: &SessionRecord) -> Result<RecordOutcome> {
        let progress_path = self.progress_path(user_id);
        let wal_path = self.history_path(user_id);

        let mut progress = self.load_or_rebuild(&progress_path, &wal_path)?;
        if progress.contains(&record.id) {
            tracing::info!("Session {} already recorded for '{}'", record.id, user_id);
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        JsonlSink::new(&wal_path).append(record)?;
        progress.apply(record);
        crate::state::save_json(&progress_path, &progress)?;

        tracing::info!(
            "Recorded session {} for '{}': {} workouts, {} kcal total",
            record.id,
            user_id,
            progress.total_workouts,
            progress.total_calories_burned
        );
        Ok(RecordOutcome::Recorded)
    }

    fn load_progress(&self, user_id: &str) -> Result<UserProgress> {
        self.load_or_rebuild(&self.progress_path(user_id), &self.history_path(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::tests::record_at;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 18, 0, 0).unwrap()
    }

    /// Fails the first `failures` calls, then delegates
    struct FlakyStore {
        inner: JsonProgressStore,
        failures: u32,
        calls: u32,
    }

    impl ProgressStore for FlakyStore {
        fn record_session(&mut self, user_id: &str, record: &SessionRecord) -> Result<RecordOutcome> {
            self.calls += 1;
            if self.failures > 0 {
                self.failures -= 1;
                return Err(Error::Persistence("disk unavailable".into()));
            }
            self.inner.record_session(user_id, record)
        }

        fn load_progress(&self, user_id: &str) -> Result<UserProgress> {
            self.inner.load_progress(user_id)
        }
    }

    #[test]
    fn test_record_updates_counters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());

        let record = record_at(Utc::now(), 42);
        assert_eq!(
            store.record_session("alice", &record).unwrap(),
            RecordOutcome::Recorded
        );

        let progress = store.load_progress("alice").unwrap();
        assert_eq!(progress.total_workouts, 1);
        assert_eq!(progress.total_calories_burned, 42);
        assert_eq!(progress.total_minutes, 2);
        assert_eq!(progress.last_workout_date, Some(record.completed_at.date_naive()));
        assert_eq!(store.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_resent_record_counted_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());

        let record = record_at(Utc::now(), 42);
        store.record_session("alice", &record).unwrap();
        assert_eq!(
            store.record_session("alice", &record).unwrap(),
            RecordOutcome::AlreadyRecorded
        );

        let progress = store.load_progress("alice").unwrap();
        assert_eq!(progress.total_workouts, 1);
        assert_eq!(progress.total_calories_burned, 42);
    }

    #[test]
    fn test_fail_once_then_retry_increments_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FlakyStore {
            inner: JsonProgressStore::new(temp_dir.path()),
            failures: 1,
            calls: 0,
        };
        let record = record_at(Utc::now(), 30);

        let mut seen = Vec::new();
        let outcome = record_with_retry(&mut store, "alice", &record, |e, attempt| {
            assert!(e.is_retryable());
            seen.push(attempt);
            true
        })
        .unwrap();

        assert_eq!(outcome, RecordOutcome::Recorded);
        assert_eq!(seen, vec![1]);
        assert_eq!(store.calls, 2);

        let progress = store.load_progress("alice").unwrap();
        assert_eq!(progress.total_workouts, 1);
        assert_eq!(progress.total_calories_burned, 30);
    }

    #[test]
    fn test_retry_declined_returns_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FlakyStore {
            inner: JsonProgressStore::new(temp_dir.path()),
            failures: 5,
            calls: 0,
        };
        let record = record_at(Utc::now(), 30);

        let result = record_with_retry(&mut store, "alice", &record, |_, attempt| attempt < 3);
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(store.calls, 3);
        assert_eq!(store.load_progress("alice").unwrap().total_workouts, 0);
    }

    #[test]
    fn test_crash_after_wal_append_is_repaired() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());
        let record = record_at(Utc::now(), 25);

        // WAL written, counters never saved
        JsonlSink::new(store.history_path("alice")).append(&record).unwrap();

        assert_eq!(
            store.record_session("alice", &record).unwrap(),
            RecordOutcome::AlreadyRecorded
        );
        let progress = store.load_progress("alice").unwrap();
        assert_eq!(progress.total_workouts, 1);
        assert_eq!(store.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_stale_progress_caught_up_from_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());
        store.record_session("alice", &record_at(Utc::now(), 5)).unwrap();

        // Logged, but the counter save never happened and the retry was declined
        JsonlSink::new(store.history_path("alice"))
            .append(&record_at(Utc::now(), 7))
            .unwrap();

        store.record_session("alice", &record_at(Utc::now(), 10)).unwrap();

        let history = store.history("alice").unwrap();
        let progress = store.load_progress("alice").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(progress.total_workouts as usize, history.len());
        assert_eq!(progress.total_calories_burned, 22);

        let saved: UserProgress = crate::state::load_json(&store.progress_path("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.total_workouts, 3);
    }

    #[test]
    fn test_corrupt_progress_rebuilt_from_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());
        store.record_session("alice", &record_at(Utc::now(), 10)).unwrap();
        store.record_session("alice", &record_at(Utc::now(), 15)).unwrap();

        std::fs::write(store.progress_path("alice"), "{ broken").unwrap();

        let progress = store.load_progress("alice").unwrap();
        assert_eq!(progress.total_workouts, 2);
        assert_eq!(progress.total_calories_burned, 25);
    }

    #[test]
    fn test_similar_user_ids_are_isolated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());
        store.record_session("a.b", &record_at(Utc::now(), 10)).unwrap();

        assert_ne!(store.user_dir("a.b"), store.user_dir("a_b"));
        assert_eq!(store.load_progress("a_b").unwrap(), UserProgress::default());
    }

    #[test]
    fn test_users_are_isolated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonProgressStore::new(temp_dir.path());
        store.record_session("alice", &record_at(Utc::now(), 10)).unwrap();

        assert_eq!(store.load_progress("bob").unwrap(), UserProgress::default());
    }

    #[test]
    fn test_streaks() {
        let mut progress = UserProgress::default();
        progress.apply(&record_at(day(2026, 3, 1), 1));
        progress.apply(&record_at(day(2026, 3, 2), 1));
        progress.apply(&record_at(day(2026, 3, 2) + Duration::hours(2), 1));
        progress.apply(&record_at(day(2026, 3, 3), 1));
        assert_eq!(progress.current_streak_days, 3);
        assert_eq!(progress.longest_streak_days, 3);

        progress.apply(&record_at(day(2026, 3, 6), 1));
        assert_eq!(progress.current_streak_days, 1);
        assert_eq!(progress.longest_streak_days, 3);
        assert_eq!(progress.total_workouts, 5);

        let last = day(2026, 3, 6).date_naive();
        assert_eq!(progress.streak_on(last), 1);
        assert_eq!(progress.streak_on(last.succ_opt().unwrap()), 1);
        assert_eq!(progress.streak_on(day(2026, 3, 9).date_naive()), 0);
    }

    #[test]
    fn test_late_record_keeps_last_date() {
        let mut progress = UserProgress::default();
        progress.apply(&record_at(day(2026, 3, 5), 1));
        progress.apply(&record_at(day(2026, 3, 1), 1));

        assert_eq!(progress.last_workout_date, Some(day(2026, 3, 5).date_naive()));
        assert_eq!(progress.current_streak_days, 1);
        assert_eq!(progress.total_workouts, 2);
    }

    #[test]
    fn test_from_records_replays_in_order() {
        let records = vec![
            record_at(day(2026, 3, 3), 1),
            record_at(day(2026, 3, 1), 1),
            record_at(day(2026, 3, 2), 1),
        ];
        let progress = UserProgress::from_records(&records);
        assert_eq!(progress.current_streak_days, 3);
        assert_eq!(progress.total_workouts, 3);
    }
}
