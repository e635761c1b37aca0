//! History service: records measurements and answers history queries.
//!
//! Every call re-reads the store from disk; nothing is cached between calls.

use crate::{Error, MeasurementRecord, RecordStore, Result, TrendPoint, UserId};
use chrono::NaiveDateTime;

/// Number of records shown in the recent history view
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Minimum number of records before a trend is worth charting
pub const MIN_TREND_POINTS: usize = 2;

/// Orchestrates the BMI engine and the record store
#[derive(Clone, Debug)]
pub struct HistoryService {
    store: RecordStore,
}

impl HistoryService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Compute, append and persist a new measurement.
    ///
    /// `now` must not be earlier than the user's latest record, so insertion
    /// order stays chronological. Nothing is written when the input is
    /// rejected. If the computed record cannot be saved, the error is
    /// `Error::NotPersisted` and still carries the record.
    pub fn record_measurement(
        &self,
        user_id: &str,
        weight_kg: f64,
        height_cm: f64,
        now: NaiveDateTime,
    ) -> Result<MeasurementRecord> {
        let user = UserId::new(user_id)?;
        let record = MeasurementRecord::new(now, weight_kg, height_cm)?;

        let store = self.store.load();
        if let Some(last) = store.history(user.as_str()).last() {
            if record.timestamp() < last.timestamp() {
                return Err(Error::invalid_input(format!(
                    "Measurement time {} is earlier than the last one for {} ({})",
                    record.date_string(),
                    user,
                    last.date_string()
                )));
            }
        }

        let store = store.append(&user, record.clone());
        if let Err(e) = self.store.save(&store) {
            tracing::warn!("Measurement for {} computed but not saved: {}", user, e);
            return Err(Error::NotPersisted {
                record: Box::new(record),
                source: Box::new(e),
            });
        }

        tracing::info!(
            "Recorded BMI {} ({}) for {}",
            record.bmi(),
            record.category(),
            user
        );
        Ok(record)
    }

    /// Up to `limit` most recent records for `user_id`, newest first.
    ///
    /// Unknown or blank users yield an empty list.
    pub fn recent_history(&self, user_id: &str, limit: usize) -> Vec<MeasurementRecord> {
        if user_id.trim().is_empty() {
            return Vec::new();
        }

        self.store
            .load()
            .history(user_id)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Full chronological BMI series for charting.
    ///
    /// Empty when the user has fewer than `MIN_TREND_POINTS` records.
    pub fn trend_series(&self, user_id: &str) -> Vec<TrendPoint> {
        if user_id.trim().is_empty() {
            return Vec::new();
        }

        let store = self.store.load();
        let history = store.history(user_id);
        if history.len() < MIN_TREND_POINTS {
            tracing::debug!(
                "{} records for {:?}, not enough for a trend",
                history.len(),
                user_id
            );
            return Vec::new();
        }

        history.iter().map(MeasurementRecord::trend_point).collect()
    }

    /// Full chronological history for `user_id`
    pub fn full_history(&self, user_id: &str) -> Vec<MeasurementRecord> {
        self.store.load().history(user_id).to_vec()
    }

    /// Users with at least one record, sorted
    pub fn users(&self) -> Vec<UserId> {
        self.store.load().users().cloned().collect()
    }
}
