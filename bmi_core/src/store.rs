//! Record store persistence with file locking.
//!
//! The whole store (every user's history) lives in a single JSON document.
//! Reads are lenient: a missing or unreadable file is treated as an empty
//! store. Writes replace the file atomically.

use crate::{Error, MeasurementRecord, Result, UserId};
use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// In-memory view of the store: user -> chronological records
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Store {
    users: BTreeMap<UserId, Vec<MeasurementRecord>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a store with `record` appended to `user`'s history
    pub fn append(mut self, user: &UserId, record: MeasurementRecord) -> Self {
        self.users.entry(user.clone()).or_default().push(record);
        self
    }

    /// Records for `user`, oldest first. Empty for unknown users.
    pub fn history(&self, user: &str) -> &[MeasurementRecord] {
        self.users.get(user.trim()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Users with at least one record, sorted
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.users
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(user, _)| user)
    }

    pub fn is_empty(&self) -> bool {
        self.users.values().all(Vec::is_empty)
    }

    /// Build a store from the on-disk shape, skipping entries that fail
    /// validation. Each record is checked on its own so one malformed entry
    /// never hides the rest of the document.
    fn from_raw(raw: BTreeMap<String, Value>) -> Self {
        let mut users = BTreeMap::new();

        for (name, entry) in raw {
            let user = match UserId::new(&name) {
                Ok(user) => user,
                Err(_) => {
                    tracing::warn!("Skipping history stored under a blank username");
                    continue;
                }
            };

            let raw_records = match entry {
                Value::Array(raw_records) => raw_records,
                other => {
                    tracing::warn!("Skipping history for {:?}: expected a list, got {}", name, other);
                    continue;
                }
            };

            let records: &mut Vec<MeasurementRecord> = users.entry(user).or_default();
            for (index, raw_record) in raw_records.into_iter().enumerate() {
                match serde_json::from_value::<MeasurementRecord>(raw_record) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!("Skipping record {} for {:?}: {}", index, name, e);
                    }
                }
            }
        }

        Self { users }
    }
}

/// File-backed record store
#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the store file with an empty store if it does not exist yet
    pub fn init(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        tracing::info!("Creating empty store at {:?}", self.path);
        self.save(&Store::new())
    }

    /// Load the store with shared locking.
    ///
    /// Returns an empty store if the file doesn't exist.
    /// If the file is unreadable or corrupted, logs a warning and returns an
    /// empty store.
    pub fn load(&self) -> Store {
        let path = &self.path;
        if !path.exists() {
            tracing::info!("No store file found at {:?}, starting empty", path);
            return Store::new();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open store {:?}: {}. Starting empty.", path, e);
                return Store::new();
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock store {:?}: {}. Starting empty.", path, e);
            return Store::new();
        }

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read {
            tracing::warn!("Failed to read store {:?}: {}. Starting empty.", path, e);
            return Store::new();
        }

        match serde_json::from_str::<BTreeMap<String, Value>>(&contents) {
            Ok(raw) => {
                let store = Store::from_raw(raw);
                tracing::debug!("Loaded store from {:?}", path);
                store
            }
            Err(e) => {
                tracing::warn!("Failed to parse store {:?}: {}. Starting empty.", path, e);
                Store::new()
            }
        }
    }

    /// Save the whole store, replacing the file.
    ///
    /// Atomically writes by:
    /// 1. Writing to a locked temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, store: &Store) -> Result<()> {
        self.write_atomic(store).map_err(|source| Error::StorageWrite {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Saved store to {:?}", self.path);
        Ok(())
    }

    fn write_atomic(&self, store: &Store) -> std::io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            store.serialize(&mut ser)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap()
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(temp_dir.path().join("users.json"));

        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupted_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(RecordStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_load_wrong_shape_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        std::fs::write(&path, r#"["not", "a", "map"]"#).unwrap();

        assert!(RecordStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_append_creates_user() {
        let record = MeasurementRecord::new(day(1), 70.0, 175.0).unwrap();
        let store = Store::new().append(&alice(), record.clone());

        assert_eq!(store.history("alice"), &[record]);
        assert!(store.history("bob").is_empty());
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let first = MeasurementRecord::new(day(1), 70.0, 175.0).unwrap();
        let second = MeasurementRecord::new(day(2), 71.0, 175.0).unwrap();
        let store = Store::new()
            .append(&alice(), first.clone())
            .append(&alice(), second.clone());

        assert_eq!(store.history("alice"), &[first, second]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let record_store = RecordStore::new(temp_dir.path().join("users.json"));

        let record = MeasurementRecord::new(day(3), 82.5, 181.0).unwrap();
        let store = record_store.load().append(&alice(), record.clone());
        record_store.save(&store).unwrap();

        let loaded = record_store.load();
        assert_eq!(loaded, store);
        let history = loaded.history("alice");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp(), day(3));
        assert_eq!(history[0].weight_kg(), 82.5);
        assert_eq!(history[0].height_cm(), 181.0);
        assert_eq!(history[0].bmi(), record.bmi());
        assert_eq!(history[0].category(), Category::Overweight);
    }

    #[test]
    fn test_saved_file_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        let record_store = RecordStore::new(&path);

        let record = MeasurementRecord::new(day(4), 70.0, 175.0).unwrap();
        record_store
            .save(&Store::new().append(&alice(), record))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let entry = &value["alice"][0];
        assert_eq!(entry["date"], "2024-05-04 08:15:00");
        assert_eq!(entry["weight"], 70.0);
        assert_eq!(entry["height"], 175.0);
        assert_eq!(entry["bmi"], 22.9);
        assert_eq!(entry["category"], "Normal");
        assert!(contents.contains("\n    \"alice\""));
    }

    #[test]
    fn test_invalid_records_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{
                "alice": [
                    {"date": "2024-05-01 08:00:00", "weight": 70.0, "height": 175.0, "bmi": 22.9, "category": "Normal"},
                    {"date": "not a date", "weight": 70.0, "height": 175.0, "bmi": 22.9, "category": "Normal"},
                    {"date": "2024-05-02 08:00:00", "weight": -1.0, "height": 175.0, "bmi": 0.0, "category": "Underweight"}
                ],
                "  ": [
                    {"date": "2024-05-01 08:00:00", "weight": 70.0, "height": 175.0, "bmi": 22.9, "category": "Normal"}
                ]
            }"#,
        )
        .unwrap();

        let store = RecordStore::new(&path).load();
        assert_eq!(store.history("alice").len(), 1);
        assert_eq!(store.users().count(), 1);
    }

    #[test]
    fn test_badly_typed_record_does_not_hide_other_users() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{
                "alice": [
                    {"date": "2024-05-01 08:00:00", "weight": 70.0, "height": 175.0, "bmi": 22.9, "category": "Normal"}
                ],
                "bob": [
                    {"date": "2024-05-01 08:00:00", "weight": "80", "height": 180.0, "bmi": 24.7, "category": "Normal"},
                    {"date": "2024-05-02 08:00:00", "weight": null, "height": 180.0},
                    {"date": "2024-05-03 08:00:00", "weight": 81.0},
                    "garbage",
                    {"date": "2024-05-04 08:00:00", "weight": 82.0, "height": 180.0, "bmi": 25.3, "category": "Overweight"}
                ],
                "carol": {"not": "a list"}
            }"#,
        )
        .unwrap();
        let record_store = RecordStore::new(&path);

        let store = record_store.load();
        assert_eq!(store.history("alice").len(), 1);
        assert_eq!(store.history("bob").len(), 1);
        assert_eq!(store.history("bob")[0].weight_kg(), 82.0);
        assert!(store.history("carol").is_empty());

        // Writing a new record keeps every valid entry already on disk
        let record = MeasurementRecord::new(day(6), 60.0, 165.0).unwrap();
        let dave = UserId::new("dave").unwrap();
        record_store.save(&store.append(&dave, record)).unwrap();

        let reloaded = record_store.load();
        assert_eq!(reloaded.history("alice").len(), 1);
        assert_eq!(reloaded.history("bob").len(), 1);
        assert_eq!(reloaded.history("dave").len(), 1);
    }

    #[test]
    fn test_init_creates_empty_store_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data").join("users.json");
        let record_store = RecordStore::new(&path);

        record_store.init().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "{}");

        // Existing data is left alone
        let record = MeasurementRecord::new(day(5), 70.0, 175.0).unwrap();
        record_store
            .save(&Store::new().append(&alice(), record))
            .unwrap();
        record_store.init().unwrap();
        assert_eq!(record_store.load().history("alice").len(), 1);
    }

    #[test]
    fn test_atomic_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");

        RecordStore::new(&path).save(&Store::new()).unwrap();

        // Verify store file exists and no stray temp files remain
        assert!(path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "users.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only users.json, found extras: {:?}",
            extras
        );
    }

    #[test]
    fn test_save_over_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");
        std::fs::create_dir_all(&path).unwrap();

        let err = RecordStore::new(&path).save(&Store::new()).unwrap_err();
        assert!(matches!(err, Error::StorageWrite { .. }));
    }
}
