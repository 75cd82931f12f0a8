//! Alarm persistence.
//!
//! The whole collection lives under one well-known key. Read and write
//! failures are logged and surface as an empty or unchanged collection;
//! callers never see a storage error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::alarm::{Alarm, AlarmId};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Key the alarm collection is stored under.
pub const ALARMS_KEY: &str = "savedAlarms";

pub trait AlarmStore: Send + Sync {
    fn load_alarms(&self) -> Vec<Alarm>;

    fn save_alarms(&self, alarms: &[Alarm]);

    /// Insert or replace the record with `alarm.id`.
    fn save_alarm(&self, alarm: &Alarm);

    fn delete_alarm(&self, id: AlarmId);

    fn get_alarm(&self, id: AlarmId) -> Option<Alarm> {
        self.load_alarms().into_iter().find(|a| a.id == id)
    }
}

fn upsert(alarms: &mut Vec<Alarm>, alarm: &Alarm) {
    match alarms.iter_mut().find(|a| a.id == alarm.id) {
        Some(existing) => *existing = alarm.clone(),
        None => alarms.push(alarm.clone()),
    }
}

/// Alarm collection kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    alarms: Mutex<Vec<Alarm>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarms(alarms: impl IntoIterator<Item = Alarm>) -> Self {
        let store = Self::new();
        for alarm in alarms {
            upsert(&mut store.alarms.lock(), &alarm);
        }
        store
    }
}

impl AlarmStore for MemoryStore {
    fn load_alarms(&self) -> Vec<Alarm> {
        self.alarms.lock().clone()
    }

    fn save_alarms(&self, alarms: &[Alarm]) {
        *self.alarms.lock() = alarms.to_vec();
    }

    fn save_alarm(&self, alarm: &Alarm) {
        upsert(&mut self.alarms.lock(), alarm);
    }

    fn delete_alarm(&self, id: AlarmId) {
        self.alarms.lock().retain(|a| a.id != id);
    }
}

/// Alarm collection persisted as a JSON key-value document on disk.
///
/// The file is a JSON object; the collection sits under [`ALARMS_KEY`] and
/// any other keys are preserved on write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, seeding [`Alarm::default_presets`] when no
    /// collection has been stored yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };

        match store.read_collection() {
            Ok(Some(_)) => {}
            Ok(None) => {
                let presets = Alarm::default_presets();
                info!(
                    path = %store.path.display(),
                    count = presets.len(),
                    "Seeding default alarms"
                );
                store.save_alarms(&presets);
            }
            Err(e) => warn!(path = %store.path.display(), error = %e, "Failed to read alarm store"),
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_collection(&self) -> Result<Option<Vec<Alarm>>> {
        let mut document = self.read_document()?;
        document
            .remove(ALARMS_KEY)
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .transpose()
    }

    fn write_collection(&self, alarms: &[Alarm]) -> Result<()> {
        // A corrupt document is replaced rather than blocking every save.
        let mut document = self.read_document().unwrap_or_default();
        document.insert(ALARMS_KEY.to_string(), serde_json::to_value(alarms)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&document)?)?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("replace {}: {e}", self.path.display())))
    }

    fn load_locked(&self) -> Vec<Alarm> {
        match self.read_collection() {
            Ok(alarms) => alarms.unwrap_or_default(),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to load alarms");
                Vec::new()
            }
        }
    }

    fn save_locked(&self, alarms: &[Alarm]) {
        if let Err(e) = self.write_collection(alarms) {
            error!(path = %self.path.display(), error = %e, "Failed to save alarms");
        }
    }
}

impl AlarmStore for JsonFileStore {
    fn load_alarms(&self) -> Vec<Alarm> {
        let _guard = self.lock.lock();
        self.load_locked()
    }

    fn save_alarms(&self, alarms: &[Alarm]) {
        let _guard = self.lock.lock();
        self.save_locked(alarms);
    }

    fn save_alarm(&self, alarm: &Alarm) {
        let _guard = self.lock.lock();
        let mut alarms = self.load_locked();
        upsert(&mut alarms, alarm);
        self.save_locked(&alarms);
    }

    fn delete_alarm(&self, id: AlarmId) {
        let _guard = self.lock.lock();
        let mut alarms = self.load_locked();
        alarms.retain(|a| a.id != id);
        self.save_locked(&alarms);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::time;

    use super::*;
    use crate::alarm::Weekday;

    #[test]
    fn first_open_seeds_presets() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("alarms.json"));
        assert_eq!(store.load_alarms().len(), Alarm::default_presets().len());
    }

    #[test]
    fn reopen_does_not_reseed_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");

        let store = JsonFileStore::open(&path);
        store.save_alarms(&[]);

        let reopened = JsonFileStore::open(&path);
        assert!(reopened.load_alarms().is_empty());
    }

    #[test]
    fn save_alarm_upserts_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("alarms.json"));
        store.save_alarms(&[]);

        let mut alarm = Alarm::new("Run", time!(06:00)).with_days([Weekday::Tuesday]);
        store.save_alarm(&alarm);
        alarm.title = "Long run".into();
        store.save_alarm(&alarm);

        let alarms = store.load_alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].title, "Long run");
        assert_eq!(store.get_alarm(alarm.id), Some(alarm.clone()));

        store.delete_alarm(alarm.id);
        assert!(store.load_alarms().is_empty());
        assert_eq!(store.get_alarm(alarm.id), None);
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert!(store.load_alarms().is_empty());

        // Saving replaces the corrupt document.
        let alarm = Alarm::new("Fresh", time!(05:45));
        store.save_alarm(&alarm);
        assert_eq!(store.load_alarms(), vec![alarm]);
    }

    #[test]
    fn unrelated_keys_survive_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        fs::write(&path, r#"{"theme":"dark","savedAlarms":[]}"#).unwrap();

        let store = JsonFileStore::open(&path);
        store.save_alarm(&Alarm::new("Tea", time!(16:00)));

        let document: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["theme"], "dark");
        assert_eq!(document[ALARMS_KEY].as_array().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_upserts_and_deletes() {
        let alarm = Alarm::new("Nap", time!(13:00));
        let store = MemoryStore::with_alarms([alarm.clone()]);

        let mut edited = alarm.clone();
        edited.is_active = false;
        store.save_alarm(&edited);
        assert_eq!(store.load_alarms(), vec![edited]);

        store.delete_alarm(alarm.id);
        assert!(store.load_alarms().is_empty());
    }
}
