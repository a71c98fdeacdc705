/// JSON file persistence for the entity store.
///
/// One file per collection plus a counters file, all under a single data
/// directory. Writes are atomic: each file is serialized to a temporary
/// file in the same directory and renamed over the target, so a crash
/// mid-save never leaves a half-written file behind.
///
/// The engine treats saving as a best-effort synchronous flush; the
/// coordinator logs failures instead of rolling back in-memory state.
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::store::{EntityStore, IdCounters};

const PATIENTS_FILE: &str = "patients.json";
const PRACTITIONERS_FILE: &str = "practitioners.json";
const SLOTS_FILE: &str = "slots.json";
const APPOINTMENTS_FILE: &str = "appointments.json";
const INVOICES_FILE: &str = "invoices.json";
const COUNTERS_FILE: &str = "counters.json";

/// Handle to the on-disk data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Storage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when any prior persisted state exists.
    pub fn has_saved_data(&self) -> bool {
        [PATIENTS_FILE, PRACTITIONERS_FILE, APPOINTMENTS_FILE]
            .iter()
            .any(|f| self.dir.join(f).exists())
    }

    /// Persist every collection and the id counters. All-or-nothing per
    /// file; an error aborts the remaining writes.
    pub fn save_all(&self, store: &EntityStore) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        self.write_file(PATIENTS_FILE, &store.patients)?;
        self.write_file(PRACTITIONERS_FILE, &store.practitioners)?;
        self.write_file(SLOTS_FILE, &store.slots)?;
        self.write_file(APPOINTMENTS_FILE, &store.appointments)?;
        self.write_file(INVOICES_FILE, &store.invoices)?;
        self.write_file(COUNTERS_FILE, store.counters())?;

        debug!(dir = %self.dir.display(), "saved all collections");
        Ok(())
    }

    /// Load the persisted store, or `None` when no prior state exists.
    /// Missing individual files load as empty collections.
    pub fn load_all(&self) -> Result<Option<EntityStore>, StorageError> {
        if !self.has_saved_data() {
            return Ok(None);
        }

        let patients = self.read_file(PATIENTS_FILE)?.unwrap_or_default();
        let practitioners = self.read_file(PRACTITIONERS_FILE)?.unwrap_or_default();
        let slots: HashMap<u32, _> = self.read_file(SLOTS_FILE)?.unwrap_or_default();
        let appointments = self.read_file(APPOINTMENTS_FILE)?.unwrap_or_default();
        let invoices = self.read_file(INVOICES_FILE)?.unwrap_or_default();
        let counters: IdCounters = self.read_file(COUNTERS_FILE)?.unwrap_or_default();

        debug!(dir = %self.dir.display(), "loaded all collections");
        Ok(Some(EntityStore::from_parts(
            patients,
            practitioners,
            slots,
            appointments,
            invoices,
            counters,
        )))
    }

    fn write_file<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(self.dir.join(name)).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_file<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
    }

    #[test]
    fn empty_directory_has_no_saved_data() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        assert!(!storage.has_saved_data());
        assert!(storage.load_all().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_the_store() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let store = EntityStore::seed(today());
        storage.save_all(&store).unwrap();
        assert!(storage.has_saved_data());

        let loaded = storage.load_all().unwrap().unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let mut store = EntityStore::seed(today());
        storage.save_all(&store).unwrap();

        let first = store.appointments()[0].id;
        store.remove_appointment(first);
        storage.save_all(&store).unwrap();

        let loaded = storage.load_all().unwrap().unwrap();
        assert!(loaded.appointment(first).is_none());
        assert_eq!(loaded.appointments().len(), 2);
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data");
        let storage = Storage::new(&nested);

        storage.save_all(&EntityStore::new()).unwrap();
        assert!(nested.join("counters.json").exists());
    }
}
