//! Custodial key and wallet persistence
//!
//! Two independent stores keyed by patient id:
//! - [`KeyVault`] holds sealed private keys
//! - [`WalletDirectory`] holds public [`WalletRecord`]s
//!
//! Both are write-once: storing an entry for a patient that already has one
//! fails with [`StoreError::AlreadyExists`]. File-backed stores write one
//! JSON document per patient with create-new semantics.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use mycelix_health_crypto::SealedKey;
use mycelix_health_shared::{HealthError, PatientId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::integrity::WalletRecord;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("an entry for patient {0} already exists")]
    AlreadyExists(PatientId),

    #[error("no entry for patient {0}")]
    NotFound(PatientId),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

impl From<StoreError> for HealthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(patient_id) => {
                HealthError::NotFound(format!("Custodial wallet for patient {}", patient_id))
            }
            other => HealthError::Storage(other.to_string()),
        }
    }
}

pub trait KeyVault: Send + Sync {
    fn store(&self, patient_id: PatientId, sealed: &SealedKey) -> Result<(), StoreError>;

    fn load(&self, patient_id: PatientId) -> Result<SealedKey, StoreError>;

    fn contains(&self, patient_id: PatientId) -> bool {
        self.load(patient_id).is_ok()
    }
}

pub trait WalletDirectory: Send + Sync {
    fn store(&self, record: &WalletRecord) -> Result<(), StoreError>;

    fn load(&self, patient_id: PatientId) -> Result<WalletRecord, StoreError>;

    fn contains(&self, patient_id: PatientId) -> bool {
        self.load(patient_id).is_ok()
    }
}

// ==================== FILE BACKENDS ====================

fn entry_path(dir: &Path, patient_id: PatientId) -> PathBuf {
    dir.join(format!("patient-{}.json", patient_id))
}

/// Write `value` as a new file; never overwrites
fn write_new<T: Serialize>(path: &Path, value: &T, private: bool, patient_id: PatientId) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(patient_id),
        _ => StoreError::Io(format!("{}: {}", path.display(), e)),
    })?;
    file.write_all(&bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
}

fn read_entry<T: DeserializeOwned>(path: &Path, patient_id: PatientId) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(patient_id),
        _ => StoreError::Io(format!("{}: {}", path.display(), e)),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))
}

/// Sealed keys as owner-only files in a dedicated directory
#[derive(Clone, Debug)]
pub struct FileKeyVault {
    dir: PathBuf,
}

impl FileKeyVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl KeyVault for FileKeyVault {
    fn store(&self, patient_id: PatientId, sealed: &SealedKey) -> Result<(), StoreError> {
        write_new(&entry_path(&self.dir, patient_id), sealed, true, patient_id)
    }

    fn load(&self, patient_id: PatientId) -> Result<SealedKey, StoreError> {
        read_entry(&entry_path(&self.dir, patient_id), patient_id)
    }

    fn contains(&self, patient_id: PatientId) -> bool {
        entry_path(&self.dir, patient_id).exists()
    }
}

#[derive(Clone, Debug)]
pub struct FileWalletDirectory {
    dir: PathBuf,
}

impl FileWalletDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl WalletDirectory for FileWalletDirectory {
    fn store(&self, record: &WalletRecord) -> Result<(), StoreError> {
        write_new(&entry_path(&self.dir, record.patient_id), record, false, record.patient_id)
    }

    fn load(&self, patient_id: PatientId) -> Result<WalletRecord, StoreError> {
        read_entry(&entry_path(&self.dir, patient_id), patient_id)
    }

    fn contains(&self, patient_id: PatientId) -> bool {
        entry_path(&self.dir, patient_id).exists()
    }
}

// ==================== MEMORY BACKENDS ====================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory key vault; can be switched to fail writes
#[derive(Debug, Default)]
pub struct MemoryKeyVault {
    entries: Mutex<HashMap<PatientId, SealedKey>>,
    fail_writes: Mutex<bool>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `store` fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyVault for MemoryKeyVault {
    fn store(&self, patient_id: PatientId, sealed: &SealedKey) -> Result<(), StoreError> {
        if *lock(&self.fail_writes) {
            return Err(StoreError::Io("key vault is read-only".to_string()));
        }
        let mut entries = lock(&self.entries);
        if entries.contains_key(&patient_id) {
            return Err(StoreError::AlreadyExists(patient_id));
        }
        entries.insert(patient_id, sealed.clone());
        Ok(())
    }

    fn load(&self, patient_id: PatientId) -> Result<SealedKey, StoreError> {
        lock(&self.entries)
            .get(&patient_id)
            .cloned()
            .ok_or(StoreError::NotFound(patient_id))
    }
}

/// In-memory wallet directory; can be switched to fail writes
#[derive(Debug, Default)]
pub struct MemoryWalletDirectory {
    entries: Mutex<HashMap<PatientId, WalletRecord>>,
    fail_writes: Mutex<bool>,
}

impl MemoryWalletDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `store` fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalletDirectory for MemoryWalletDirectory {
    fn store(&self, record: &WalletRecord) -> Result<(), StoreError> {
        if *lock(&self.fail_writes) {
            return Err(StoreError::Io("wallet directory is read-only".to_string()));
        }
        let mut entries = lock(&self.entries);
        if entries.contains_key(&record.patient_id) {
            return Err(StoreError::AlreadyExists(record.patient_id));
        }
        entries.insert(record.patient_id, record.clone());
        Ok(())
    }

    fn load(&self, patient_id: PatientId) -> Result<WalletRecord, StoreError> {
        lock(&self.entries)
            .get(&patient_id)
            .cloned()
            .ok_or(StoreError::NotFound(patient_id))
    }
}
