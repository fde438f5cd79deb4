//! Small persisted scalars.
//!
//! The schedule state (last send time, scheduled send time, server-advised
//! limits) lives in a key/value preference store. Each get/put is atomic
//! per field; no multi-field transaction is offered. The file-backed
//! implementation persists the whole map on every put with a
//! write-temp-then-rename so a crash never leaves a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

/// Errors from preference store I/O.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scalar get/put for persisted schedule state, durable across restarts in
/// production implementations.
pub trait PreferenceStore: Send + Sync {
    fn get_u64(&self, key: &str, default: u64) -> u64;
    fn put_u64(&self, key: &str, value: u64);
}

/// In-memory [`PreferenceStore`] for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, u64>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).copied().unwrap_or(default)
    }

    fn put_u64(&self, key: &str, value: u64) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }
}

/// File-backed [`PreferenceStore`] storing a JSON object of `key: u64`.
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, u64>>,
}

impl FilePreferenceStore {
    /// Open the store at `path`, loading existing values if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(FilePreferenceStore {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &BTreeMap<String, u64>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(values)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Path this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).copied().unwrap_or(default)
    }

    fn put_u64(&self, key: &str, value: u64) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        if let Err(e) = self.persist(&values) {
            // Durability is best-effort; the in-memory value still wins for
            // this process lifetime.
            warn!(key, error = %e, "failed to persist preference");
        }
    }
}
