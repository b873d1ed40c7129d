//! Key-value persistence abstraction.
//!
//! A trait over string keys and values, in the shape of a browser local
//! storage. [`FileStorage`] keeps one file per key under a directory;
//! [`MemoryStorage`] backs sessions where persistence is unavailable
//! (private browsing, quota, read-only mounts) — the session still runs,
//! it just forgets.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a directory. Keys use a `prefix:name`
/// convention; the colon maps to a dot for the file name.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        // Probe writability up front so a read-only mount degrades at
        // startup rather than on the first answer.
        let probe = dir.join(".write-probe");
        fs::write(&probe, b"ok")?;
        fs::remove_file(&probe)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key.replace(':', ".")))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Volatile fallback store.
#[derive(Default)]
pub struct MemoryStorage {
    map: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }
}

/// Open file-backed storage, degrading to in-memory (with one warning)
/// when the directory cannot be used. The session runs either way.
pub fn open_or_memory(dir: impl AsRef<Path>) -> Rc<dyn Storage> {
    match FileStorage::open(&dir) {
        Ok(s) => Rc::new(s),
        Err(err) => {
            warn!(
                target: "state",
                dir = %dir.as_ref().display(),
                error = %err,
                "persistence unavailable; running with in-memory storage"
            );
            Rc::new(MemoryStorage::new())
        }
    }
}
