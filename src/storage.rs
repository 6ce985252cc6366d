// Durable key-value persistence for the task collection

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the collection is stored unless configured otherwise
pub const DEFAULT_KEY: &str = "todos";

/// Key-value store the task collection is persisted into
///
/// Reads happen once at startup; every mutation writes the full collection.
pub trait KeyValueStore {
    /// Stored value for `key`, or `None` when nothing has been written yet
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Reject keys this backend can never read or write
    fn check_key(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Validate a storage key (non-empty, max 64 chars, alphanumeric with _/-)
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

/// In-process store, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a raw value, as if written by an earlier session
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut storage = Self::default();
        storage.values.insert(key.to_string(), value.to_string());
        storage
    }

    /// Number of successful `set` calls
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every subsequent `get` fail, simulating an unreadable backend
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every subsequent `set` fail, simulating an unavailable backend
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Raw stored value, bypassing the trait
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(eyre!("Storage unreadable"));
        }
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(eyre!("Storage unavailable"));
        }
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Directory-backed store: one `{key}.json` file per key
///
/// Each `get`/`set` takes the directory lock for its own duration. Callers
/// that read, modify and write back (one CLI invocation) call
/// [`FileStorage::hold_lock`] first so the whole cycle is exclusive.
pub struct FileStorage {
    base_path: PathBuf,
    held_lock: Option<fs::File>,
}

impl FileStorage {
    /// Open or create a store rooted at the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;
        debug!(path = ?base_path, "Opened file storage");
        Ok(Self {
            base_path,
            held_lock: None,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Take the exclusive directory lock until this storage is dropped
    ///
    /// Blocks while another process holds it.
    pub fn hold_lock(&mut self) -> Result<()> {
        if self.held_lock.is_some() {
            return Ok(());
        }
        let lock = self.lock_file()?;
        FileExt::lock_exclusive(&lock).context("Failed to acquire storage lock")?;
        debug!(path = ?self.base_path, "Holding storage lock");
        self.held_lock = Some(lock);
        Ok(())
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    fn lock_file(&self) -> Result<fs::File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open storage lock file")
    }

    /// Lock for a single operation, unless the session lock is already held
    ///
    /// A second flock on another descriptor would block on our own session lock.
    fn lock_for_op(&self, exclusive: bool) -> Result<Option<fs::File>> {
        if self.held_lock.is_some() {
            return Ok(None);
        }
        let lock = self.lock_file()?;
        if exclusive {
            FileExt::lock_exclusive(&lock).context("Failed to acquire storage lock")?;
        } else {
            FileExt::lock_shared(&lock).context("Failed to acquire storage lock")?;
        }
        Ok(Some(lock))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key)?;
        let _lock = self.lock_for_op(false)?;

        match fs::read_to_string(&path) {
            Ok(value) => {
                debug!(file = ?path, bytes = value.len(), "Read stored value");
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).wrap_err_with(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key)?;
        let _lock = self.lock_for_op(true)?;

        // Write to a temp file in the same directory, then rename over the target
        let mut temp = tempfile::NamedTempFile::new_in(&self.base_path).context("Failed to create temp file")?;
        temp.write_all(value.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path)
            .wrap_err_with(|| format!("Failed to replace {}", path.display()))?;

        debug!(file = ?path, bytes = value.len(), "Wrote stored value");
        Ok(())
    }

    fn check_key(&self, key: &str) -> Result<()> {
        validate_key(key)
    }
}
