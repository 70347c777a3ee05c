//! Shared plumbing for the JSON cache stores.
//!
//! Every store file `X` is guarded by an advisory lock on `X.lock` so that
//! separate processes sharing one cache home do not interleave writes.
//! Waiting is bounded; past the deadline the caller proceeds unlocked.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};

pub const LOCK_WAIT: Duration = Duration::from_secs(3);
const LOCK_POLL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct StoreLock {
    file: Option<File>,
}

impl StoreLock {
    pub fn acquire(store: &Path, wait: Duration) -> Self {
        let lock_path = lock_path(store);
        if let Some(parent) = lock_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
        {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(lock = %lock_path.display(), error = %e, "cannot open lock file, continuing unlocked");
                return Self { file: None };
            }
        };

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock() {
                Ok(()) => return Self { file: Some(file) },
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_POLL);
                }
                Err(TryLockError::WouldBlock) => {
                    tracing::warn!(lock = %lock_path.display(), "lock wait timed out, continuing unlocked");
                    return Self { file: None };
                }
                Err(TryLockError::Error(e)) => {
                    tracing::warn!(lock = %lock_path.display(), error = %e, "lock failed, continuing unlocked");
                    return Self { file: None };
                }
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

pub fn lock_path(store: &Path) -> PathBuf {
    let mut os = store.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// Reads a JSON store under its lock. `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(store: &Path) -> Result<Option<T>> {
    let _lock = StoreLock::acquire(store, LOCK_WAIT);
    if !store.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(store)
        .with_context(|| format!("Failed to read store: {}", store.display()))?;
    let value = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse store: {}", store.display()))?;
    Ok(Some(value))
}

pub fn save_json<T: Serialize>(store: &Path, value: &T) -> Result<()> {
    if let Some(parent) = store.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
    }

    let _lock = StoreLock::acquire(store, LOCK_WAIT);
    let payload = serde_json::to_vec(value)?;

    let mut tmp_os = store.as_os_str().to_os_string();
    tmp_os.push(".tmp");
    let tmp = PathBuf::from(tmp_os);
    std::fs::write(&tmp, payload)
        .with_context(|| format!("Failed to write store: {}", tmp.display()))?;
    std::fs::rename(&tmp, store)
        .with_context(|| format!("Failed to replace store: {}", store.display()))?;
    Ok(())
}

pub fn modified_nanos(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    let modified = meta.modified().unwrap_or(UNIX_EPOCH);
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    Some(u64::try_from(nanos).unwrap_or(u64::MAX))
}
