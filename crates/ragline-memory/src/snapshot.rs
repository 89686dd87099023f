use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::error::MemoryError;

/// A JSON snapshot file rewritten wholesale on every mutation.
///
/// Each snapshot carries the generation of the mutation it was cloned after. Writes
/// are serialized and a generation older than the last persisted one is dropped, so
/// the file always ends at the latest logical state even when writers finish out of order.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    persisted: Mutex<u64>,
}

impl SnapshotFile {
    #[must_use]
    pub fn new(path: PathBuf, loaded_generation: u64) -> Self {
        Self {
            path,
            persisted: Mutex::new(loaded_generation),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `false` when a newer generation was already on disk and this one was skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub async fn write<T>(&self, generation: u64, value: T) -> Result<bool, MemoryError>
    where
        T: Serialize + Send + 'static,
    {
        let mut persisted = self.persisted.lock().await;
        if generation <= *persisted {
            tracing::debug!(
                generation,
                persisted = *persisted,
                path = %self.path.display(),
                "skipping superseded snapshot"
            );
            return Ok(false);
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_json_atomic(&path, &value)).await??;
        *persisted = generation;
        Ok(true)
    }
}

/// Temp file in the target directory, fsync, then rename over the target.
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), MemoryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// A missing file yields `T::default()`.
///
/// # Errors
///
/// Returns an error for unreadable or malformed files.
pub fn read_json_or_default<T>(path: &Path) -> Result<T, MemoryError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
