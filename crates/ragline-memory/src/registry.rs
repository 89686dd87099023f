use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::error::MemoryError;
use crate::snapshot::{SnapshotFile, read_json_or_default};
use crate::types::DocumentRecord;

pub const REGISTRY_FILE: &str = "documents.json";

#[derive(Default)]
struct RegistryState {
    records: HashMap<String, DocumentRecord>,
    generation: u64,
}

/// Persisted metadata of ingested documents, keyed by document id.
pub struct DocumentRegistry {
    state: RwLock<RegistryState>,
    snapshot: SnapshotFile,
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("snapshot", &self.snapshot.path())
            .finish_non_exhaustive()
    }
}

impl DocumentRegistry {
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `documents.json` is unreadable.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(REGISTRY_FILE);

        let load_path = path.clone();
        let records: HashMap<String, DocumentRecord> =
            tokio::task::spawn_blocking(move || read_json_or_default(&load_path)).await??;
        tracing::debug!(documents = records.len(), "document registry loaded");

        Ok(Self {
            state: RwLock::new(RegistryState {
                records,
                generation: 0,
            }),
            snapshot: SnapshotFile::new(path, 0),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the registry file cannot be written.
    pub async fn register(&self, record: DocumentRecord) -> Result<(), MemoryError> {
        let (generation, snapshot) = {
            let mut state = self.state.write().map_err(|_| MemoryError::LockPoisoned)?;
            state.records.insert(record.id.clone(), record);
            state.generation += 1;
            (state.generation, state.records.clone())
        };
        self.snapshot.write(generation, snapshot).await?;
        Ok(())
    }

    /// Removes and returns the record, or `None` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be written.
    pub async fn remove(&self, id: &str) -> Result<Option<DocumentRecord>, MemoryError> {
        let (removed, generation, snapshot) = {
            let mut state = self.state.write().map_err(|_| MemoryError::LockPoisoned)?;
            let Some(removed) = state.records.remove(id) else {
                return Ok(None);
            };
            state.generation += 1;
            (removed, state.generation, state.records.clone())
        };
        self.snapshot.write(generation, snapshot).await?;
        Ok(Some(removed))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.state.read().ok()?.records.get(id).cloned()
    }

    /// Records sorted oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn list(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        let state = self.state.read().map_err(|_| MemoryError::LockPoisoned)?;
        let mut records: Vec<DocumentRecord> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().map_or(0, |s| s.records.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn record(id: &str, minutes_ago: i64) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            file_name: format!("{id}.md"),
            chunk_count: 2,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn register_list_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::open(dir.path()).await.unwrap();
        registry.register(record("new", 1)).await.unwrap();
        registry.register(record("old", 10)).await.unwrap();

        let ids: Vec<String> = registry.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["old", "new"]);

        drop(registry);
        let reloaded = DocumentRegistry::open(dir.path()).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("old").unwrap().file_name, "old.md");
    }

    #[tokio::test]
    async fn remove_unknown_returns_none_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::open(dir.path()).await.unwrap();
        assert!(registry.remove("ghost").await.unwrap().is_none());
        assert!(!dir.path().join(REGISTRY_FILE).exists());
    }

    #[tokio::test]
    async fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::open(dir.path()).await.unwrap();
        registry.register(record("a", 0)).await.unwrap();
        let removed = registry.remove("a").await.unwrap().unwrap();
        assert_eq!(removed.id, "a");
        assert!(registry.is_empty());

        let reloaded = DocumentRegistry::open(dir.path()).await.unwrap();
        assert!(reloaded.is_empty());
    }
}
