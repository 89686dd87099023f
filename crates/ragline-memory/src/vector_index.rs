use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::MemoryError;
use crate::snapshot::{SnapshotFile, read_json_or_default};
use crate::types::{Fragment, SimilarityResult};

pub const SNAPSHOT_FILE: &str = "vectors.json";

type FragmentMap = HashMap<String, Fragment>;

#[derive(Default)]
struct IndexState {
    fragments: FragmentMap,
    dimension: Option<usize>,
    generation: u64,
}

/// Concurrent in-memory fragment index with full-snapshot persistence.
///
/// Searches share a read lock. Mutations hold the write lock only while changing the
/// map and cloning it; the snapshot is written afterwards from the clone.
pub struct VectorIndex {
    state: RwLock<IndexState>,
    snapshot: SnapshotFile,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("snapshot", &self.snapshot.path())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Open the index stored under `dir`, loading `vectors.json` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the snapshot is unreadable.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(SNAPSHOT_FILE);

        let load_path = path.clone();
        let loaded: FragmentMap =
            tokio::task::spawn_blocking(move || read_json_or_default(&load_path)).await??;
        let state = sanitize_loaded(loaded);

        tracing::info!(
            fragments = state.fragments.len(),
            dimension = ?state.dimension,
            path = %path.display(),
            "vector index loaded"
        );

        Ok(Self {
            state: RwLock::new(state),
            snapshot: SnapshotFile::new(path, 0),
        })
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        self.snapshot.path()
    }

    /// Insert fragments, replacing any with the same id, then persist a snapshot.
    ///
    /// The whole batch is rejected if any fragment lacks a finite embedding or its
    /// dimension differs from the index. A failed snapshot write is returned but the in-memory
    /// insert stays.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad fragments or an I/O error from the snapshot.
    pub async fn insert(&self, fragments: Vec<Fragment>) -> Result<(), MemoryError> {
        if fragments.is_empty() {
            return Ok(());
        }

        let (generation, snapshot) = {
            let mut state = self.write_state()?;
            let dimension = validate_batch(&fragments, state.dimension)?;

            let count = fragments.len();
            for fragment in fragments {
                state.fragments.insert(fragment.id.clone(), fragment);
            }
            state.dimension = Some(dimension);
            state.generation += 1;
            tracing::debug!(count, total = state.fragments.len(), "fragments inserted");
            (state.generation, state.fragments.clone())
        };

        self.persist(generation, snapshot).await
    }

    /// Top-`top_k` fragments by cosine similarity, best first.
    ///
    /// Ties are broken by document id, then fragment ordinal, then fragment id.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::EmptyQuery`] for an empty query,
    /// [`MemoryError::NonFiniteEmbedding`] for NaN or infinite components and
    /// [`MemoryError::DimensionMismatch`] when the query length differs from the index.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SimilarityResult>, MemoryError> {
        if query.is_empty() {
            return Err(MemoryError::EmptyQuery);
        }
        if !is_finite(query) {
            return Err(MemoryError::NonFiniteEmbedding("query".into()));
        }

        let state = self.read_state()?;
        if state.fragments.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = state.dimension
            && expected != query.len()
        {
            return Err(MemoryError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(&Fragment, f32)> = state
            .fragments
            .values()
            .filter_map(|f| {
                f.embedding
                    .as_deref()
                    .map(|e| (f, cosine_similarity(query, e)))
            })
            .collect();

        scored.sort_by(|(fa, sa), (fb, sb)| {
            sb.total_cmp(sa)
                .then_with(|| fa.doc_id.cmp(&fb.doc_id))
                .then_with(|| fa.index.cmp(&fb.index))
                .then_with(|| fa.id.cmp(&fb.id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(fragment, score)| SimilarityResult {
                fragment: fragment.clone(),
                score,
            })
            .collect())
    }

    /// Remove every fragment of `doc_id`. Unknown ids are a no-op and write nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot write fails.
    pub async fn delete_by_document(&self, doc_id: &str) -> Result<usize, MemoryError> {
        let (removed, generation, snapshot) = {
            let mut state = self.write_state()?;
            let before = state.fragments.len();
            state.fragments.retain(|_, f| f.doc_id != doc_id);
            let removed = before - state.fragments.len();
            if removed == 0 {
                return Ok(0);
            }
            if state.fragments.is_empty() {
                state.dimension = None;
            }
            state.generation += 1;
            (removed, state.generation, state.fragments.clone())
        };

        tracing::debug!(doc_id, removed, "document fragments deleted");
        self.persist(generation, snapshot).await?;
        Ok(removed)
    }

    /// Drop every fragment and persist an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot write fails.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        let generation = {
            let mut state = self.write_state()?;
            state.fragments.clear();
            state.dimension = None;
            state.generation += 1;
            state.generation
        };

        self.persist(generation, FragmentMap::new()).await
    }

    /// All stored fragments, ordered by document then ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn all(&self) -> Result<Vec<Fragment>, MemoryError> {
        let state = self.read_state()?;
        let mut fragments: Vec<Fragment> = state.fragments.values().cloned().collect();
        fragments.sort_by(|a, b| a.doc_id.cmp(&b.doc_id).then(a.index.cmp(&b.index)));
        Ok(fragments)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().map_or(0, |s| s.fragments.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension of the stored fragments, `None` while empty.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.state.read().ok().and_then(|s| s.dimension)
    }

    async fn persist(&self, generation: u64, snapshot: FragmentMap) -> Result<(), MemoryError> {
        match self.snapshot.write(generation, snapshot).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(
                    generation,
                    path = %self.snapshot.path().display(),
                    "vector snapshot write failed, disk and memory have diverged: {e}"
                );
                Err(e)
            }
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, IndexState>, MemoryError> {
        self.state.read().map_err(|_| MemoryError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, IndexState>, MemoryError> {
        self.state.write().map_err(|_| MemoryError::LockPoisoned)
    }
}

/// Every fragment needs a non-empty embedding of one shared dimension.
fn validate_batch(fragments: &[Fragment], current: Option<usize>) -> Result<usize, MemoryError> {
    let mut expected = current;
    for fragment in fragments {
        let dim = fragment
            .dimension()
            .ok_or_else(|| MemoryError::MissingEmbedding(fragment.id.clone()))?;
        if !fragment.embedding.as_deref().is_some_and(is_finite) {
            return Err(MemoryError::NonFiniteEmbedding(fragment.id.clone()));
        }
        match expected {
            Some(e) if e != dim => {
                return Err(MemoryError::DimensionMismatch {
                    expected: e,
                    actual: dim,
                });
            }
            _ => expected = Some(dim),
        }
    }
    // fragments is non-empty, so expected is set
    expected.ok_or(MemoryError::EmptyQuery)
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Drop fragments that would break the single-dimension invariant.
fn sanitize_loaded(loaded: FragmentMap) -> IndexState {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for dim in loaded.values().filter_map(Fragment::dimension) {
        *counts.entry(dim).or_default() += 1;
    }
    let dimension = counts
        .into_iter()
        .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
        .map(|(dim, _)| dim);

    let total = loaded.len();
    let fragments: FragmentMap = loaded
        .into_iter()
        .filter(|(_, f)| {
            f.dimension().is_some()
                && f.dimension() == dimension
                && f.embedding.as_deref().is_some_and(is_finite)
        })
        .collect();
    let dropped = total - fragments.len();
    if dropped > 0 {
        tracing::warn!(
            dropped,
            ?dimension,
            "ignoring snapshot fragments without an embedding of the index dimension"
        );
    }

    IndexState {
        fragments,
        dimension,
        generation: 0,
    }
}

/// Cosine similarity in `[-1, 1]`; `0` when either vector has zero magnitude or the
/// lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let score = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    score.clamp(-1.0, 1.0)
}
