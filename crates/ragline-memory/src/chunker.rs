use crate::error::MemoryError;
use crate::types::Fragment;

/// Validated window parameters, in characters. `chunk_overlap < chunk_size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkerConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidChunkConfig`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, MemoryError> {
        if chunk_size == 0 {
            return Err(MemoryError::InvalidChunkConfig(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(MemoryError::InvalidChunkConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Sliding-window splitter over Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split `text` into trimmed, non-empty fragments numbered from 0.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::EmptyDocument`] if `text` has no non-whitespace content.
    pub fn split(&self, doc_id: &str, text: &str) -> Result<Vec<Fragment>, MemoryError> {
        if text.trim().is_empty() {
            return Err(MemoryError::EmptyDocument);
        }

        let fragments = windows(text, self.config)
            .into_iter()
            .filter_map(|(_, window)| {
                let trimmed = window.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            })
            .enumerate()
            .map(|(i, content)| Fragment::new(doc_id, i, content))
            .collect();

        Ok(fragments)
    }
}

/// Raw windows with their starting character offset, before trimming.
fn windows(text: &str, config: ChunkerConfig) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::with_capacity(chars.len() / config.stride() + 1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        out.push((start, chars[start..end].iter().collect()));
        if end >= chars.len() {
            break;
        }
        start += config.stride();
    }

    out
}
