use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trimmed slice of a document's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub doc_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub index: usize,
}

impl Fragment {
    #[must_use]
    pub fn new(doc_id: impl Into<String>, index: usize, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            doc_id: doc_id.into(),
            content: content.into(),
            embedding: None,
            index,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Length of the embedding, `None` when absent or empty.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.embedding
            .as_ref()
            .map(Vec::len)
            .filter(|len| *len > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub content: String,
    pub fragments: Vec<Fragment>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    #[must_use]
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            content: content.into(),
            fragments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            chunk_count: self.fragments.len(),
            created_at: self.created_at,
        }
    }
}

/// Document metadata kept after ingestion; the full text lives in the upload directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub file_name: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A fragment with its cosine similarity to the query, in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub fragment: Fragment,
    pub score: f32,
}
