use crate::DocId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A persisted partial or final index is missing or fails to decode or validate.
    #[error("corpus unavailable at {}: {reason}", .path.display())]
    CorpusUnavailable { path: PathBuf, reason: String },

    #[error("document {doc_id} has conflicting urls across partial indexes: {first:?} vs {second:?}")]
    ConflictingDocument { doc_id: DocId, first: String, second: String },

    #[error("term {term:?} has a posting for document {doc_id} which no partial index describes")]
    DanglingPosting { term: String, doc_id: DocId },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IndexError::CorpusUnavailable { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
