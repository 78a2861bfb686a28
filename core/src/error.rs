use thiserror::Error;

use crate::DocId;

pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// A location directory entry points at a block that is missing or too short.
    #[error("index corruption in block {block}: {reason}")]
    Corruption { block: String, reason: String },

    /// A fetch did not complete in time. Safe to retry.
    #[error("timed out fetching {path}")]
    Timeout { path: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object not found: {path}")]
    NotFound { path: String },

    /// Indexes are write-once; delete the old one before flushing to the same name.
    #[error("index already exists: {path}")]
    Exists { path: String },

    #[error("operation not supported by this store: {op}")]
    Unsupported { op: &'static str },

    #[error("invalid term directory descriptor: {0}")]
    Descriptor(String),

    #[error("invalid signal table: {0}")]
    Signals(String),

    #[error("document {doc_id} was already added to the index")]
    Duplicate { doc_id: DocId },
}

impl IndexError {
    pub fn corruption(block: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::Corruption {
            block: block.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }

    /// Transient failures that say nothing about the integrity of the index.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Timeout { .. } | IndexError::Io { .. })
    }
}
