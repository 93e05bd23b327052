//! Error types for worklog-memory

use std::fmt;

use thiserror::Error;

/// Which stage of the retrieval pipeline (or model call) failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    /// Embedding a summary or a query
    Embedding,
    /// Stage 1: cosine ranking over stored embeddings
    SemanticRanking,
    /// Stage 4: pairwise cross-encoder scoring
    Rerank,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => write!(f, "embedding"),
            Self::SemanticRanking => write!(f, "semantic ranking"),
            Self::Rerank => write!(f, "rerank"),
        }
    }
}

/// Coarse error taxonomy callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or empty input; never retried
    Validation,
    /// Referenced project or summary is absent
    NotFound,
    /// Transaction or index failure
    Store,
    /// Embedding, ranking or rerank failure
    Retrieval,
    /// Deployment problem (model, dimensionality, paths)
    Configuration,
}

/// Errors that can occur in the memory system
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Project or summary not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted graph violates a structural invariant
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// Write was handed to the store but its outcome is unknown
    #[error("{operation} on project {project_id} was not acknowledged (summary {summary_id:?}); check before retrying")]
    Unacknowledged {
        operation: &'static str,
        project_id: String,
        summary_id: Option<String>,
    },

    /// Per-project lock could not be acquired in time; nothing was written
    #[error("Project {project_id} is busy; {operation} was not attempted")]
    Contended {
        operation: &'static str,
        project_id: String,
    },

    /// A retrieval stage or model call failed
    #[error("Retrieval failed during {stage}: {message}")]
    Retrieval {
        stage: RetrievalStage,
        message: String,
    },

    /// Embedding dimensionality does not match the store
    #[error("Embedding dimension mismatch: store expects {expected}, model produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Model loading error
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl MemoryError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Missing project
    pub fn project_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Project",
            id: id.to_string(),
        }
    }

    /// Missing or orphaned summary
    pub fn summary_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Summary",
            id: id.to_string(),
        }
    }

    /// Create a corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create a retrieval error for the given stage
    pub fn retrieval(stage: RetrievalStage, msg: impl Into<String>) -> Self {
        Self::Retrieval {
            stage,
            message: msg.into(),
        }
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Map onto the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_)
            | Self::Bincode(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Corrupt(_)
            | Self::Unacknowledged { .. }
            | Self::Contended { .. } => ErrorKind::Store,
            Self::Retrieval { .. } => ErrorKind::Retrieval,
            Self::DimensionMismatch { .. } | Self::Model(_) | Self::InvalidPath(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Whether the failed mutation can be retried blindly.
    ///
    /// Only a lock timeout qualifies: nothing reached the store. Reads are
    /// always safe to repeat and are not covered here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contended { .. })
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;
