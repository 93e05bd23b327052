//! Store configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when an append supplies a name or question that differs from
/// the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Non-empty values replace the stored ones
    #[default]
    Overwrite,
    /// Differing non-empty values fail the append with a validation error
    Reject,
}

/// Which text is embedded for a new summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedInput {
    /// The summary text alone
    #[default]
    Summary,
    /// `question + "\n" + summary`
    QuestionAndSummary,
}

impl EmbedInput {
    /// Build the text handed to the embedding model
    pub fn compose(&self, question: &str, summary: &str) -> String {
        match self {
            Self::Summary => summary.to_string(),
            Self::QuestionAndSummary => format!("{}\n{}", question, summary),
        }
    }
}

/// Configuration for [`crate::MemoryGraph`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// RocksDB directory
    pub db_path: PathBuf,
    /// Upper bound for a single embed / score call
    #[serde(with = "millis")]
    pub model_timeout: Duration,
    /// Upper bound for acquiring a project lock and committing a write
    #[serde(with = "millis")]
    pub store_timeout: Duration,
    /// Name/question handling on append
    pub identity_policy: IdentityPolicy,
    /// Embedding input for new summaries
    pub embed_input: EmbedInput,
    /// Corpus size at which semantic ranking switches to the HNSW index
    pub ann_threshold: usize,
    /// Embeddings kept in the LRU cache; 0 disables caching
    pub embedding_cache_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".worklog/memory"),
            model_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
            identity_policy: IdentityPolicy::default(),
            embed_input: EmbedInput::default(),
            ann_threshold: 10_000,
            embedding_cache_size: 1024,
        }
    }
}

impl MemoryConfig {
    /// Default configuration rooted at `db_path`
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Load from a JSON file; missing fields fall back to defaults
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
