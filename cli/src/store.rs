//! Store setup from command-line flags
//!
//! A JSON config file, when given, is the base; explicit flags override it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use worklog_memory::{HashingModel, IdentityPolicy, MemoryConfig, MemoryGraph, ScoringModel};

/// Which scoring model backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Feature-hashing model, no downloads
    Offline,
    /// BGE embeddings + BGE reranker via fastembed
    Fastembed,
}

#[derive(Debug, clap::Args)]
pub struct StoreArgs {
    /// Store directory
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Scoring model
    #[arg(long, value_enum, default_value_t = ModelKind::Offline, global = true)]
    pub model: ModelKind,

    /// Model cache directory for fastembed weights
    #[arg(long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// Embedding dimension of the offline model
    #[arg(long, default_value_t = 256, global = true)]
    pub dimension: usize,

    /// JSON file with a base store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fail appends that would change a project's name or question
    #[arg(long, global = true)]
    pub reject_renames: bool,
}

impl StoreArgs {
    pub fn memory_config(&self) -> Result<MemoryConfig> {
        let mut config = match &self.config {
            Some(path) => MemoryConfig::from_json_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => MemoryConfig::default(),
        };

        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if self.reject_renames {
            config.identity_policy = IdentityPolicy::Reject;
        }
        Ok(config)
    }

    pub fn scoring_model(&self) -> Result<Arc<dyn ScoringModel>> {
        match self.model {
            ModelKind::Offline => Ok(Arc::new(HashingModel::new(self.dimension))),
            ModelKind::Fastembed => load_fastembed(self.models_dir.as_deref()),
        }
    }

    /// Open the graph described by these flags
    pub fn open(&self) -> Result<Arc<MemoryGraph>> {
        let config = self.memory_config()?;
        tracing::debug!("Store config: {:?}", config);

        let model = self.scoring_model()?;
        tracing::info!(
            "Opening store at {} with {} model ({}d)",
            config.db_path.display(),
            model.name(),
            model.dimension()
        );

        let db_path = config.db_path.clone();
        let graph = MemoryGraph::open(config, model)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
        Ok(Arc::new(graph))
    }
}

#[cfg(feature = "fastembed")]
fn load_fastembed(models_dir: Option<&Path>) -> Result<Arc<dyn ScoringModel>> {
    let cache_dir = worklog_memory::resolve_model_cache_dir(models_dir)?;
    let model = worklog_memory::FastEmbedModel::try_new(&cache_dir)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "fastembed"))]
fn load_fastembed(_models_dir: Option<&Path>) -> Result<Arc<dyn ScoringModel>> {
    anyhow::bail!("this build has no fastembed support; rebuild with --features fastembed")
}
