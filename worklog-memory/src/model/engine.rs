//! Model engine
//!
//! High-level API over a [`ScoringModel`]: embedding cache, bounded calls and
//! output validation.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;

use super::ScoringModel;
use crate::error::{MemoryError, Result, RetrievalStage};

/// Scoring model wrapper with caching and timeouts
///
/// Every call runs on tokio's blocking pool and is bounded by `timeout`. A
/// call that exceeds it surfaces as a retrieval error for the stage that
/// issued it; the engine never substitutes a fallback score.
pub struct ModelEngine {
    model: Arc<dyn ScoringModel>,
    /// Recently embedded texts; `None` when caching is disabled
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
    dimension: usize,
    timeout: Duration,
}

impl ModelEngine {
    /// Wrap `model`, bounding each call by `timeout` and caching up to
    /// `cache_capacity` embeddings
    pub fn new(model: Arc<dyn ScoringModel>, timeout: Duration, cache_capacity: usize) -> Self {
        let dimension = model.dimension();
        log::info!(
            "ModelEngine ready ({}, {}d, timeout {:?}, cache {})",
            model.name(),
            dimension,
            timeout,
            cache_capacity
        );

        Self {
            model,
            cache: NonZeroUsize::new(cache_capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            dimension,
            timeout,
        }
    }

    /// Generate embedding with caching
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.lock().get(text).cloned()) {
            return Ok(cached);
        }

        let model = Arc::clone(&self.model);
        let owned = text.to_string();
        let vector = self
            .call(RetrievalStage::Embedding, move || model.embed(&owned))
            .await?;

        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MemoryError::retrieval(
                RetrievalStage::Embedding,
                "model produced a non-finite embedding component",
            ));
        }

        if let Some(cache) = &self.cache {
            cache.lock().put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    /// Score every document against `query`, in input order
    pub async fn score_pairs(&self, query: &str, documents: Vec<String>) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let expected = documents.len();
        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let scores = self
            .call(RetrievalStage::Rerank, move || {
                model.score_pairs(&query, &documents)
            })
            .await?;

        if scores.len() != expected {
            return Err(MemoryError::retrieval(
                RetrievalStage::Rerank,
                format!("scorer returned {} scores for {} pairs", scores.len(), expected),
            ));
        }
        if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
            return Err(MemoryError::retrieval(
                RetrievalStage::Rerank,
                format!("scorer returned a non-finite score for pair {}", pos),
            ));
        }

        Ok(scores)
    }

    async fn call<T, F>(&self, stage: RetrievalStage, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(MemoryError::retrieval(
                stage,
                format!("{} timed out after {:?}", self.model.name(), self.timeout),
            )),
            Ok(Err(join_err)) => Err(MemoryError::retrieval(
                stage,
                format!("{} task failed: {}", self.model.name(), join_err),
            )),
            Ok(Ok(Err(err))) => Err(match err {
                MemoryError::Retrieval { .. } | MemoryError::DimensionMismatch { .. } => err,
                other => MemoryError::retrieval(stage, other.to_string()),
            }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }

    /// Get embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Name of the wrapped model
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.lock().len())
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }
}
