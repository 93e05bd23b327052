#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use worklog_memory::{
    HashingModel, MemoryConfig, MemoryError, MemoryGraph, Result, RetrievalStage, ScoringModel,
};

pub const DIMENSION: usize = 64;

pub fn open_graph(path: &Path) -> Arc<MemoryGraph> {
    open_with(MemoryConfig::at(path), Arc::new(HashingModel::new(DIMENSION)))
}

pub fn open_with(config: MemoryConfig, model: Arc<dyn ScoringModel>) -> Arc<MemoryGraph> {
    Arc::new(MemoryGraph::open(config, model).unwrap())
}

/// Embeds like the hashing model but the cross-encoder is unavailable
pub struct FailingScorer(pub HashingModel);

impl ScoringModel for FailingScorer {
    fn name(&self) -> &str {
        "failing-scorer"
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.0.embed(text)
    }

    fn score_pair(&self, _query: &str, _document: &str) -> Result<f32> {
        Err(MemoryError::retrieval(
            RetrievalStage::Rerank,
            "cross-encoder unavailable",
        ))
    }
}

/// Cross-encoder that never answers in time
pub struct SlowScorer {
    pub inner: HashingModel,
    pub delay: Duration,
}

impl ScoringModel for SlowScorer {
    fn name(&self) -> &str {
        "slow-scorer"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text)
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32> {
        std::thread::sleep(self.delay);
        self.inner.score_pair(query, document)
    }
}

/// Scores by exact prefix from a fixed table, so rerank order is known
pub struct TableScorer {
    pub inner: HashingModel,
    pub scores: Vec<(&'static str, f32)>,
}

impl ScoringModel for TableScorer {
    fn name(&self) -> &str {
        "table-scorer"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text)
    }

    fn score_pair(&self, _query: &str, document: &str) -> Result<f32> {
        Ok(self
            .scores
            .iter()
            .find(|(prefix, _)| document.starts_with(prefix))
            .map(|(_, score)| *score)
            .unwrap_or(0.0))
    }
}

/// Points queries (text starting with `QUERY`) away from every document
pub struct OpposedModel;

impl ScoringModel for OpposedModel {
    fn name(&self) -> &str {
        "opposed"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.starts_with("QUERY") {
            Ok(vec![-1.0, 0.1])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }

    fn score_pair(&self, _query: &str, _document: &str) -> Result<f32> {
        Ok(0.0)
    }
}
