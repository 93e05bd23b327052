//! fastembed-backed models
//!
//! BGE-Small-EN-v1.5 sentence embeddings (384d) and the BGE base reranker as
//! the cross-encoder. Weights are downloaded into the model cache directory
//! on first use.

use std::path::Path;

use fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptions, RerankerModel, TextEmbedding, TextRerank,
};
use parking_lot::Mutex;

use super::ScoringModel;
use crate::error::{MemoryError, Result, RetrievalStage};

/// Sentence embedder plus cross-encoder, both run locally through ONNX Runtime
pub struct FastEmbedModel {
    embedder: Mutex<TextEmbedding>,
    reranker: Mutex<TextRerank>,
    dimension: usize,
}

impl FastEmbedModel {
    /// Load (downloading if needed) both models into `cache_dir`
    pub fn try_new(cache_dir: &Path) -> Result<Self> {
        log::info!("Loading fastembed models from: {}", cache_dir.display());

        let embedder = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| MemoryError::model(format!("Failed to load embedding model: {}", e)))?;

        let reranker = TextRerank::try_new(
            RerankInitOptions::new(RerankerModel::BGERerankerBase)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| MemoryError::model(format!("Failed to load reranker: {}", e)))?;

        // Get dimension by encoding test string
        let probe = embedder
            .embed(vec!["test"], None)
            .map_err(|e| MemoryError::model(format!("Failed to encode test string: {}", e)))?;
        let dimension = probe.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(MemoryError::model("Embedding model produced an empty vector"));
        }

        log::info!("Loaded fastembed models ({}d embeddings)", dimension);

        Ok(Self {
            embedder: Mutex::new(embedder),
            reranker: Mutex::new(reranker),
            dimension,
        })
    }
}

impl ScoringModel for FastEmbedModel {
    fn name(&self) -> &str {
        "fastembed"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .embedder
            .lock()
            .embed(vec![text], None)
            .map_err(|e| {
                MemoryError::retrieval(
                    RetrievalStage::Embedding,
                    format!("Failed to encode text: {}", e),
                )
            })?;

        embeddings.pop().ok_or_else(|| {
            MemoryError::retrieval(RetrievalStage::Embedding, "model returned no embedding")
        })
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32> {
        let scores = self.score_pairs(query, &[document.to_string()])?;
        scores.first().copied().ok_or_else(|| {
            MemoryError::retrieval(RetrievalStage::Rerank, "reranker returned no score")
        })
    }

    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
        let ranked = self
            .reranker
            .lock()
            .rerank(query, docs, false, None)
            .map_err(|e| {
                MemoryError::retrieval(RetrievalStage::Rerank, format!("Rerank failed: {}", e))
            })?;

        // reranker output is sorted by score; restore input order
        let mut scores = vec![f32::NAN; documents.len()];
        for result in ranked {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}
