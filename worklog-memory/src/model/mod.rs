//! Scoring models for embedding and reranking
//!
//! The graph and the retrieval engine treat models as opaque functions:
//! `embed(text)` for the vector index and `score_pair(query, doc)` for the
//! cross-encoder rerank. [`ModelEngine`] adds caching, timeouts and
//! dimensionality checks on top of any [`ScoringModel`].

mod discovery;
mod engine;
#[cfg(feature = "fastembed")]
mod fastembed;
mod hashing;

pub use discovery::resolve_model_cache_dir;
pub use engine::ModelEngine;
#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedModel;
pub use hashing::HashingModel;

use crate::error::Result;

/// An embedding function paired with a pairwise relevance scorer.
///
/// Calls are synchronous and may be slow; [`ModelEngine`] runs them on the
/// blocking pool under a timeout.
pub trait ScoringModel: Send + Sync {
    /// Short name for logs and stats
    fn name(&self) -> &str;

    /// Fixed embedding dimensionality
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Relevance of `document` to `query`; higher is more relevant
    fn score_pair(&self, query: &str, document: &str) -> Result<f32>;

    /// Score many documents against one query, in input order
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        documents
            .iter()
            .map(|doc| self.score_pair(query, doc))
            .collect()
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
