//! Hybrid search engine
//!
//! Four stages over the visible summary set:
//!
//! 1. semantic ranking (cosine similarity against stored embeddings)
//! 2. lexical ranking (BM25)
//! 3. Reciprocal Rank Fusion of both lists:
//!    `score(d) = Σ 1 / (rrf_k + rank_i(d))` with 1-based ranks
//! 4. cross-encoder rerank of the fused candidates
//!
//! Any failing stage fails the whole search; there is no degraded
//! single-list mode.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result, RetrievalStage};
use crate::graph::MemoryGraph;
use crate::node::{ProjectId, SummaryId};
use crate::request::SearchRequest;

/// Default search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub fusion_window: usize,
    pub rrf_k: f64,
    pub min_semantic_score: Option<f32>,
    pub min_lexical_score: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            fusion_window: 20,
            rrf_k: 60.0,
            min_semantic_score: None,
            min_lexical_score: None,
        }
    }
}

impl SearchConfig {
    /// A request for `query` carrying these defaults
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        let mut request = SearchRequest::new(query)
            .top_k(self.top_k)
            .fusion_window(self.fusion_window)
            .rrf_k(self.rrf_k);
        request.min_semantic_score = self.min_semantic_score;
        request.min_lexical_score = self.min_lexical_score;
        request
    }
}

/// Which ranked list a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankedList {
    Semantic,
    Lexical,
}

impl std::fmt::Display for RankedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankedList::Semantic => write!(f, "semantic"),
            RankedList::Lexical => write!(f, "lexical"),
        }
    }
}

/// One list's contribution to a fused candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListContribution {
    pub list: RankedList,
    /// 1-based rank within that list
    pub rank: usize,
    /// Raw stage score (cosine similarity or BM25)
    pub score: f32,
    /// `1.0 / (rrf_k + rank)`
    pub rrf_contribution: f64,
}

/// A summary after RRF fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCandidate {
    pub summary_id: SummaryId,
    pub fused_score: f64,
    /// 1-based position in the fused order
    pub fused_rank: usize,
    pub provenance: Vec<ListContribution>,
}

/// Fuse ranked lists with Reciprocal Rank Fusion.
///
/// Each list is `(id, stage score)` in rank order, best first. Returns every
/// id appearing in any list, sorted by fused score descending, then id
/// ascending.
pub fn fuse_rrf(lists: &[(RankedList, Vec<(SummaryId, f32)>)], rrf_k: f64) -> Vec<FusedCandidate> {
    let mut fused: HashMap<SummaryId, FusedCandidate> = HashMap::new();

    for (list, entries) in lists {
        for (idx, (id, score)) in entries.iter().enumerate() {
            let rank = idx + 1;
            let rrf_contribution = 1.0 / (rrf_k + rank as f64);

            let candidate = fused.entry(*id).or_insert_with(|| FusedCandidate {
                summary_id: *id,
                fused_score: 0.0,
                fused_rank: 0,
                provenance: Vec::new(),
            });
            candidate.fused_score += rrf_contribution;
            candidate.provenance.push(ListContribution {
                list: *list,
                rank,
                score: *score,
                rrf_contribution,
            });
        }
    }

    let mut results: Vec<FusedCandidate> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.summary_id.cmp(&b.summary_id))
    });
    for (idx, candidate) in results.iter_mut().enumerate() {
        candidate.fused_rank = idx + 1;
    }
    results
}

fn above_floor(score: f32, floor: Option<f32>) -> bool {
    floor.map_or(true, |floor| score >= floor)
}

/// A reranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub summary_id: SummaryId,
    pub project_id: ProjectId,
    /// The owning project's question
    pub question: String,
    pub text: String,
    pub fused_score: f64,
    /// Cross-encoder score
    pub relevance_score: f32,
}

/// A fused (not reranked) search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub summary_id: SummaryId,
    pub project_id: ProjectId,
    pub question: String,
    pub text: String,
    pub fused_score: f64,
    pub fused_rank: usize,
    pub provenance: Vec<ListContribution>,
}

/// Hybrid retrieval over a [`MemoryGraph`]
pub struct HybridSearch {
    graph: Arc<MemoryGraph>,
}

impl HybridSearch {
    pub fn new(graph: Arc<MemoryGraph>) -> Self {
        Self { graph }
    }

    /// Full four-stage search; at most `top_k` hits, best first
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let candidates = self.fused_hits(request).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self
            .graph
            .engine()
            .score_pairs(&request.query, documents)
            .await?;

        let mut reranked: Vec<(FusedHit, f32)> = candidates.into_iter().zip(scores).collect();
        reranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.fused_rank.cmp(&b.0.fused_rank))
        });
        reranked.truncate(request.top_k);

        log::debug!(
            "Reranked to {} hits for {:?}",
            reranked.len(),
            request.query
        );

        Ok(reranked
            .into_iter()
            .map(|(hit, relevance_score)| SearchHit {
                summary_id: hit.summary_id,
                project_id: hit.project_id,
                question: hit.question,
                text: hit.text,
                fused_score: hit.fused_score,
                relevance_score,
            })
            .collect())
    }

    /// Stages 1-3 only; at most `top_k` fused hits with provenance
    pub async fn fused_search(&self, request: &SearchRequest) -> Result<Vec<FusedHit>> {
        let mut hits = self.fused_hits(request).await?;
        hits.truncate(request.top_k);
        Ok(hits)
    }

    /// Every fused candidate that is still visible, in fused order
    async fn fused_hits(&self, request: &SearchRequest) -> Result<Vec<FusedHit>> {
        request.validate()?;
        if self.graph.summary_count() == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.graph.engine().embed(&request.query).await?;

        let semantic: Vec<(SummaryId, f32)> = self
            .graph
            .vectors()
            .search(&query_vector, request.fusion_window)
            .map_err(|e| match e {
                MemoryError::DimensionMismatch { .. } => e,
                other => MemoryError::retrieval(RetrievalStage::SemanticRanking, other.to_string()),
            })?
            .into_iter()
            .filter(|(_, score)| above_floor(*score, request.min_semantic_score))
            .collect();

        let lexical: Vec<(SummaryId, f32)> = self
            .graph
            .lexical()
            .read()
            .search(&request.query, request.fusion_window)
            .into_iter()
            .filter(|(_, score)| above_floor(*score, request.min_lexical_score))
            .collect();

        log::debug!(
            "Candidates for {:?}: {} semantic, {} lexical",
            request.query,
            semantic.len(),
            lexical.len()
        );

        let fused = fuse_rrf(
            &[(RankedList::Semantic, semantic), (RankedList::Lexical, lexical)],
            request.rrf_k,
        );

        // drop anything unpublished or deleted since the index was read
        Ok(fused
            .into_iter()
            .filter_map(|candidate| {
                let (summary, project) = self.graph.visible(&candidate.summary_id)?;
                Some(FusedHit {
                    summary_id: candidate.summary_id,
                    project_id: project.id,
                    question: project.question,
                    text: summary.text,
                    fused_score: candidate.fused_score,
                    fused_rank: candidate.fused_rank,
                    provenance: candidate.provenance,
                })
            })
            .collect())
    }
}
