//! Vector index
//!
//! Exact cosine ranking over every stored summary embedding. Past
//! `ann_threshold` vectors the ranking goes through an instant-distance HNSW
//! graph, rebuilt lazily on the first search after a change.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::RwLock;

use crate::error::{MemoryError, Result};
use crate::model::cosine_similarity;
use crate::node::SummaryId;

/// Candidates explored per HNSW query; larger windows use the exact scan
const HNSW_EF_SEARCH: usize = 128;

/// HNSW point wrapper for semantic search
#[derive(Clone)]
struct SummaryPoint(Vec<f32>);

impl Point for SummaryPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - similarity (HNSW finds minimum)
        1.0 - cosine_similarity(&self.0, &other.0)
    }
}

/// Embeddings keyed by summary
pub struct VectorIndex {
    dimension: usize,
    vectors: DashMap<SummaryId, Vec<f32>>,
    hnsw: RwLock<Option<HnswMap<SummaryPoint, SummaryId>>>,
    stale: AtomicBool,
    ann_threshold: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize, ann_threshold: usize) -> Self {
        Self {
            dimension,
            vectors: DashMap::new(),
            hnsw: RwLock::new(None),
            stale: AtomicBool::new(true),
            ann_threshold,
        }
    }

    /// Expected dimensionality
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Reject vectors of the wrong length before anything is persisted
    pub fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Add (or replace) the embedding for `id`
    pub fn insert(&self, id: SummaryId, vector: Vec<f32>) -> Result<()> {
        self.check(&vector)?;
        self.vectors.insert(id, vector);
        self.stale.store(true, AtomicOrdering::Release);
        Ok(())
    }

    /// Drop the embedding for `id`
    pub fn remove(&self, id: &SummaryId) -> bool {
        let removed = self.vectors.remove(id).is_some();
        if removed {
            self.stale.store(true, AtomicOrdering::Release);
        }
        removed
    }

    /// Stored embedding for `id`
    pub fn get(&self, id: &SummaryId) -> Option<Vec<f32>> {
        self.vectors.get(id).map(|v| v.clone())
    }

    pub fn contains(&self, id: &SummaryId) -> bool {
        self.vectors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top `limit` summaries by cosine similarity to `query`, best first,
    /// ties broken by id
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(SummaryId, f32)>> {
        self.check(query)?;
        if limit == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        if self.vectors.len() >= self.ann_threshold && limit <= HNSW_EF_SEARCH {
            return Ok(self.hnsw_search(query, limit));
        }
        Ok(self.linear_search(query, limit))
    }

    /// Exact scan
    fn linear_search(&self, query: &[f32], limit: usize) -> Vec<(SummaryId, f32)> {
        let mut results: Vec<(SummaryId, f32)> = self
            .vectors
            .iter()
            .map(|entry| (*entry.key(), cosine_similarity(query, entry.value())))
            .collect();

        sort_ranked(&mut results);
        results.truncate(limit);
        results
    }

    fn hnsw_search(&self, query: &[f32], limit: usize) -> Vec<(SummaryId, f32)> {
        if self.stale.swap(false, AtomicOrdering::AcqRel) {
            self.rebuild_hnsw();
        }

        let guard = self.hnsw.read();
        let Some(hnsw) = guard.as_ref() else {
            return self.linear_search(query, limit);
        };

        let point = SummaryPoint(query.to_vec());
        let mut search = Search::default();
        let mut results: Vec<(SummaryId, f32)> = hnsw
            .search(&point, &mut search)
            // entries removed since the last rebuild are skipped
            .filter(|item| self.vectors.contains_key(item.value))
            .take(limit)
            .map(|item| (*item.value, 1.0 - item.distance))
            .collect();

        sort_ranked(&mut results);
        results
    }

    /// Rebuild HNSW index
    fn rebuild_hnsw(&self) {
        let (values, points): (Vec<SummaryId>, Vec<SummaryPoint>) = self
            .vectors
            .iter()
            .map(|entry| (*entry.key(), SummaryPoint(entry.value().clone())))
            .unzip();

        if points.is_empty() {
            *self.hnsw.write() = None;
            return;
        }

        log::debug!("Rebuilding HNSW index over {} vectors", points.len());
        let hnsw = Builder::default()
            .ef_construction(100)
            .ef_search(HNSW_EF_SEARCH)
            .build(points, values);
        *self.hnsw.write() = Some(hnsw);
    }
}

/// Score descending, then id ascending
pub(crate) fn sort_ranked(results: &mut [(SummaryId, f32)]) {
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}
