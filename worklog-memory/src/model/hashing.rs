//! Feature-hashing model
//!
//! Deterministic, download-free stand-in for a sentence embedder and a
//! cross-encoder. Words and character trigrams are hashed into a fixed number
//! of buckets; the pair score blends query-term coverage with the cosine of
//! the two hashed vectors. Good enough for offline use and reproducible tests.

use std::collections::HashSet;

use super::{cosine_similarity, ScoringModel};
use crate::error::Result;

const TRIGRAM_WEIGHT: f32 = 0.5;
const COVERAGE_WEIGHT: f32 = 0.7;

/// Bag-of-words + trigram hashing embedder
#[derive(Debug, Clone)]
pub struct HashingModel {
    dimension: usize,
}

impl HashingModel {
    /// Create a model producing `dimension`-sized vectors (at least 1)
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash % self.dimension as u64) as usize;
        // one spare bit picks the sign so collisions partly cancel
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for word in words(text) {
            let (index, sign) = self.bucket(&word);
            vector[index] += sign;

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                let (index, sign) = self.bucket(&gram);
                vector[index] += sign * TRIGRAM_WEIGHT;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingModel {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ScoringModel for HashingModel {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32> {
        let query_terms: HashSet<String> = words(query).collect();
        if query_terms.is_empty() {
            return Ok(0.0);
        }
        let doc_terms: HashSet<String> = words(document).collect();
        let covered = query_terms.intersection(&doc_terms).count() as f32;
        let coverage = covered / query_terms.len() as f32;

        let cosine = cosine_similarity(&self.vectorize(query), &self.vectorize(document));
        Ok(COVERAGE_WEIGHT * coverage + (1.0 - COVERAGE_WEIGHT) * cosine)
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
