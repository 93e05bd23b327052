//! BM25 lexical index
//!
//! Incremental inverted index over summary text. Updated on every publish and
//! unpublish so it always mirrors the visible summary set.

use std::collections::{HashMap, HashSet};

use super::vector::sort_ranked;
use crate::node::SummaryId;

/// BM25 index for text search
pub struct LexicalIndex {
    /// Inverted index: term -> (summary -> term frequency)
    postings: HashMap<String, HashMap<SummaryId, u32>>,
    /// Distinct terms per document, for removal
    doc_terms: HashMap<SummaryId, Vec<String>>,
    /// Document lengths in tokens
    doc_lengths: HashMap<SummaryId, u32>,
    /// Sum of all document lengths
    total_length: u64,
    /// BM25 k1 parameter
    k1: f32,
    /// BM25 b parameter
    b: f32,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self {
            postings: HashMap::new(),
            doc_terms: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_length: 0,
            k1: 1.2,
            b: 0.75,
        }
    }

    /// Tokenize text into terms
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= 2)
            .map(String::from)
            .collect()
    }

    /// Index `text` under `id`, replacing any previous entry
    pub fn insert(&mut self, id: SummaryId, text: &str) {
        self.remove(&id);

        let tokens = Self::tokenize(text);
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_freqs.entry(token.clone()).or_insert(0) += 1;
        }

        let mut terms = Vec::with_capacity(term_freqs.len());
        for (term, freq) in term_freqs {
            self.postings.entry(term.clone()).or_default().insert(id, freq);
            terms.push(term);
        }

        self.doc_terms.insert(id, terms);
        self.doc_lengths.insert(id, tokens.len() as u32);
        self.total_length += tokens.len() as u64;
    }

    /// Remove `id` from the index
    pub fn remove(&mut self, id: &SummaryId) -> bool {
        let Some(terms) = self.doc_terms.remove(id) else {
            return false;
        };

        for term in terms {
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        if let Some(length) = self.doc_lengths.remove(id) {
            self.total_length -= u64::from(length);
        }
        true
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    pub fn contains(&self, id: &SummaryId) -> bool {
        self.doc_lengths.contains_key(id)
    }

    /// Search with BM25 scoring. Only documents sharing at least one query
    /// term are returned, best first, ties broken by id.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(SummaryId, f32)> {
        let query_terms: HashSet<String> = Self::tokenize(query).into_iter().collect();
        let mut scores: HashMap<SummaryId, f32> = HashMap::new();

        for term in &query_terms {
            if let Some(postings) = self.postings.get(term) {
                let idf = self.idf(postings.len());

                for (doc_id, tf) in postings {
                    let doc_length = self.doc_lengths.get(doc_id).copied().unwrap_or(1);
                    let score = self.bm25_score(*tf as f32, doc_length as f32, idf);
                    *scores.entry(*doc_id).or_insert(0.0) += score;
                }
            }
        }

        let mut results: Vec<_> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        sort_ranked(&mut results);
        results.truncate(limit);
        results
    }

    fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }

    /// Calculate IDF
    fn idf(&self, doc_freq: usize) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Calculate BM25 score for a term
    fn bm25_score(&self, tf: f32, doc_length: f32, idf: f32) -> f32 {
        let avg = self.avg_doc_length().max(f32::EPSILON);
        let numerator = tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * doc_length / avg);
        idf * numerator / denominator
    }
}
