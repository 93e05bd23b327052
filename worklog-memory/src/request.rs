//! Request types for graph and search operations
//!
//! Every mutating or searching operation takes one of these structs and calls
//! `validate()` before touching the store or a model.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::node::ProjectId;

/// Parameters for creating a project with its first summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    /// Human-readable name
    pub name: String,
    /// Original request text
    pub question: String,
    /// Initial summary text
    pub summary: String,
}

impl CreateProject {
    pub fn new(
        name: impl Into<String>,
        question: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            question: question.into(),
            summary: summary.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("question", &self.question)?;
        require("summary", &self.summary)
    }
}

/// Parameters for appending a summary to an existing project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendSummary {
    /// Target project
    pub project_id: ProjectId,
    /// New name; blank or absent keeps the stored one
    #[serde(default)]
    pub name: Option<String>,
    /// New question; blank or absent keeps the stored one
    #[serde(default)]
    pub question: Option<String>,
    /// New summary text
    pub summary: String,
}

impl AppendSummary {
    pub fn new(project_id: ProjectId, summary: impl Into<String>) -> Self {
        Self {
            project_id,
            name: None,
            question: None,
            summary: summary.into(),
        }
    }

    /// Pass a name along with the append
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Pass a question along with the append
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("summary", &self.summary)
    }

    /// Supplied name, if it carries a value
    pub fn supplied_name(&self) -> Option<&str> {
        supplied(&self.name)
    }

    /// Supplied question, if it carries a value
    pub fn supplied_question(&self) -> Option<&str> {
        supplied(&self.question)
    }
}

/// Parameters for hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,
    /// Results to return after reranking
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates taken from each of the semantic and lexical rankings
    #[serde(default = "default_fusion_window")]
    pub fusion_window: usize,
    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    /// Drop semantic candidates below this cosine similarity; unset keeps
    /// the whole window
    #[serde(default)]
    pub min_semantic_score: Option<f32>,
    /// Drop lexical candidates below this BM25 score; unset keeps the whole
    /// window
    #[serde(default)]
    pub min_lexical_score: Option<f32>,
}

fn default_top_k() -> usize {
    10
}

fn default_fusion_window() -> usize {
    20
}

fn default_rrf_k() -> f64 {
    60.0
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            fusion_window: default_fusion_window(),
            rrf_k: default_rrf_k(),
            min_semantic_score: None,
            min_lexical_score: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn fusion_window(mut self, window: usize) -> Self {
        self.fusion_window = window;
        self
    }

    pub fn rrf_k(mut self, rrf_k: f64) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    pub fn min_semantic_score(mut self, floor: f32) -> Self {
        self.min_semantic_score = Some(floor);
        self
    }

    pub fn min_lexical_score(mut self, floor: f32) -> Self {
        self.min_lexical_score = Some(floor);
        self
    }

    pub fn validate(&self) -> Result<()> {
        require("query", &self.query)?;
        if self.top_k == 0 {
            return Err(MemoryError::validation("top_k must be at least 1"));
        }
        if self.fusion_window == 0 {
            return Err(MemoryError::validation("fusion_window must be at least 1"));
        }
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(MemoryError::validation(format!(
                "rrf_k must be a finite non-negative number, got {}",
                self.rrf_k
            )));
        }
        for (name, floor) in [
            ("min_semantic_score", self.min_semantic_score),
            ("min_lexical_score", self.min_lexical_score),
        ] {
            if floor.is_some_and(f32::is_nan) {
                return Err(MemoryError::validation(format!("{} must be a number", name)));
            }
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(MemoryError::validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_requires_all_fields() {
        assert!(CreateProject::new("n", "q", "s").validate().is_ok());

        for request in [
            CreateProject::new("", "q", "s"),
            CreateProject::new("n", "  ", "s"),
            CreateProject::new("n", "q", "\n"),
        ] {
            let err = request.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_append_blank_identity_is_not_supplied() {
        let request = AppendSummary::new(ProjectId::new(), "next")
            .with_name("   ")
            .with_question("New question");

        assert!(request.validate().is_ok());
        assert_eq!(request.supplied_name(), None);
        assert_eq!(request.supplied_question(), Some("New question"));
    }

    #[test]
    fn test_append_requires_summary() {
        let err = AppendSummary::new(ProjectId::new(), "").validate().unwrap_err();
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn test_search_defaults_from_json() {
        let request: SearchRequest = serde_json::from_str(r#"{"query":"schema"}"#).unwrap();
        assert_eq!(request.top_k, 10);
        assert_eq!(request.fusion_window, 20);
        assert_eq!(request.rrf_k, 60.0);
        assert_eq!(request.min_semantic_score, None);
        assert_eq!(request.min_lexical_score, None);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_search_rejects_bad_parameters() {
        assert!(SearchRequest::new("q").top_k(0).validate().is_err());
        assert!(SearchRequest::new("q").fusion_window(0).validate().is_err());
        assert!(SearchRequest::new("q").rrf_k(-1.0).validate().is_err());
        assert!(SearchRequest::new("q").rrf_k(f64::NAN).validate().is_err());
        assert!(SearchRequest::new(" ").validate().is_err());
        assert!(SearchRequest::new("q").rrf_k(0.0).validate().is_ok());
        assert!(SearchRequest::new("q").min_semantic_score(f32::NAN).validate().is_err());
        assert!(SearchRequest::new("q").min_lexical_score(-1.0).validate().is_ok());
    }
}
