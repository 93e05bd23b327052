//! Project and summary node types
//!
//! The graph has two node kinds. A [`Project`] owns every [`Summary`] ever
//! appended to it (`summaries`, the *owns-all* relation) and a single slot
//! naming the newest one (`latest`, the *owns-latest* relation). Each summary
//! records the summary that was latest before it (`supersedes`), forming a
//! linear chain back to the project's first summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

node_id!(
    /// Unique identifier for projects
    ProjectId
);

node_id!(
    /// Unique identifier for summaries
    SummaryId
);

/// One tracked unit of agent work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier
    pub id: ProjectId,
    /// Human-readable name
    pub name: String,
    /// Original request text
    pub question: String,
    /// When the project was created
    pub created_at: DateTime<Utc>,
    /// Bumped on every append
    pub updated_at: DateTime<Utc>,
    /// The owns-latest slot
    pub latest: SummaryId,
    /// The owns-all relation, oldest first
    pub summaries: Vec<SummaryId>,
}

impl Project {
    /// Create a project whose first (and latest) summary is `first`
    pub fn new(
        name: impl Into<String>,
        question: impl Into<String>,
        first: SummaryId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            question: question.into(),
            created_at: now,
            updated_at: now,
            latest: first,
            summaries: vec![first],
        }
    }

    /// Number of summaries ever appended (including the first)
    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }

    /// The record after appending `next`: owns-all gains it and owns-latest
    /// moves to it. The caller supplies the summary that chains onto
    /// `self.latest`.
    pub fn advanced(&self, next: SummaryId, now: DateTime<Utc>) -> Self {
        let mut project = self.clone();
        project.summaries.push(next);
        project.latest = next;
        project.updated_at = now;
        project
    }

    /// Lightweight view without the summary list
    pub fn info(&self) -> ProjectInfo {
        ProjectInfo {
            id: self.id,
            name: self.name.clone(),
            question: self.question.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            summary_count: self.summaries.len(),
        }
    }
}

/// Project metadata returned by lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary_count: usize,
}

/// The immutable delta recorded by one work session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Unique identifier
    pub id: SummaryId,
    /// Owning project (reverse of owns-all)
    pub project_id: ProjectId,
    /// What changed and what remains
    pub text: String,
    /// The summary that was latest when this one was appended
    pub supersedes: Option<SummaryId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Summary {
    /// Chain root for a new project
    pub fn root(
        id: SummaryId,
        project_id: ProjectId,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            text: text.into(),
            supersedes: None,
            created_at: now,
        }
    }

    /// Summary chained onto `prev`
    pub fn successor(
        id: SummaryId,
        project_id: ProjectId,
        prev: SummaryId,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            text: text.into(),
            supersedes: Some(prev),
            created_at: now,
        }
    }

    /// Whether this is the first summary of its project
    pub fn is_root(&self) -> bool {
        self.supersedes.is_none()
    }
}
