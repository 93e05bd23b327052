//! Worklog Memory Layer
//!
//! Persistent, searchable memory of agent work sessions, stored as a
//! versioned graph of projects and progress summaries.
//!
//! ## Features
//!
//! - **Versioned history** - Every append adds an immutable summary and moves the project's latest pointer; the full chain stays walkable
//! - **Per-project serialization** - Concurrent appends to one project never fork its history; different projects never block each other
//! - **Hybrid search** - Semantic + BM25 candidates fused with Reciprocal Rank Fusion, then reranked by a cross-encoder
//! - **RocksDB persistence** - Atomic, synced write batches with HNSW-accelerated semantic ranking for large stores
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use worklog_memory::{
//!     AppendSummary, CreateProject, HashingModel, HybridSearch, MemoryConfig, MemoryGraph,
//!     SearchRequest,
//! };
//!
//! let graph = Arc::new(MemoryGraph::open(
//!     MemoryConfig::at(&db_path),
//!     Arc::new(HashingModel::default()),
//! )?);
//!
//! let created = graph
//!     .create_project(CreateProject::new(
//!         "Booking System",
//!         "Build a booking API",
//!         "routes defined, schema pending",
//!     ))
//!     .await?;
//! graph
//!     .append_summary(AppendSummary::new(created.project_id, "schema implemented, auth pending"))
//!     .await?;
//!
//! let hits = HybridSearch::new(graph)
//!     .search(&SearchRequest::new("booking system schema").top_k(3))
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod migration;
pub mod model;
pub mod node;
pub mod request;
pub mod search;
pub mod storage;

// Re-exports for convenience
pub use config::{EmbedInput, IdentityPolicy, MemoryConfig};
pub use error::{ErrorKind, MemoryError, Result, RetrievalStage};
pub use graph::{
    AppendedSummary, CreatedProject, DeletedProject, FetchedSummary, GraphStats, LatestSummary,
    MemoryGraph,
};
#[cfg(feature = "fastembed")]
pub use model::FastEmbedModel;
pub use model::{cosine_similarity, resolve_model_cache_dir, HashingModel, ModelEngine, ScoringModel};
pub use node::{Project, ProjectId, ProjectInfo, Summary, SummaryId};
pub use request::{AppendSummary, CreateProject, SearchRequest};
pub use search::{
    fuse_rrf, FusedCandidate, FusedHit, HybridSearch, ListContribution, RankedList, SearchConfig,
    SearchHit,
};
