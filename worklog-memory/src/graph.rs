//! Versioned project memory
//!
//! [`MemoryGraph`] owns the durable store, the in-memory record caches and the
//! two retrieval indexes, and keeps all of them in step.
//!
//! Writes to one project are serialized by a per-project async lock that is
//! held from the moment the current latest pointer is read until the new
//! records are durable and published. Writes to different projects never
//! wait on each other.
//!
//! In memory, a new summary becomes visible only when the project record that
//! owns it is published: the summary and its index entries go in first, the
//! project record last. Deletion runs the other way round. Readers that
//! resolve summaries through a project (or check ownership, as search does)
//! therefore never see a half-applied write.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::{IdentityPolicy, MemoryConfig};
use crate::error::{MemoryError, Result};
use crate::index::{LexicalIndex, VectorIndex};
use crate::model::{ModelEngine, ScoringModel};
use crate::node::{Project, ProjectId, ProjectInfo, Summary, SummaryId};
use crate::request::{AppendSummary, CreateProject};
use crate::storage::Storage;

/// Result of [`MemoryGraph::create_project`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedProject {
    pub project_id: ProjectId,
    pub summary_id: SummaryId,
}

/// Result of [`MemoryGraph::append_summary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendedSummary {
    pub project_id: ProjectId,
    pub summary_id: SummaryId,
    /// The summary that was latest before this append
    pub supersedes: SummaryId,
}

/// Result of [`MemoryGraph::delete_project`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedProject {
    pub project_id: ProjectId,
    pub summaries_removed: usize,
}

/// The newest summary of a project together with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSummary {
    pub project_id: ProjectId,
    pub name: String,
    pub question: String,
    pub summary_id: SummaryId,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// One summary returned by [`MemoryGraph::fetch`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedSummary {
    pub summary_id: SummaryId,
    pub project_id: ProjectId,
    pub question: String,
    pub text: String,
}

/// Store-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub projects: usize,
    pub summaries: usize,
    pub indexed_vectors: usize,
    pub indexed_documents: usize,
    pub dimension: usize,
    pub model: String,
    pub cached_embeddings: usize,
}

/// Records, indexes and the durable store; shared with blocking commit tasks
struct GraphState {
    storage: Storage,
    projects: DashMap<ProjectId, Project>,
    summaries: DashMap<SummaryId, Summary>,
    /// Summary -> owning project, for published projects only
    owners: DashMap<SummaryId, ProjectId>,
    vectors: VectorIndex,
    lexical: RwLock<LexicalIndex>,
}

impl GraphState {
    /// Make a durable summary searchable and fetchable
    fn publish_summary(&self, summary: Summary, vector: Vec<f32>) -> Result<()> {
        self.vectors.insert(summary.id, vector)?;
        self.lexical.write().insert(summary.id, &summary.text);
        self.summaries.insert(summary.id, summary);
        Ok(())
    }

    /// Persist then publish; the project record goes live last
    fn commit_summary(&self, project: Project, summary: Summary, vector: Vec<f32>) -> Result<()> {
        self.vectors.check(&vector)?;
        self.storage.write_summary(&project, &summary, &vector)?;

        let summary_id = summary.id;
        self.publish_summary(summary, vector).map_err(|e| {
            MemoryError::corrupt(format!(
                "summary {} is stored but could not be indexed: {}",
                summary_id, e
            ))
        })?;
        let project_id = project.id;
        self.projects.insert(project_id, project);
        self.owners.insert(summary_id, project_id);
        Ok(())
    }

    fn publish_project(&self, project: Project) {
        for id in &project.summaries {
            self.owners.insert(*id, project.id);
        }
        self.projects.insert(project.id, project);
    }

    fn create(&self, project: Project, summary: Summary, vector: Vec<f32>) -> Result<CreatedProject> {
        let created = CreatedProject {
            project_id: project.id,
            summary_id: summary.id,
        };
        self.commit_summary(project, summary, vector)?;
        Ok(created)
    }

    /// Chain a new summary onto the current latest. Runs under the project lock.
    fn append(
        &self,
        request: AppendSummary,
        summary_id: SummaryId,
        vector: Vec<f32>,
        policy: IdentityPolicy,
    ) -> Result<AppendedSummary> {
        let current = self
            .projects
            .get(&request.project_id)
            .map(|p| p.clone())
            .ok_or_else(|| MemoryError::project_not_found(request.project_id))?;
        check_identity(policy, &current, &request)?;

        let now = Utc::now();
        let supersedes = current.latest;
        let summary = Summary::successor(
            summary_id,
            current.id,
            supersedes,
            request.summary.as_str(),
            now,
        );

        let mut next = current.advanced(summary_id, now);
        if let Some(name) = request.supplied_name() {
            next.name = name.to_string();
        }
        if let Some(question) = request.supplied_question() {
            next.question = question.to_string();
        }

        self.commit_summary(next, summary, vector)?;
        Ok(AppendedSummary {
            project_id: current.id,
            summary_id,
            supersedes,
        })
    }

    /// Remove a project and everything it owns. Runs under the project lock.
    fn delete(&self, project_id: ProjectId) -> Result<DeletedProject> {
        let project = self
            .projects
            .get(&project_id)
            .map(|p| p.clone())
            .ok_or_else(|| MemoryError::project_not_found(project_id))?;

        self.storage.delete_project(&project)?;

        self.projects.remove(&project_id);
        let mut lexical = self.lexical.write();
        for id in &project.summaries {
            self.owners.remove(id);
            lexical.remove(id);
            self.vectors.remove(id);
            self.summaries.remove(id);
        }

        Ok(DeletedProject {
            project_id,
            summaries_removed: project.summaries.len(),
        })
    }
}

fn check_identity(policy: IdentityPolicy, current: &Project, request: &AppendSummary) -> Result<()> {
    if policy == IdentityPolicy::Overwrite {
        return Ok(());
    }
    if let Some(name) = request.supplied_name().filter(|n| *n != current.name) {
        return Err(MemoryError::validation(format!(
            "append would rename project {} from {:?} to {:?}",
            current.id, current.name, name
        )));
    }
    if let Some(question) = request.supplied_question().filter(|q| *q != current.question) {
        return Err(MemoryError::validation(format!(
            "append would change the question of project {} to {:?}",
            current.id, question
        )));
    }
    Ok(())
}

/// Project/summary history graph with hybrid-retrieval indexes
pub struct MemoryGraph {
    state: Arc<GraphState>,
    locks: DashMap<ProjectId, Arc<Mutex<()>>>,
    engine: Arc<ModelEngine>,
    config: MemoryConfig,
}

impl MemoryGraph {
    /// Open the store at `config.db_path`, loading every record into memory
    pub fn open(config: MemoryConfig, model: Arc<dyn ScoringModel>) -> Result<Self> {
        let engine = Arc::new(ModelEngine::new(
            model,
            config.model_timeout,
            config.embedding_cache_size,
        ));
        let storage = Storage::open(&config.db_path, engine.dimension())?;
        let loaded = storage.load()?;

        let state = GraphState {
            storage,
            projects: DashMap::new(),
            summaries: DashMap::new(),
            owners: DashMap::new(),
            vectors: VectorIndex::new(engine.dimension(), config.ann_threshold),
            lexical: RwLock::new(LexicalIndex::new()),
        };

        for stored in loaded.summaries {
            state.publish_summary(stored.summary, stored.vector)?;
        }
        for project in loaded.projects {
            state.publish_project(project);
        }

        log::info!(
            "MemoryGraph opened at {} ({} projects, {} summaries)",
            config.db_path.display(),
            state.projects.len(),
            state.summaries.len()
        );

        Ok(Self {
            state: Arc::new(state),
            locks: DashMap::new(),
            engine,
            config,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Create a project with its first summary
    pub async fn create_project(&self, request: CreateProject) -> Result<CreatedProject> {
        request.validate()?;

        let text = self
            .config
            .embed_input
            .compose(&request.question, &request.summary);
        let vector = self.engine.embed(&text).await?;

        let now = Utc::now();
        let summary_id = SummaryId::new();
        let project = Project::new(request.name, request.question, summary_id, now);
        let summary = Summary::root(summary_id, project.id, request.summary, now);
        let project_id = project.id;

        let created = self
            .commit("create", project_id, Some(summary_id), move |state| {
                state.create(project, summary, vector)
            })
            .await?;

        log::info!("Created project {} (summary {})", project_id, summary_id);
        Ok(created)
    }

    /// Append a summary to an existing project and move its latest pointer
    pub async fn append_summary(&self, request: AppendSummary) -> Result<AppendedSummary> {
        request.validate()?;

        let project_id = request.project_id;
        let current = self.project(project_id)?;
        // fail fast before paying for an embedding
        check_identity(self.config.identity_policy, &current, &request)?;

        let text = self.append_embed_text(&current, &request);
        let mut vector = self.engine.embed(&text).await?;

        let guard = self.lock_project(project_id, "append").await?;
        // the question may have changed while we waited for the lock
        let locked_text = self.append_embed_text(&self.project(project_id)?, &request);
        if locked_text != text {
            log::debug!("Re-embedding append to project {} after a question change", project_id);
            vector = self.engine.embed(&locked_text).await?;
        }
        let summary_id = SummaryId::new();
        let policy = self.config.identity_policy;

        let appended = self
            .commit("append", project_id, Some(summary_id), move |state| {
                let _guard = guard;
                state.append(request, summary_id, vector, policy)
            })
            .await?;

        log::info!(
            "Appended summary {} to project {} (supersedes {})",
            appended.summary_id,
            project_id,
            appended.supersedes
        );
        Ok(appended)
    }

    /// Delete a project and every summary it owns
    pub async fn delete_project(&self, project_id: ProjectId) -> Result<DeletedProject> {
        if !self.state.projects.contains_key(&project_id) {
            return Err(MemoryError::project_not_found(project_id));
        }

        let guard = self.lock_project(project_id, "delete").await?;
        let deleted = self
            .commit("delete", project_id, None, move |state| {
                let _guard = guard;
                state.delete(project_id)
            })
            .await?;

        self.locks.remove(&project_id);
        log::info!(
            "Deleted project {} ({} summaries)",
            project_id,
            deleted.summaries_removed
        );
        Ok(deleted)
    }

    /// Current latest summary of a project
    pub fn get_latest(&self, project_id: ProjectId) -> Result<LatestSummary> {
        let project = self.project(project_id)?;
        let summary = self
            .state
            .summaries
            .get(&project.latest)
            .map(|s| s.clone())
            .ok_or_else(|| MemoryError::summary_not_found(project.latest))?;

        Ok(LatestSummary {
            project_id,
            name: project.name,
            question: project.question,
            summary_id: summary.id,
            summary: summary.text,
            created_at: summary.created_at,
        })
    }

    /// Project metadata
    pub fn get_project(&self, project_id: ProjectId) -> Result<ProjectInfo> {
        Ok(self.project(project_id)?.info())
    }

    /// The project owning `summary_id`
    pub fn resolve_project(&self, summary_id: SummaryId) -> Result<ProjectInfo> {
        self.visible(&summary_id)
            .map(|(_, project)| project)
            .ok_or_else(|| MemoryError::summary_not_found(summary_id))
    }

    /// Look up summaries by id, in input order. Unknown ids are skipped and
    /// repeated ids are returned once.
    pub fn fetch(&self, ids: &[SummaryId]) -> Vec<FetchedSummary> {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.visible(id))
            .map(|(summary, project)| FetchedSummary {
                summary_id: summary.id,
                project_id: project.id,
                question: project.question,
                text: summary.text,
            })
            .collect()
    }

    /// The full summary chain of a project, newest first
    pub fn history(&self, project_id: ProjectId) -> Result<Vec<Summary>> {
        let project = self.project(project_id)?;
        let expected = project.summaries.len();
        let mut chain = Vec::with_capacity(expected);
        let mut seen = HashSet::with_capacity(expected);
        let mut cursor = Some(project.latest);

        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Err(MemoryError::corrupt(format!(
                    "summary chain of project {} loops at {}",
                    project_id, id
                )));
            }
            let Some(summary) = self.state.summaries.get(&id).map(|s| s.clone()) else {
                if !self.state.projects.contains_key(&project_id) {
                    // deleted while walking
                    return Err(MemoryError::project_not_found(project_id));
                }
                return Err(MemoryError::corrupt(format!(
                    "summary chain of project {} references missing summary {}",
                    project_id, id
                )));
            };
            if summary.project_id != project_id {
                return Err(MemoryError::corrupt(format!(
                    "summary {} in the chain of project {} belongs to {}",
                    id, project_id, summary.project_id
                )));
            }
            cursor = summary.supersedes;
            chain.push(summary);
        }

        if chain.len() != expected {
            return Err(MemoryError::corrupt(format!(
                "project {} owns {} summaries but its chain reaches {}",
                project_id,
                expected,
                chain.len()
            )));
        }
        Ok(chain)
    }

    /// All projects, most recently updated first
    pub fn list_projects(&self) -> Vec<ProjectInfo> {
        let mut projects: Vec<ProjectInfo> = self
            .state
            .projects
            .iter()
            .map(|entry| entry.value().info())
            .collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        projects
    }

    /// Stored embedding of a visible summary
    pub fn embedding(&self, summary_id: SummaryId) -> Option<Vec<f32>> {
        self.visible(&summary_id)?;
        self.state.vectors.get(&summary_id)
    }

    pub fn project_count(&self) -> usize {
        self.state.projects.len()
    }

    pub fn summary_count(&self) -> usize {
        self.state.summaries.len()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            projects: self.state.projects.len(),
            summaries: self.state.summaries.len(),
            indexed_vectors: self.state.vectors.len(),
            indexed_documents: self.state.lexical.read().len(),
            dimension: self.engine.dimension(),
            model: self.engine.model_name().to_string(),
            cached_embeddings: self.engine.cache_size(),
        }
    }

    pub(crate) fn engine(&self) -> &ModelEngine {
        &self.engine
    }

    pub(crate) fn vectors(&self) -> &VectorIndex {
        &self.state.vectors
    }

    pub(crate) fn lexical(&self) -> &RwLock<LexicalIndex> {
        &self.state.lexical
    }

    /// A summary and its owning project, if the project currently owns it
    pub(crate) fn visible(&self, summary_id: &SummaryId) -> Option<(Summary, ProjectInfo)> {
        let owner = *self.state.owners.get(summary_id)?;
        let summary = self.state.summaries.get(summary_id).map(|s| s.clone())?;
        if summary.project_id != owner {
            return None;
        }
        let project = self.state.projects.get(&owner)?;
        Some((summary, project.info()))
    }

    /// Text embedded for `request` when appended onto `current`
    fn append_embed_text(&self, current: &Project, request: &AppendSummary) -> String {
        let question = request.supplied_question().unwrap_or(&current.question);
        self.config.embed_input.compose(question, &request.summary)
    }

    fn project(&self, project_id: ProjectId) -> Result<Project> {
        self.state
            .projects
            .get(&project_id)
            .map(|p| p.clone())
            .ok_or_else(|| MemoryError::project_not_found(project_id))
    }

    async fn lock_project(
        &self,
        project_id: ProjectId,
        operation: &'static str,
    ) -> Result<OwnedMutexGuard<()>> {
        let lock = self.locks.entry(project_id)
            .or_insert_with(Default::default)
            .value()
            .clone();
        tokio::time::timeout(self.config.store_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                log::warn!(
                    "Timed out waiting {:?} for project {} ({})",
                    self.config.store_timeout,
                    project_id,
                    operation
                );
                MemoryError::Contended {
                    operation,
                    project_id: project_id.to_string(),
                }
            })
    }

    /// Run a durable write on the blocking pool, bounded by `store_timeout`.
    /// A timed-out or failed task leaves the outcome unknown to the caller.
    async fn commit<T, F>(
        &self,
        operation: &'static str,
        project_id: ProjectId,
        summary_id: Option<SummaryId>,
        f: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&GraphState) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let task = tokio::task::spawn_blocking(move || f(&state));

        let unacknowledged = || MemoryError::Unacknowledged {
            operation,
            project_id: project_id.to_string(),
            summary_id: summary_id.map(|id| id.to_string()),
        };

        match tokio::time::timeout(self.config.store_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                log::error!("{} on project {} aborted: {}", operation, project_id, join_err);
                Err(unacknowledged())
            }
            Err(_) => {
                log::warn!(
                    "{} on project {} not acknowledged within {:?}",
                    operation,
                    project_id,
                    self.config.store_timeout
                );
                Err(unacknowledged())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedInput;
    use crate::error::ErrorKind;
    use crate::model::HashingModel;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> MemoryGraph {
        open_with(MemoryConfig::at(dir.path()))
    }

    fn open_with(config: MemoryConfig) -> MemoryGraph {
        MemoryGraph::open(config, Arc::new(HashingModel::new(64))).unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_latest() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);

        let created = graph
            .create_project(CreateProject::new("Booking System", "Build a booking API", "routes defined"))
            .await
            .unwrap();

        let latest = graph.get_latest(created.project_id).unwrap();
        assert_eq!(latest.summary_id, created.summary_id);
        assert_eq!(latest.summary, "routes defined");
        assert_eq!(latest.name, "Booking System");
        assert_eq!(graph.history(created.project_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_chains_onto_latest() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let created = graph
            .create_project(CreateProject::new("p", "q", "first"))
            .await
            .unwrap();

        let appended = graph
            .append_summary(AppendSummary::new(created.project_id, "second"))
            .await
            .unwrap();
        assert_eq!(appended.supersedes, created.summary_id);

        let history = graph.history(created.project_id).unwrap();
        let texts: Vec<&str> = history.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
        assert_eq!(history[0].supersedes, Some(created.summary_id));
        assert!(history[1].is_root());
    }

    #[tokio::test]
    async fn test_append_overwrites_identity() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let created = graph
            .create_project(CreateProject::new("old name", "old question", "first"))
            .await
            .unwrap();

        graph
            .append_summary(
                AppendSummary::new(created.project_id, "second")
                    .with_name("new name")
                    .with_question("   "),
            )
            .await
            .unwrap();

        let info = graph.get_project(created.project_id).unwrap();
        assert_eq!(info.name, "new name");
        // blank values leave the stored one alone
        assert_eq!(info.question, "old question");
        assert_eq!(info.summary_count, 2);
    }

    #[tokio::test]
    async fn test_append_to_unknown_project() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);

        let err = graph
            .append_summary(AppendSummary::new(ProjectId::new(), "text"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(graph.summary_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_write_nothing() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);

        let err = graph
            .create_project(CreateProject::new("", "q", "s"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(graph.project_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let created = graph
            .create_project(CreateProject::new("p", "q", "first"))
            .await
            .unwrap();
        let appended = graph
            .append_summary(AppendSummary::new(created.project_id, "second"))
            .await
            .unwrap();

        let deleted = graph.delete_project(created.project_id).await.unwrap();
        assert_eq!(deleted.summaries_removed, 2);

        assert!(graph.get_latest(created.project_id).is_err());
        assert!(graph.resolve_project(appended.summary_id).is_err());
        assert!(graph.fetch(&[created.summary_id, appended.summary_id]).is_empty());
        assert!(graph.embedding(created.summary_id).is_none());
        assert_eq!(graph.stats().indexed_vectors, 0);
        assert_eq!(graph.stats().indexed_documents, 0);

        let again = graph.delete_project(created.project_id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_fetch_dedupes_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let a = graph
            .create_project(CreateProject::new("a", "qa", "alpha"))
            .await
            .unwrap();
        let b = graph
            .create_project(CreateProject::new("b", "qb", "beta"))
            .await
            .unwrap();

        let fetched = graph.fetch(&[b.summary_id, SummaryId::new(), a.summary_id, b.summary_id]);
        let texts: Vec<&str> = fetched.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["beta", "alpha"]);
        assert_eq!(fetched[0].project_id, b.project_id);
        assert_eq!(fetched[0].question, "qb");
    }

    #[tokio::test]
    async fn test_list_projects_newest_first() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let older = graph
            .create_project(CreateProject::new("older", "q", "s"))
            .await
            .unwrap();
        let newer = graph
            .create_project(CreateProject::new("newer", "q", "s"))
            .await
            .unwrap();
        graph
            .append_summary(AppendSummary::new(older.project_id, "bumped"))
            .await
            .unwrap();

        let listed: Vec<ProjectId> = graph.list_projects().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![older.project_id, newer.project_id]);
    }

    #[test]
    fn test_reject_policy() {
        let current = Project::new("name", "question", SummaryId::new(), Utc::now());

        let same = AppendSummary::new(current.id, "s").with_name("name");
        assert!(check_identity(IdentityPolicy::Reject, &current, &same).is_ok());

        let renamed = AppendSummary::new(current.id, "s").with_name("other");
        assert!(check_identity(IdentityPolicy::Overwrite, &current, &renamed).is_ok());
        let err = check_identity(IdentityPolicy::Reject, &current, &renamed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let requestioned = AppendSummary::new(current.id, "s").with_question("other");
        assert!(check_identity(IdentityPolicy::Reject, &current, &requestioned).is_err());
    }

    #[tokio::test]
    async fn test_busy_project_is_contended() {
        let dir = TempDir::new().unwrap();
        let graph = open_with(MemoryConfig {
            store_timeout: Duration::from_millis(500),
            ..MemoryConfig::at(dir.path())
        });
        let created = graph
            .create_project(CreateProject::new("p", "q", "first"))
            .await
            .unwrap();

        let held = graph.lock_project(created.project_id, "hold").await.unwrap();
        let err = graph
            .append_summary(AppendSummary::new(created.project_id, "second"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Contended { operation: "append", .. }));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Store);

        let err = graph.delete_project(created.project_id).await.unwrap_err();
        assert!(matches!(err, MemoryError::Contended { operation: "delete", .. }));

        // nothing was written
        assert_eq!(graph.summary_count(), 1);
        assert_eq!(graph.history(created.project_id).unwrap().len(), 1);

        drop(held);
        graph
            .append_summary(AppendSummary::new(created.project_id, "second"))
            .await
            .unwrap();
        assert_eq!(graph.history(created.project_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_commit_is_unacknowledged() {
        let dir = TempDir::new().unwrap();
        let graph = open_with(MemoryConfig {
            store_timeout: Duration::from_millis(50),
            ..MemoryConfig::at(dir.path())
        });
        let project_id = ProjectId::new();
        let summary_id = SummaryId::new();

        let err = graph
            .commit("append", project_id, Some(summary_id), |_state| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await
            .unwrap_err();

        match &err {
            MemoryError::Unacknowledged {
                operation,
                project_id: project,
                summary_id: summary,
            } => {
                assert_eq!(*operation, "append");
                assert_eq!(project, &project_id.to_string());
                assert_eq!(summary.as_deref(), Some(summary_id.to_string().as_str()));
            }
            other => panic!("expected Unacknowledged, got {:?}", other),
        }
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_aborted_commit_is_unacknowledged() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);

        let err = graph
            .commit("delete", ProjectId::new(), None, |_state| -> Result<()> {
                panic!("write task died")
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Unacknowledged {
                operation: "delete",
                summary_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_question_change_while_waiting_is_embedded() {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(open_with(MemoryConfig {
            embed_input: EmbedInput::QuestionAndSummary,
            ..MemoryConfig::at(dir.path())
        }));
        let created = graph
            .create_project(CreateProject::new("p", "old question", "first"))
            .await
            .unwrap();

        let held = graph.lock_project(created.project_id, "hold").await.unwrap();
        let pending = tokio::spawn({
            let graph = Arc::clone(&graph);
            async move {
                graph
                    .append_summary(AppendSummary::new(created.project_id, "second"))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // another writer changed the question before releasing the lock
        graph
            .state
            .projects
            .get_mut(&created.project_id)
            .unwrap()
            .question = "new question".to_string();
        drop(held);

        let appended = pending.await.unwrap().unwrap();
        let expected = graph.engine.embed("new question\nsecond").await.unwrap();
        let stale = graph.engine.embed("old question\nsecond").await.unwrap();
        assert_ne!(expected, stale);
        assert_eq!(graph.embedding(appended.summary_id).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_unowned_summary_is_invisible() {
        let dir = TempDir::new().unwrap();
        let graph = open(&dir);
        let created = graph
            .create_project(CreateProject::new("p", "q", "first"))
            .await
            .unwrap();

        // indexed but not yet listed by its project
        let pending = Summary::successor(
            SummaryId::new(),
            created.project_id,
            created.summary_id,
            "pending",
            Utc::now(),
        );
        let vector = graph.engine.embed("pending").await.unwrap();
        graph.state.publish_summary(pending.clone(), vector).unwrap();

        assert!(graph.fetch(&[pending.id]).is_empty());
        assert!(graph.resolve_project(pending.id).is_err());
        assert!(graph.embedding(pending.id).is_none());
        assert_eq!(graph.fetch(&[created.summary_id, pending.id]).len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_restores_ownership() {
        let dir = TempDir::new().unwrap();
        let created = {
            let graph = open(&dir);
            graph
                .create_project(CreateProject::new("p", "q", "first"))
                .await
                .unwrap()
        };

        let graph = open(&dir);
        let owner = graph.resolve_project(created.summary_id).unwrap();
        assert_eq!(owner.id, created.project_id);
    }
}
