//! RocksDB persistence
//!
//! Key layout:
//!
//! | key            | value                         |
//! |----------------|-------------------------------|
//! | `proj:<uuid>`  | bincode [`Project`]           |
//! | `sum:<uuid>`   | bincode [`Summary`]           |
//! | `vec:<uuid>`   | bincode `Vec<f32>` embedding  |
//! | `_db_version`  | u32 LE format version         |
//! | `_dimension`   | u32 LE embedding dimension    |
//!
//! Every mutation is a single synced `WriteBatch`, so a crash leaves either
//! the whole operation on disk or none of it.

use std::collections::HashMap;
use std::path::Path;

use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};

use crate::error::{MemoryError, Result};
use crate::node::{Project, ProjectId, Summary, SummaryId};

const PROJECT_PREFIX: &str = "proj:";
const SUMMARY_PREFIX: &str = "sum:";
const VECTOR_PREFIX: &str = "vec:";

fn project_key(id: &ProjectId) -> String {
    format!("{}{}", PROJECT_PREFIX, id)
}

fn summary_key(id: &SummaryId) -> String {
    format!("{}{}", SUMMARY_PREFIX, id)
}

fn vector_key(id: &SummaryId) -> String {
    format!("{}{}", VECTOR_PREFIX, id)
}

/// A summary as recovered from disk, with its embedding
pub struct StoredSummary {
    pub summary: Summary,
    pub vector: Vec<f32>,
}

/// Consistent view of the database produced by [`Storage::load`]
#[derive(Default)]
pub struct LoadedGraph {
    pub projects: Vec<Project>,
    /// Only summaries owned by a loaded project
    pub summaries: Vec<StoredSummary>,
}

/// Durable record store
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open (creating if needed) the database at `path` for a model producing
    /// `dimension`-length embeddings
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            MemoryError::invalid_path(format!("{}: {}", path.display(), e))
        })?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_bytes_per_sync(1048576); // 1MB
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        crate::migration::prepare(&db, dimension)?;

        log::info!("Storage opened at: {}", path.display());
        Ok(Self { db })
    }

    /// Read every record back, dropping anything not reachable from a project
    pub fn load(&self) -> Result<LoadedGraph> {
        let mut projects = Vec::new();
        let mut summaries: HashMap<SummaryId, Summary> = HashMap::new();
        let mut vectors: HashMap<SummaryId, Vec<f32>> = HashMap::new();
        let mut skipped = 0usize;

        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);

            if key_str.starts_with(PROJECT_PREFIX) {
                match bincode::deserialize::<Project>(&value) {
                    Ok(project) => projects.push(project),
                    Err(e) => {
                        log::warn!("Failed to deserialize {}: {}. Skipping.", key_str, e);
                        skipped += 1;
                    }
                }
            } else if key_str.starts_with(SUMMARY_PREFIX) {
                match bincode::deserialize::<Summary>(&value) {
                    Ok(summary) => {
                        summaries.insert(summary.id, summary);
                    }
                    Err(e) => {
                        log::warn!("Failed to deserialize {}: {}. Skipping.", key_str, e);
                        skipped += 1;
                    }
                }
            } else if let Some(raw_id) = key_str.strip_prefix(VECTOR_PREFIX) {
                let decoded = raw_id
                    .parse::<SummaryId>()
                    .ok()
                    .zip(bincode::deserialize::<Vec<f32>>(&value).ok());
                match decoded {
                    Some((id, vector)) => {
                        vectors.insert(id, vector);
                    }
                    None => {
                        log::warn!("Failed to deserialize {}. Skipping.", key_str);
                        skipped += 1;
                    }
                }
            }
        }

        let mut loaded = LoadedGraph {
            projects: Vec::with_capacity(projects.len()),
            summaries: Vec::with_capacity(summaries.len()),
        };

        for project in projects {
            for id in &project.summaries {
                let Some(summary) = summaries.remove(id) else {
                    log::error!("Project {} references missing summary {}", project.id, id);
                    continue;
                };
                if summary.project_id != project.id {
                    log::error!(
                        "Summary {} belongs to {} but is owned by {}. Skipping.",
                        id,
                        summary.project_id,
                        project.id
                    );
                    continue;
                }
                let Some(vector) = vectors.remove(id) else {
                    log::error!("Summary {} has no stored embedding. Skipping.", id);
                    continue;
                };
                loaded.summaries.push(StoredSummary { summary, vector });
            }
            loaded.projects.push(project);
        }

        let orphans = summaries.len() + vectors.len();
        if orphans > 0 {
            log::warn!("Ignoring {} unreachable records", orphans);
        }
        if skipped > 0 {
            log::warn!("Skipped {} records due to deserialization errors", skipped);
        }
        log::info!(
            "Loaded {} projects and {} summaries from disk",
            loaded.projects.len(),
            loaded.summaries.len()
        );

        Ok(loaded)
    }

    /// Persist a new summary, its embedding and the project record that now
    /// owns it, atomically
    pub fn write_summary(&self, project: &Project, summary: &Summary, vector: &[f32]) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(summary_key(&summary.id), bincode::serialize(summary)?);
        batch.put(vector_key(&summary.id), bincode::serialize(vector)?);
        batch.put(project_key(&project.id), bincode::serialize(project)?);
        self.write(batch)
    }

    /// Remove a project together with every summary and embedding it owns
    pub fn delete_project(&self, project: &Project) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.delete(project_key(&project.id));
        for id in &project.summaries {
            batch.delete(summary_key(id));
            batch.delete(vector_key(id));
        }
        self.write(batch)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }
}
