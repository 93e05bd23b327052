//! Worklog CLI Entry Point
//!
//! Operates a worklog memory store by hand. Each subcommand runs one store
//! operation and prints its result as JSON on stdout; logs go to stderr.

mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worklog_memory::{
    AppendSummary, CreateProject, ErrorKind, HybridSearch, MemoryError, ProjectId, SearchConfig,
    SearchRequest, SummaryId,
};

use store::StoreArgs;

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Versioned work-session memory with hybrid search")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a project with its first summary
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        summary: String,
    },
    /// Append a summary to an existing project
    Append {
        project: ProjectId,
        #[arg(long)]
        summary: String,
        /// New project name (blank keeps the stored one)
        #[arg(long)]
        name: Option<String>,
        /// New project question (blank keeps the stored one)
        #[arg(long)]
        question: Option<String>,
    },
    /// Show the latest summary of a project
    Latest { project: ProjectId },
    /// Show project metadata
    Project { project: ProjectId },
    /// Find the project owning a summary
    Resolve { summary: SummaryId },
    /// Look up summaries by id; unknown ids are skipped
    Fetch {
        #[arg(required = true)]
        summaries: Vec<SummaryId>,
    },
    /// Walk a project's summary chain, newest first
    History { project: ProjectId },
    /// List projects, most recently updated first
    List,
    /// Permanently delete a project and all of its summaries
    Delete {
        project: ProjectId,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Hybrid search with cross-encoder rerank
    Search(SearchArgs),
    /// Semantic + lexical fusion only, with per-list provenance
    Fused(SearchArgs),
    /// Store counters
    Stats,
}

#[derive(clap::Args)]
struct SearchArgs {
    query: String,
    #[arg(long)]
    top_k: Option<usize>,
    /// Candidates taken from each ranked list before fusion
    #[arg(long)]
    fusion_window: Option<usize>,
    #[arg(long)]
    rrf_k: Option<f64>,
    #[arg(long)]
    min_semantic_score: Option<f32>,
    #[arg(long)]
    min_lexical_score: Option<f32>,
}

impl SearchArgs {
    fn request(&self) -> SearchRequest {
        let defaults = SearchConfig::default();
        SearchConfig {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            fusion_window: self.fusion_window.unwrap_or(defaults.fusion_window),
            rrf_k: self.rrf_k.unwrap_or(defaults.rrf_k),
            min_semantic_score: self.min_semantic_score.or(defaults.min_semantic_score),
            min_lexical_score: self.min_lexical_score.or(defaults.min_lexical_score),
        }
        .request(self.query.as_str())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let graph = cli.store.open()?;

    match cli.command {
        Command::Create {
            name,
            question,
            summary,
        } => {
            let created = graph
                .create_project(CreateProject::new(name, question, summary))
                .await?;
            print_json(&created)
        }
        Command::Append {
            project,
            summary,
            name,
            question,
        } => {
            let mut request = AppendSummary::new(project, summary);
            request.name = name;
            request.question = question;
            print_json(&graph.append_summary(request).await?)
        }
        Command::Latest { project } => print_json(&graph.get_latest(project)?),
        Command::Project { project } => print_json(&graph.get_project(project)?),
        Command::Resolve { summary } => print_json(&graph.resolve_project(summary)?),
        Command::Fetch { summaries } => print_json(&graph.fetch(&summaries)),
        Command::History { project } => print_json(&graph.history(project)?),
        Command::List => print_json(&graph.list_projects()),
        Command::Delete { project, yes } => {
            if !yes {
                anyhow::bail!("deleting project {} is irreversible; pass --yes to confirm", project);
            }
            print_json(&graph.delete_project(project).await?)
        }
        Command::Search(args) => {
            let hits = HybridSearch::new(graph).search(&args.request()).await?;
            print_json(&hits)
        }
        Command::Fused(args) => {
            let hits = HybridSearch::new(graph)
                .fused_search(&args.request())
                .await?;
            print_json(&hits)
        }
        Command::Stats => print_json(&graph.stats()),
    }
}

/// Process exit code for a failed command
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<MemoryError>().map(MemoryError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Store) => 4,
        Some(ErrorKind::Retrieval) => 5,
        Some(ErrorKind::Configuration) => 6,
        None => 1,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worklog=info,worklog_memory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(exit_code(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_flags_fill_defaults() {
        let cli = Cli::try_parse_from(["worklog", "search", "booking schema", "--top-k", "3"])
            .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        let request = args.request();
        assert_eq!(request.query, "booking schema");
        assert_eq!(request.top_k, 3);
        assert_eq!(request.fusion_window, 20);
        assert_eq!(request.rrf_k, 60.0);
        assert_eq!(request.min_semantic_score, None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["worklog", "list", "--db", "/tmp/store", "--reject-renames"])
            .unwrap();
        assert_eq!(cli.store.db.as_deref(), Some(std::path::Path::new("/tmp/store")));
        assert!(cli.store.reject_renames);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["worklog", "latest", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let err = anyhow::Error::from(MemoryError::project_not_found("p"));
        assert_eq!(exit_code(&err), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
