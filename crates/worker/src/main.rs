//! triage-worker - bulk filter runs and searches for one project.

mod config;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triage_core::error::CoreError;
use triage_core::search::SearchQuery;
use triage_core::store::EventStore;
use triage_core::types::{DbId, ROOT_FOLDER_ID};
use triage_db::repositories::ProjectRepo;
use triage_db::PgEventStore;
use triage_engine::FilterEngine;

use config::{LogFormat, WorkerConfig};

/// triage-worker - run filters and searches against a project's events
#[derive(Parser, Debug)]
#[command(name = "triage-worker")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every enabled filter against the project or one folder
    RunAll {
        /// Limit the run to one folder
        #[arg(long)]
        folder: Option<DbId>,
    },

    /// Run one filter against the project or one folder
    RunFilter {
        filter_id: DbId,

        /// Limit the run to one folder
        #[arg(long)]
        folder: Option<DbId>,

        /// Run the filter even if it is disabled
        #[arg(long)]
        force: bool,
    },

    /// Free-text search over messages, types, subtypes and tag values
    Search {
        query: String,

        /// Limit the search to one folder
        #[arg(long)]
        folder: Option<DbId>,
    },

    /// Print the folder tree as absolute paths
    Folders,
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "triage_worker=debug,triage_engine=debug,triage_db=info".into()),
    );
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Write one JSON document per line to stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), CoreError> {
    let line = serde_json::to_string(value).map_err(|e| CoreError::Internal(e.to_string()))?;
    println!("{line}");
    Ok(())
}

async fn run<S: EventStore>(command: Command, engine: &mut FilterEngine<S>) -> Result<(), CoreError> {
    match command {
        Command::RunAll { folder } => {
            let report = match folder {
                Some(folder_id) => engine.run_filters_on_folder(folder_id).await?,
                None => engine.run_filters_on_all().await?,
            };
            print_json(&report)
        }
        Command::RunFilter {
            filter_id,
            folder,
            force,
        } => {
            let report = match folder {
                Some(folder_id) => engine.run_filter_on_folder(filter_id, folder_id, force).await?,
                None => engine.run_filter_on_all(filter_id, force).await?,
            };
            print_json(&report)
        }
        Command::Search { query, folder } => {
            let events = engine
                .search(&SearchQuery {
                    text: query,
                    folder_id: folder,
                })
                .await?;
            for event in &events {
                print_json(event)?;
            }
            Ok(())
        }
        Command::Folders => {
            let tree = engine.folder_tree().await?;
            println!("{ROOT_FOLDER_ID}\t/");
            for id in tree.descendants(ROOT_FOLDER_ID) {
                if let Some(path) = tree.path_of(id) {
                    println!("{id}\t{path}");
                }
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    init_tracing(config.log_format);
    tracing::info!(project_id = config.project_id, "Loaded worker configuration");

    // --- Database ---
    let pool = triage_db::create_pool(&config.database_url, config.max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    triage_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    triage_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let project = ProjectRepo::find_by_id(&pool, config.project_id)
        .await
        .expect("Failed to look up project");
    let Some(project) = project else {
        tracing::error!(project_id = config.project_id, "Project does not exist");
        std::process::exit(1);
    };

    // --- Command ---
    let mut engine = FilterEngine::new(PgEventStore::new(pool, project.id));
    if let Err(e) = run(cli.command, &mut engine).await {
        tracing::error!(project = %project.name, error = %e, "Command failed");
        std::process::exit(1);
    }
}
