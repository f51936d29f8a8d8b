//! `workflow-engine` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `migrate`  — run pending database migrations.
//! - `dispatch` — dispatch one event (used by the external scheduler).
//! - `run`      — run one workflow by id.
//! - `validate` — validate a workflow JSON file.

mod settings;
mod validate;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::TriggerEvent;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use settings::{DbArgs, EngineArgs};

#[derive(Parser)]
#[command(
    name = "workflow-engine",
    about = "Event-driven workflow automation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        #[command(flatten)]
        database: DbArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[command(flatten)]
        database: DbArgs,
    },
    /// Dispatch a single event and print the report.
    Dispatch {
        #[arg(long)]
        scope_id: Uuid,
        #[arg(long)]
        event_type: String,
        /// Event payload as a JSON object.
        #[arg(long, default_value = "{}")]
        data: String,
        #[command(flatten)]
        database: DbArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one workflow by id and print the execution summary.
    Run {
        workflow_id: Uuid,
        #[arg(long, default_value = "{}")]
        data: String,
        #[command(flatten)]
        database: DbArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
}

fn parse_data(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("--data must be valid JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database, engine } => {
            let store = database.connect().await?;
            let orchestrator = engine.build_orchestrator(&store)?;
            let state = api::AppState::new(orchestrator, Arc::new(store));
            info!("Starting API server on {bind}");
            api::serve(bind, state).await?;
        }
        Command::Migrate { database } => {
            let store = database.connect().await?;
            db::pool::run_migrations(store.pool()).await?;
            info!("Migrations applied successfully");
        }
        Command::Dispatch { scope_id, event_type, data, database, engine } => {
            let data = parse_data(&data)?;
            let store = database.connect().await?;
            let orchestrator = engine.build_orchestrator(&store)?;
            let report = orchestrator
                .dispatch_event(TriggerEvent::new(scope_id, event_type, data))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run { workflow_id, data, database, engine } => {
            let data = parse_data(&data)?;
            let store = database.connect().await?;
            let orchestrator = engine.build_orchestrator(&store)?;
            let summary = orchestrator.run_workflow(workflow_id, data).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let workflow: db::models::Workflow =
                serde_json::from_str(&content).context("invalid workflow JSON")?;

            let problems = validate::validate_workflow(&workflow);
            if problems.is_empty() {
                println!("✅ Workflow '{}' is valid ({} actions).", workflow.name, workflow.actions.len());
            } else {
                for problem in &problems {
                    eprintln!("❌ {problem}");
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
