//! Command-line interface for feedflow

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use feedflow_analysis::HttpAnalyzer;
use feedflow_core::{ContentSource, Error, WorkflowExecution};
use feedflow_sources::YouTubeClient;
use feedflow_store::{MemoryStore, Store};
use feedflow_utils::Config;
use feedflow_workflow::{Engine, NewSource, Scheduler, SchedulerConfig, WorkflowService, upcoming};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "feedflow")]
#[command(about = "Scheduled content ingestion and market analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until interrupted
    Serve {
        /// JSON file holding an array of sources to register
        #[arg(short, long)]
        sources: Option<PathBuf>,
    },
    /// Run one item through the analysis pipeline
    Execute {
        /// Item URL
        url: String,
        /// Attribute the execution to this source
        #[arg(long)]
        source_id: Option<String>,
    },
    /// Resolve a channel URL and list its recent items
    TestSource {
        /// Channel URL
        url: String,
        /// Number of items to list
        #[arg(short, long, default_value_t = 10)]
        count: u32,
    },
    /// Validate a 5-field cron expression and show its next fire times
    CheckSchedule {
        /// Cron expression, e.g. "0 9 * * 1-5"
        expr: String,
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    feedflow_utils::init_tracing(config.log_format);

    let cli = Cli::parse();
    info!(app = %config.app_name, environment = %config.environment, "Starting feedflow");

    match cli.command {
        Commands::Serve { sources } => serve(sources).await,
        Commands::Execute { url, source_id } => execute(&url, source_id.as_deref()).await,
        Commands::TestSource { url, count } => test_source(&url, count).await,
        Commands::CheckSchedule { expr, count } => check_schedule(&expr, count),
    }
}

fn content_source() -> anyhow::Result<Option<Arc<dyn ContentSource>>> {
    let client = YouTubeClient::from_env()?;
    if client.is_none() {
        warn!("YOUTUBE_API_KEY not set, channel and playlist sources will not resolve");
    }
    Ok(client.map(|c| Arc::new(c) as Arc<dyn ContentSource>))
}

async fn serve(sources: Option<PathBuf>) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let analyzer = HttpAnalyzer::from_env()?;
    match analyzer.health_check().await {
        Ok(()) => info!(url = analyzer.base_url(), "Analysis service is healthy"),
        Err(e) => warn!(
            url = analyzer.base_url(),
            error = %e,
            "Analysis service health check failed, executions will fail until it recovers"
        ),
    }
    let engine = Engine::new(store.clone(), Arc::new(analyzer));
    let scheduler = Scheduler::new(
        store.clone(),
        engine.clone(),
        content_source()?,
        SchedulerConfig::from_env()?,
    );
    let service = WorkflowService::new(store, engine, scheduler.clone());

    scheduler.start().await?;
    if let Some(path) = sources {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let sources: Vec<NewSource> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        for new in sources {
            let url = new.url.clone();
            match service.create_source(new).await {
                Ok(source) => info!(source_id = %source.id, url, "Source registered"),
                Err(e) => warn!(url, error = %e, "Skipping source"),
            }
        }
    }

    let registered = scheduler.registered_sources().await;
    info!(timers = registered.len(), "Scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.stop().await;
    Ok(())
}

async fn execute(url: &str, source_id: Option<&str>) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Arc::new(HttpAnalyzer::from_env()?));

    match engine.execute(url, source_id).await {
        Ok(execution) => {
            print_execution(&execution)?;
            if let Some(id) = execution.recommendation_id.as_deref() {
                if let Some(rec) = store.get_recommendation(id).await? {
                    println!("{}", serde_json::to_string_pretty(&rec)?);
                }
            }
            Ok(())
        }
        Err(Error::ExecutionFailed { execution, reason }) => {
            print_execution(&execution)?;
            bail!("execution failed: {reason}")
        }
        Err(e) => Err(e.into()),
    }
}

fn print_execution(execution: &WorkflowExecution) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(execution)?);
    Ok(())
}

async fn test_source(url: &str, count: u32) -> anyhow::Result<()> {
    let Some(client) = YouTubeClient::from_env()? else {
        bail!("YOUTUBE_API_KEY must be set to test a source");
    };

    let channel_id = client.resolve_identifier(url).await?;
    println!("Resolved {url} to {channel_id}");

    let items = client.list_items(&channel_id, count, None).await?;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Published", "Item", "Title"]);
    for item in &items {
        table.add_row(vec![
            item.published_at.format("%Y-%m-%d %H:%M").to_string(),
            item.id.clone(),
            item.title.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn check_schedule(expr: &str, count: usize) -> anyhow::Result<()> {
    let fires = upcoming(expr, count)?;
    println!("{expr} is valid; next {} fire times (UTC):", fires.len());
    for at in fires {
        println!("  {}", at.to_rfc3339());
    }
    Ok(())
}
