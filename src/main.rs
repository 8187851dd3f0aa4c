//! Weibo Ingestion CLI
//!
//! Runs one ingestion pass per invocation against the configured store:
//! - Comments for given statuses or for every stored status
//! - Statuses from the home/public timelines or by id
//! - Users derived from stored comments and statuses
//! - Read-only listing of stored comments
//!
//! Ctrl+C aborts the running pass.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weibo_ingestion::config::Config;
use weibo_ingestion::http_client::ApiHttpClient;
use weibo_ingestion::metrics;
use weibo_ingestion::query::{show_comments, ShowCommentsParams};
use weibo_ingestion::sources::WeiboApiSource;
use weibo_ingestion::store::{MemoryStore, PgStore, Store};
use weibo_ingestion::{BatchResult, CommentPassPolicy, IngestSettings, Ingestor};

/// Weibo Ingestion - rate-limit aware Weibo harvesting
#[derive(Parser, Debug)]
#[command(name = "weibo-ingestion")]
#[command(author = "Weibo Archive Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rate-limit aware ingestion of Weibo statuses, comments and users")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,

    /// Print Prometheus metrics after the run
    #[arg(long, default_value = "false", global = true)]
    print_metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest comments of the given statuses
    Comments {
        /// Comma separated status ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },

    /// Ingest comments of every stored status
    CommentsAll {
        /// Pause between statuses to stay under the rate limit
        #[arg(long)]
        slow: bool,

        /// Fetch comments even for statuses that already have some
        #[arg(long)]
        overwrite: bool,

        /// Newest statuses first
        #[arg(long)]
        reverse: bool,
    },

    /// Ingest statuses from the timelines, or the given ones
    Statuses {
        /// Comma separated status ids; timelines are read when omitted
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,
    },

    /// Derive users from stored records
    Users {
        #[arg(long, value_enum, default_value = "all")]
        from: UserSource,
    },

    /// List stored comments of one status
    ShowComments {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        count: Option<u64>,

        #[arg(long)]
        page: Option<u64>,
    },

    /// Create the store tables
    InitSchema,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UserSource {
    Comments,
    Statuses,
    All,
}

/// Generates a new correlation ID for the session
fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

/// Resolves on SIGINT/SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = generate_correlation_id();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        correlation_id = %correlation_id,
        "Starting Weibo Ingestion"
    );

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    info!(
        api = %config.weibo_api_base_url,
        step_size = config.step_size,
        max_concurrent = config.max_concurrent_requests,
        database = config.has_database(),
        "Configuration loaded"
    );

    let aborted = tokio::select! {
        result = run(cli.command, &config) => {
            if let Err(e) = result {
                error!(error = %e, "Run failed");
                return Err(e);
            }
            false
        }
        _ = shutdown_signal() => {
            warn!("Run aborted by operator");
            true
        }
    };

    if cli.print_metrics {
        println!("{}", metrics::gather_metrics());
    }

    exit_status(aborted)
}

/// Process exit: an operator abort exits non-zero.
fn exit_status(aborted: bool) -> Result<()> {
    if aborted {
        bail!("run aborted by operator");
    }
    info!("Weibo Ingestion stopped");
    Ok(())
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Comments { ids } => {
            let ingestor = build_ingestor(config, true).await?;
            report("comments", ingestor.ingest_comments_for_ids(&ids).await?);
        }

        Commands::CommentsAll { slow, overwrite, reverse } => {
            let ingestor = build_ingestor(config, true).await?;
            let policy = CommentPassPolicy { slow, overwrite, reverse };
            report("comments", ingestor.ingest_comments_for_all_statuses(policy).await?);
        }

        Commands::Statuses { ids } => {
            let ingestor = build_ingestor(config, true).await?;
            let result = if ids.is_empty() {
                ingestor.ingest_new_statuses().await?
            } else {
                ingestor.ingest_statuses_by_ids(&ids).await?
            };
            report("statuses", result);
        }

        Commands::Users { from } => {
            let ingestor = build_ingestor(config, false).await?;
            let result = match from {
                UserSource::Comments => ingestor.ingest_users_from_comments().await?,
                UserSource::Statuses => ingestor.ingest_users_from_statuses().await?,
                UserSource::All => ingestor.ingest_all_users().await?,
            };
            report("users", result);
        }

        Commands::ShowComments { id, count, page } => {
            let store = open_store(config).await?;
            let params = ShowCommentsParams::parse(Some(id), count, page)?;
            let page = show_comments(store.as_ref(), params).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }

        Commands::InitSchema => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("DATABASE_URL is required for init-schema");
            };
            let store = PgStore::connect(url, config.db_max_connections).await?;
            store.ensure_schema().await?;
            info!("Schema ready");
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using an in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn build_ingestor(config: &Config, needs_upstream: bool) -> Result<Ingestor> {
    let comments_token = config.comments_token().unwrap_or_default();
    let statuses_token = config.statuses_token().unwrap_or_default();
    if needs_upstream && comments_token.is_empty() {
        bail!("WEIBO_COMMENTS_TOKEN or WEIBO_STATUSES_TOKEN must be set");
    }

    let client = ApiHttpClient::new(&config.weibo_api_base_url, config.http_client())?;
    let source = WeiboApiSource::new(Arc::new(client), comments_token, statuses_token, config.page_count);
    let store = open_store(config).await?;

    Ok(Ingestor::new(store, Arc::new(source), IngestSettings::from_config(config)))
}

fn report(label: &str, result: BatchResult) {
    info!(label, total = result.total(), success = result.success(), "Pass finished");
    println!("{label}: {result}");
}
