use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod dashboard;
mod db;
mod error;
mod lister;
mod models;
mod render;
mod sample;
mod source;
mod web;

use config::{Credentials, ServeOverrides, ServerConfig, DEFAULT_CREDENTIALS_PATH};
use dashboard::Dashboard;
use source::{ComplaintSource, MemoryComplaintSource};

#[derive(Parser)]
#[command(name = "complaints-dashboard")]
#[command(about = "Austin 311 complaints dashboard", long_about = None)]
struct Cli {
    /// JSON credentials file holding the warehouse database_url
    #[arg(long, global = true, default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard (default)
    Serve(ServeArgs),
    /// Create or upgrade the warehouse schema
    InitDb,
    /// Load sample service requests
    Seed,
    /// Import service requests from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Bind address (default 0.0.0.0)
    #[arg(long)]
    host: Option<IpAddr>,
    /// Listen port (default $PORT or 5000)
    #[arg(long)]
    port: Option<u16>,
    /// Verbose logging
    #[arg(long)]
    debug: bool,
    /// Number of categories offered in the selector
    #[arg(long)]
    category_limit: Option<u32>,
    /// Serve built-in sample data instead of querying the warehouse
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Serve(ServeArgs::default()));

    match command {
        Commands::Serve(args) => serve(&cli.credentials, args).await?,
        Commands::InitDb => {
            init_tracing(env_debug());
            let pool = connect(&cli.credentials).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            init_tracing(env_debug());
            let pool = connect(&cli.credentials).await?;
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} sample service requests.");
        }
        Commands::Import { csv } => {
            init_tracing(env_debug());
            let pool = connect(&cli.credentials).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} service requests from {}.", csv.display());
        }
    }

    Ok(())
}

async fn serve(credentials_path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig::from_env(ServeOverrides {
        host: args.host,
        port: args.port,
        debug: args.debug,
        category_limit: args.category_limit,
    })?;
    init_tracing(config.debug);
    info!("Starting complaints dashboard v{}", env!("CARGO_PKG_VERSION"));

    let source: Arc<dyn ComplaintSource> = if args.demo {
        info!("Serving built-in sample data");
        Arc::new(MemoryComplaintSource::new(sample::requests()))
    } else {
        Arc::new(db::PgComplaintSource::new(connect(credentials_path).await?))
    };

    let dashboard = Dashboard::start(source, config.category_limit)
        .await
        .context("failed to load complaint categories")?;
    info!(
        categories = dashboard.categories().len(),
        "Complaint categories loaded"
    );

    let state = web::AppState {
        dashboard: Arc::new(dashboard),
    };
    web::start_web_server(SocketAddr::new(config.host, config.port), state).await
}

async fn connect(credentials_path: &Path) -> anyhow::Result<PgPool> {
    let credentials = Credentials::resolve(std::env::var("DATABASE_URL").ok(), credentials_path)
        .context("DATABASE_URL or a credentials file must point at the complaints warehouse")?;
    if let Some(project_id) = &credentials.project_id {
        info!(project_id = %project_id, "Using warehouse credentials");
    }

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&credentials.database_url)
        .await
        .context("failed to connect to Postgres")
}

fn env_debug() -> bool {
    std::env::var("DEBUG")
        .map(|value| config::is_truthy(&value))
        .unwrap_or(false)
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed by the host process.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
