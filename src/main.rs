//! scholarmap - map where your Google Scholar citations come from
//!
//! Fetches the works citing an author through SerpApi, matches citing
//! affiliations against a CSV of institutions and renders a map.
//!
//! ## Usage
//!
//! ### Run
//! ```bash
//! SERP_API_KEY=... scholarmap run --author qc6CJjYAAAAJ
//! ```
//!
//! ### View a run
//! ```bash
//! scholarmap serve --dir results/20240101_120000_qc6CJjYAAAAJ --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::Html, routing::get, Json, Router};
use clap::{Parser, Subcommand};
use scholarmap::cache::ResponseCache;
use scholarmap::config::{default_cache_dir, Config, MapOptions, DEFAULT_AFFILIATIONS, DEFAULT_BASE_URL};
use scholarmap::pipeline;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Map where your Google Scholar citations come from
#[derive(Parser)]
#[command(name = "scholarmap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch citations, resolve affiliations and render the map
    Run(RunArgs),

    /// Serve the map and summary of a finished run
    Serve {
        /// Output folder of a run
        #[arg(long)]
        dir: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Google Scholar author id (the `user=` value of the profile URL)
    #[arg(short, long, env = "SCHOLAR_AUTHOR_ID")]
    author: String,

    /// SerpApi key
    #[arg(long, env = "SERP_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Reference table of institutions (CSV)
    #[arg(long, default_value = DEFAULT_AFFILIATIONS)]
    affiliations: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./results")]
    output: PathBuf,

    /// Entries per ranking
    #[arg(long, default_value = "10")]
    top: usize,

    /// Results per SerpApi page
    #[arg(long, default_value = "20")]
    page_size: u32,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Reuse cached SerpApi responses
    #[arg(long)]
    cache: bool,

    /// Cache directory (default: platform cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Refetch even when cached responses exist
    #[arg(long)]
    overwrite: bool,

    /// Do not fetch citing authors' profiles
    #[arg(long)]
    skip_profiles: bool,

    /// Expand truncated author lists (one extra search per citing work)
    #[arg(long)]
    full_authors: bool,

    /// Keep citing works whose full result disagrees with the preview
    #[arg(long)]
    keep_warnings: bool,

    /// Marker radius scale
    #[arg(long, default_value = "6")]
    radius_scale: f64,

    /// Marker radius log base (0 for linear)
    #[arg(long, default_value = "2")]
    radius_log_base: f64,

    /// SerpApi base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Clear cached responses
    Clear,
    /// Show cache directory
    Path,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Serve { dir, port, host } => run_server(dir, host, port).await,
        Commands::Cache { action } => handle_cache(action),
    }
}

// ============================================================================
// Run
// ============================================================================

async fn run(args: RunArgs) -> Result<()> {
    let cache_dir = if args.cache || args.cache_dir.is_some() {
        Some(match args.cache_dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        })
    } else {
        None
    };

    let config = Config {
        base_url: args.base_url,
        page_size: args.page_size,
        timeout: Duration::from_secs(args.timeout),
        affiliations_path: args.affiliations,
        output_dir: args.output,
        cache_dir,
        overwrite: args.overwrite,
        fetch_profiles: !args.skip_profiles,
        full_authors: args.full_authors,
        keep_warnings: args.keep_warnings,
        map: MapOptions {
            radius_scale: args.radius_scale,
            radius_log_base: args.radius_log_base,
        },
        top_n: args.top,
        ..Config::new(args.api_key, args.author)
    };

    let report = pipeline::run(&config)
        .await
        .with_context(|| format!("Run for author '{}' failed", config.author_id))?;

    println!("\n{}", report.ranking);
    println!("✓ Run complete. Results in: {}", report.output_folder.display());
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

struct AppState {
    dir: PathBuf,
}

async fn run_server(dir: PathBuf, host: String, port: u16) -> Result<()> {
    if !dir.join("map.html").is_file() {
        anyhow::bail!("No map.html in {}", dir.display());
    }

    info!(host = %host, port = port, dir = %dir.display(), "Starting HTTP server");

    let app_state = Arc::new(AppState { dir });

    let app = Router::new()
        .route("/", get(map_handler))
        .route("/health", get(health_handler))
        .route("/api/summary", get(summary_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Rendered map of the run
async fn map_handler(State(state): State<Arc<AppState>>) -> std::result::Result<Html<String>, StatusCode> {
    tokio::fs::read_to_string(state.dir.join("map.html"))
        .await
        .map(Html)
        .map_err(|e| {
            error!(error = %e, "Failed to read map");
            StatusCode::NOT_FOUND
        })
}

/// Aggregate counts of the run
async fn summary_handler(State(state): State<Arc<AppState>>) -> std::result::Result<Json<serde_json::Value>, StatusCode> {
    let content = tokio::fs::read_to_string(state.dir.join("summary.json"))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    serde_json::from_str(&content).map(Json).map_err(|e| {
        error!(error = %e, "Invalid summary.json");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(action: CacheAction) -> Result<()> {
    let cache = ResponseCache::new()?;

    match action {
        CacheAction::Clear => {
            cache.clear()?;
            println!("Cache cleared.");
        }
        CacheAction::Path => {
            println!("Cache directory: {:?} ({} responses)", cache.dir(), cache.len());
        }
    }

    Ok(())
}
