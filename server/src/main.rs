use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;
use wikisearch_core::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_RESULT_LIMIT, DEFAULT_SIGNAL_WEIGHT};
use wikisearch_core::fusion::{FusionConfig, FusionWeights, MissingSignalPolicy};
use wikisearch_core::signals::SignalPaths;
use wikisearch_core::store::{BlockStore, CachedStore, HttpStore, LocalStore};
use wikisearch_core::{EngineConfig, IndexLayout, SearchEngine};

#[derive(Parser)]
struct Args {
    /// Local store root holding the indexes and signal tables
    #[arg(long, default_value = "./index")]
    index: String,
    /// Read from an HTTP(S) object-store base URL instead of the local root
    #[arg(long)]
    store_url: Option<String>,
    /// Per-fetch timeout for remote stores, in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    fetch_timeout_secs: u64,
    /// Keep fetched blocks in memory across queries
    #[arg(long, default_value_t = false)]
    cache_blocks: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Stem query tokens (use when the indexes were built with --stem)
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Results returned by body search and fed into fusion per field
    #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
    limit: usize,
    #[arg(long, default_value_t = DEFAULT_SIGNAL_WEIGHT)]
    title_weight: f64,
    #[arg(long, default_value_t = DEFAULT_SIGNAL_WEIGHT)]
    body_weight: f64,
    #[arg(long, default_value_t = DEFAULT_SIGNAL_WEIGHT)]
    anchor_weight: f64,
    #[arg(long, default_value_t = DEFAULT_SIGNAL_WEIGHT)]
    page_rank_weight: f64,
    #[arg(long, default_value_t = DEFAULT_SIGNAL_WEIGHT)]
    page_views_weight: f64,
    /// Fusion candidates lacking page rank or views: drop | zero
    #[arg(long, default_value = "drop")]
    missing_signal: MissingSignalPolicy,
}

fn open_store(args: &Args) -> Result<Arc<dyn BlockStore>> {
    let store: Arc<dyn BlockStore> = match (&args.store_url, args.cache_blocks) {
        (Some(url), true) => Arc::new(CachedStore::new(HttpStore::new(url, Duration::from_secs(args.fetch_timeout_secs))?)),
        (Some(url), false) => Arc::new(HttpStore::new(url, Duration::from_secs(args.fetch_timeout_secs))?),
        (None, true) => Arc::new(CachedStore::new(LocalStore::new(&args.index))),
        (None, false) => Arc::new(LocalStore::new(&args.index)),
    };
    Ok(store)
}

fn load_engine(args: &Args) -> Result<SearchEngine> {
    let config = EngineConfig {
        result_limit: args.limit,
        fusion: FusionConfig {
            weights: FusionWeights {
                title: args.title_weight,
                body: args.body_weight,
                anchor: args.anchor_weight,
                page_rank: args.page_rank_weight,
                page_views: args.page_views_weight,
            },
            missing_signal: args.missing_signal,
        },
    };
    let store = open_store(args)?;
    Ok(SearchEngine::open(store, &IndexLayout::default(), &SignalPaths::default(), config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let stem = args.stem;

    // the blocking http client must not be created on an async worker
    let engine = tokio::task::spawn_blocking(move || load_engine(&args)).await??;
    let app: Router = build_app(Arc::new(engine), stem);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
