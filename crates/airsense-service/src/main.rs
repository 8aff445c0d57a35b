//! airsense service - per-sensor refresh loops and HTTP API.
//!
//! Run with: `cargo run -p airsense-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use airsense_core::fetch::HttpFetcher;
use airsense_service::{AccessoryCache, AppState, Collector, Config, api, registry};

/// airsense service - air quality sensors backed by AirNow and WAQI.
#[derive(Parser, Debug)]
#[command(name = "airsense-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Accessory cache path (overrides config).
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short = 'D', long)]
    debug: bool,

    /// Disable background refresh (API only mode).
    #[arg(long)]
    no_collector: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("airsense_service={level}").parse()?)
                .add_directive(format!("airsense_core={level}").parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(cache_path) = args.cache {
        config.storage.path = cache_path;
    }

    config.validate()?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    info!("Opening accessory cache at {:?}", config.storage.path);
    let cache = AccessoryCache::open_or_empty(&config.storage.path);
    let fetcher = Arc::new(HttpFetcher::new(config.http.timeout())?);

    let bind = config.server.bind.clone();
    let state = AppState::new(config, cache);
    let count = registry::register_sensors(&state, fetcher).await?;
    info!("Registered {} sensor(s)", count);

    let collector = Collector::new(Arc::clone(&state));
    if !args.no_collector {
        collector.start().await;
    } else {
        info!("Background refresh disabled");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    let addr: SocketAddr = bind.parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    collector.stop();
    state.persist().await?;

    Ok(())
}
