mod api;
mod cache;
mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use prosperity_core::{InMemoryRecordStore, Orchestrator, RecordStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::EnhancementCache;
use crate::config::AppConfig;

pub use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: Arc<dyn RecordStore>,
    pub cache: EnhancementCache,
    pub config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prosperity=info,prosperity_core=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    println!("================================================");
    println!("     PROSPERITY DATA ENHANCEMENT - Starting Up  ");
    println!("================================================");

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    println!("[CONFIG] Server: {}:{}", config.server.host, config.server.port);
    if config.auth_enabled() {
        println!("[CONFIG] API key: set (length: {})", config.server.api_key.len());
    } else {
        println!("[CONFIG] API key: *** EMPTY - authentication disabled, set PROSPERITY__SERVER__API_KEY ***");
    }
    println!(
        "[CONFIG] Collector: timeout={}ms retries={} backoff={}ms",
        config.collector.source_timeout_ms, config.collector.max_retries, config.collector.retry_backoff_ms
    );
    println!(
        "[CONFIG] Harmonizer: outlier_policy={:?} sigma={}",
        config.harmonizer.outlier_policy, config.harmonizer.outlier_sigma
    );
    println!(
        "[CONFIG] Predictor: proxy_coverage_threshold={} ensemble_size={}",
        config.predictor.proxy_coverage_threshold, config.predictor.ensemble_size
    );
    match config.simulation.seed {
        Some(seed) => println!("[CONFIG] Simulated providers: seed={} failure_rate={}", seed, config.simulation.failure_rate),
        None => println!("[CONFIG] Simulated providers: unseeded failure_rate={}", config.simulation.failure_rate),
    }
    println!(
        "[CONFIG] Cache: capacity={} ttl={}s",
        config.cache.max_capacity, config.cache.ttl_seconds
    );

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting prosperity data enhancement server"
    );

    println!("[PIPELINE] Wiring registry, collector, harmonizer and predictor...");
    let orchestrator = Orchestrator::from_settings(&config.pipeline_settings());
    let active_sources = orchestrator.registry().get_active_sources().await.len();
    let models = orchestrator.predictor().get_available_models().len();
    println!("[PIPELINE] Ready ({} active sources, {} prediction models)", active_sources, models);
    tracing::info!(active_sources = %active_sources, models = %models, "Pipeline ready");

    let state = AppState {
        orchestrator,
        store: Arc::new(InMemoryRecordStore::new()),
        cache: EnhancementCache::new(&config.cache),
        config: Arc::new(config.clone()),
    };

    println!("[ROUTER] Setting up API routes...");
    let app = Router::new()
        .merge(api::create_router(&state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    println!("[ROUTER] Routes configured: /health, /api/v1/sources, /api/v1/models, /api/v1/data-enhancement, /api/v1/user/{{user_id}}/indicators");

    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("================================================");
    println!("  Server listening on http://{}", addr);
    println!("================================================");
    println!();

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
