use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slms_ingestor::config::{Config, StoreKind};
use slms_ingestor::db::{self, MemoryReadingStore, PgReadingStore, ReadingStore};
use slms_ingestor::ingest::Ingestor;
use slms_ingestor::metrics;
use slms_ingestor::rest;
use slms_ingestor::upstream::HttpSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    info!("Starting SLMS ingestor");
    info!("Upstream: {} every {:?}", config.upstream_url, config.poll_interval);
    info!("HTTP server: {}", config.http_addr);

    metrics::init_metrics().context("Failed to register metrics")?;

    let store: Arc<dyn ReadingStore> = match config.store {
        StoreKind::Postgres => {
            info!("Database: {}", config.redacted_database_url());
            let pool = db::make_pool(&config.database_url)
                .await
                .context("Failed to connect to database")?;
            Arc::new(PgReadingStore::new(pool))
        }
        StoreKind::Memory => {
            info!("Using in-memory store; readings are lost on exit");
            Arc::new(MemoryReadingStore::new())
        }
    };

    let source = HttpSource::new(config.upstream_url.clone(), config.upstream_timeout)
        .context("Failed to build upstream client")?;

    let ingestor = Ingestor::new(Arc::new(source), store.clone());
    let ingest_handle = tokio::spawn(ingestor.run(config.poll_interval, config.seed_on_empty));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(store))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = ingest_handle => {
            error!("Ingestion task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
