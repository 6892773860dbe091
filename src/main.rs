//! Proctor Cloud Server
//!
//! Attempt lifecycle and integrity scoring for proctored assessments.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PROCTOR CLOUD                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌─────────────────┐  ┌───────────────────┐ │
//! │  │  API      │  │  Attempt Engine │  │  Scoring          │ │
//! │  │  (Axum)   │─▶│  locks, policy  │─▶│  aggregate,       │ │
//! │  │           │  │  atomic commits │  │  classify, score  │ │
//! │  └───────────┘  └───────┬─────────┘  └───────────────────┘ │
//! │                         ▼                                   │
//! │         ┌──────────────────────────┐   ┌─────────────────┐ │
//! │         │ Document store           │   │ Notifier        │ │
//! │         │ (PostgreSQL / in-memory) │   │ (log / webhook) │ │
//! │         └──────────────────────────┘   └─────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod engine;
mod error;
mod handlers;
mod models;
mod notify;
mod scoring;
mod seed;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post, delete},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::engine::AttemptEngine;
use crate::notify::{Notifier, TracingNotifier, WebhookNotifier};
use crate::store::{DocumentStore, MemoryStore, PgDocumentStore};

pub use error::{AppError, AppResult};

/// `DATABASE_URL` value selecting the process-local store
const MEMORY_STORE_URL: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "proctor_cloud=debug,tower_http=debug".into());
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Proctor Cloud Server starting ({})...", config.environment);

    let store = connect_store(&config).await?;
    load_seed(&config, store.as_ref()).await?;
    let notifier = build_notifier(&config)?;
    let engine = AttemptEngine::new(store, notifier, config.engine());

    tracing::info!(
        "Fraud threshold {}, integrity penalty {}",
        config.fraud_threshold, config.integrity_penalty
    );

    // Build application state
    let state = AppState {
        engine: Arc::new(engine),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn connect_store(config: &config::Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.database_url == MEMORY_STORE_URL {
        if config.is_production() {
            tracing::warn!("Using the in-memory store in production: data is lost on restart");
        } else {
            tracing::info!("Using the in-memory store");
        }
        return Ok(Arc::new(MemoryStore::new()));
    }

    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url, config.engine().store_timeout)
        .await
        .context("failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(Arc::new(PgDocumentStore::new(pool)))
}

async fn load_seed(config: &config::Config, store: &dyn DocumentStore) -> anyhow::Result<()> {
    let Some(path) = &config.seed_file else {
        if config.database_url == MEMORY_STORE_URL {
            tracing::warn!(
                "In-memory store starts empty: start and submit return NotFound until SEED_FILE provides assessments and students"
            );
        }
        return Ok(());
    };

    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path))?;
    let seed = seed::parse_seed(&text)
        .with_context(|| format!("invalid seed file {}", path))?;
    let written = seed::apply_seed(store, &seed)
        .await
        .context("failed to apply seed data")?;

    tracing::info!(
        "Seeded {} documents from {} ({} assessments, {} students in file)",
        written, path, seed.assessments.len(), seed.students.len()
    );
    Ok(())
}

fn build_notifier(config: &config::Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("Teacher notifications via webhook");
            let notifier = WebhookNotifier::new(url.clone(), config.engine().store_timeout)
                .context("failed to build webhook client")?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(TracingNotifier)),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AttemptEngine>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Attempts
        .route("/api/v1/attempts/start", post(handlers::attempts::start))
        .route("/api/v1/attempts/:id", get(handlers::attempts::get))
        .route("/api/v1/attempts/:id/fraud", post(handlers::attempts::fraud_signal))
        .route("/api/v1/attempts/:id/submit", post(handlers::attempts::submit))
        .route("/api/v1/attempts/:id/signature", get(handlers::attempts::signature))

        // Students
        .route("/api/v1/students/:id/signatures", get(handlers::students::signatures))
        .route("/api/v1/students/:id/analytics", get(handlers::students::analytics))

        // Assessments
        .route("/api/v1/assessments/:id", delete(handlers::assessments::delete))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
