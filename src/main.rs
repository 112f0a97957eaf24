//! gantry: an OpenAI-compatible proxy that routes chat completions across
//! pooled provider accounts, rotating on retryable upstream failures.

mod accounts;
mod auth;
mod catalog;
mod config;
mod db;
mod dispatch;
mod middleware;
mod models;
mod routes;
mod transport;
mod vault;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::auth::{Authenticator, StaticSessionValidator};
use crate::catalog::CatalogRegistry;
use crate::config::ProxyConfig;
use crate::db::DbPool;
use crate::dispatch::DispatchEngine;
use crate::transport::TransportRegistry;
use crate::vault::Vault;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database error: {0}")]
    Db(#[from] db::DbError),

    #[error("vault error: {0}")]
    Vault(#[from] vault::VaultError),

    #[error("catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub db: Arc<DbPool>,
    pub vault: Arc<Vault>,
    pub catalog: CatalogRegistry,
    pub task_tracker: TaskTracker,
    pub authenticator: Authenticator,
    pub engine: DispatchEngine,
}

impl AppState {
    pub async fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        Self::with_transports(config, TransportRegistry::new()).await
    }

    /// Like [`AppState::new`] but with caller-supplied transports, so tests
    /// can script upstream behavior.
    pub async fn with_transports(
        config: ProxyConfig,
        transports: TransportRegistry,
    ) -> Result<Self, StartupError> {
        let config = Arc::new(config);

        let vault = Arc::new(Vault::from_base64_key(&config.vault.key)?);
        let db = Arc::new(DbPool::from_config(&config.database).await?);

        let catalog = CatalogRegistry::new();
        match &config.catalog.path {
            Some(path) => catalog.load_from_path(Path::new(path))?,
            None => catalog.load_from_json(catalog::EMBEDDED_CATALOG)?,
        }
        tracing::info!(models = catalog.snapshot().model_count(), "catalog loaded");

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.upstream_timeout_secs))
            .connect_timeout(Duration::from_secs(
                config.server.upstream_connect_timeout_secs,
            ))
            .build()?;

        let task_tracker = TaskTracker::new();
        let sessions = Arc::new(StaticSessionValidator::new(
            config.auth.static_sessions.clone(),
        ));
        let authenticator = Authenticator::new(db.api_keys(), sessions, task_tracker.clone());
        let engine = DispatchEngine::new(
            db.clone(),
            catalog.clone(),
            vault.clone(),
            transports,
            http_client,
        );

        Ok(Self {
            config,
            db,
            vault,
            catalog,
            task_tracker,
            authenticator,
            engine,
        })
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        .merge(routes::api::api_routes(state.clone()))
        .merge(routes::admin::admin_routes(state))
        .fallback(routes::error::unknown_endpoint)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(CorsLayer::permissive()),
        )
}

#[derive(Parser)]
#[command(name = "gantry", about = "AI provider proxy with account rotation")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gantry.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ProxyConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };
    let task_tracker = state.task_tracker.clone();
    let app = build_app(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("listening on http://{bind_addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(task_tracker))
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

/// Resolves on Ctrl-C or SIGTERM, then drains background tasks.
async fn shutdown_signal(task_tracker: TaskTracker) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down, draining background tasks");
    task_tracker.close();
    task_tracker.wait().await;
}
