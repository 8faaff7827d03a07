use crate::api;
use crate::config::{AppConfig, MEMORY_DATABASE};
use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use taskdraft_core::logging::{SharedEventLogger, TracingEventLogger};
use taskdraft_core::metrics::{InMemoryMetrics, Metrics};
use taskdraft_core::orchestrator::Orchestrator;
use taskdraft_core::registry::ProviderRegistry;
use taskdraft_core::storage::{InMemoryTodoStore, SqliteTodoStore, TodoStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TodoStore>,
    pub orchestrator: Orchestrator,
    pub logger: SharedEventLogger,
    pub metrics: Arc<dyn Metrics>,
}

impl AppState {
    /// Wires the orchestrator to the state's logger and metrics.
    pub fn new(
        store: Arc<dyn TodoStore>,
        orchestrator: Orchestrator,
        logger: SharedEventLogger,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        let orchestrator = orchestrator
            .with_logger(logger.clone())
            .with_metrics(metrics.clone());
        Self {
            store,
            orchestrator,
            logger,
            metrics,
        }
    }
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let origin = HeaderValue::from_str(cors_origin).unwrap_or(HeaderValue::from_static(
        crate::config::DEFAULT_CORS_ORIGIN,
    ));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn connect_store(database_url: &str) -> anyhow::Result<Arc<dyn TodoStore>> {
    if database_url == MEMORY_DATABASE {
        return Ok(Arc::new(InMemoryTodoStore::new()));
    }
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url {database_url}"))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {database_url}"))?;
    let store = SqliteTodoStore::new(pool);
    store.init().await?;
    Ok(Arc::new(store))
}

/// Builds the orchestrator from the process environment and the configured overrides.
pub fn build_orchestrator(config: &AppConfig, logger: SharedEventLogger) -> Orchestrator {
    let registry = ProviderRegistry::from_env(&config.providers);
    info!(providers = ?registry.labels(), "available providers");
    Orchestrator::from_registry(&registry, logger)
        .with_generation_settings(config.generation)
}

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let logger: SharedEventLogger = Arc::new(TracingEventLogger);
    let metrics: Arc<dyn Metrics> = Arc::new(InMemoryMetrics::new());
    let store = connect_store(&config.database_url).await?;
    let orchestrator = build_orchestrator(&config, logger.clone());
    let state = AppState::new(store, orchestrator, logger, metrics);
    let app = build_router(state, &config.cors_origin);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Starting server on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
