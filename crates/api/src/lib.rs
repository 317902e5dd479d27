use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use consulta_cache::ResultCache;
use consulta_core::Classification;
use consulta_dispatch::{DispatchConfig, Dispatcher, HandlerRegistry};
use consulta_handlers::{offline_registry, remote_registry, RemoteConfig};
use consulta_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<AppMetrics>,
    pub remote: bool,
}

impl ApiState {
    pub fn new(
        registry: HandlerRegistry,
        config: DispatchConfig,
        remote: bool,
    ) -> Result<Self> {
        let metrics = AppMetrics::shared();
        let dispatcher = Dispatcher::new(
            registry,
            ResultCache::new(config.cache_ttl),
            config,
            Arc::clone(&metrics),
        )
        .context("failed to build dispatcher")?;

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            metrics,
            remote,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    config: ConfigView,
    remote_handlers: bool,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    deadline_secs: f64,
    grace_secs: f64,
    max_handler_steps: u32,
    cache_ttl_secs: u64,
}

impl From<&DispatchConfig> for ConfigView {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            deadline_secs: config.deadline.as_secs_f64(),
            grace_secs: config.grace.as_secs_f64(),
            max_handler_steps: config.max_handler_steps,
            cache_ttl_secs: config.cache_ttl.as_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CacheInfo {
    size: usize,
    ttl_secs: u64,
}

pub async fn build_app() -> Result<Router> {
    let config = DispatchConfig::from_env();
    let remote_config = RemoteConfig::from_env();
    let remote = remote_config.is_some();
    let registry = match remote_config {
        Some(remote_config) => remote_registry(remote_config)?,
        None => offline_registry(),
    };

    let state = ApiState::new(registry, config, remote)?;
    info!(
        deadline_ms = config.deadline.as_millis() as u64,
        grace_ms = config.grace.as_millis() as u64,
        remote,
        "dispatcher ready"
    );
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/dispatch", post(dispatch))
        .route("/v1/classify", post(classify))
        .route("/v1/cache", get(cache_info).delete(cache_clear))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(16 * 1024))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        config: ConfigView::from(state.dispatcher.config()),
        remote_handlers: state.remote,
    };
    (StatusCode::OK, Json(payload))
}

async fn dispatch(State(state): State<ApiState>, Json(request): Json<QueryRequest>) -> Response {
    let query = request.query.trim();
    if query.is_empty() {
        return empty_query();
    }

    let outcome = state.dispatcher.dispatch(query).await;
    (StatusCode::OK, Json(outcome)).into_response()
}

async fn classify(State(state): State<ApiState>, Json(request): Json<QueryRequest>) -> Response {
    let query = request.query.trim();
    if query.is_empty() {
        return empty_query();
    }

    let classification: Classification = state.dispatcher.classify(query);
    (StatusCode::OK, Json(classification)).into_response()
}

async fn cache_info(State(state): State<ApiState>) -> impl IntoResponse {
    let cache = state.dispatcher.cache();
    Json(CacheInfo {
        size: cache.size(),
        ttl_secs: cache.ttl().as_secs(),
    })
}

async fn cache_clear(State(state): State<ApiState>) -> impl IntoResponse {
    let cleared = state.dispatcher.cache().clear();
    info!(cleared, "cache cleared over http");
    Json(serde_json::json!({ "cleared": cleared }))
}

fn empty_query() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "empty_query",
            "message": "query must not be empty"
        })),
    )
        .into_response()
}
