use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::blockchain::NodeClient;
use crate::error::TrackerError;
use crate::logging::LogContext;
use crate::messaging::RedisClient;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server error: {0}")]
    Server(String),
}

impl From<ApiError> for StatusCode {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A dependency the health endpoints can check
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), TrackerError>;
}

#[async_trait]
impl HealthProbe for RedisClient {
    async fn check(&self) -> Result<(), TrackerError> {
        Ok(self.ping().await?)
    }
}

#[async_trait]
impl HealthProbe for NodeClient {
    async fn check(&self) -> Result<(), TrackerError> {
        self.ping().await?;
        Ok(())
    }
}

/// Body of `/health` and `/ready`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn healthy() -> Self {
        Self { status: "healthy".to_string(), error: None }
    }

    fn unhealthy(reason: &str) -> Self {
        Self { status: "unhealthy".to_string(), error: Some(reason.to_string()) }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub redis: Arc<dyn HealthProbe>,
    pub node: Arc<dyn HealthProbe>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .route("/metrics", get(get_metrics))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Redis is checked first, then the node
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if let Err(e) = state.redis.check().await {
        LogContext::new("http", "health")
            .with_error(&e)
            .error("Health check failed: Redis unavailable");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::unhealthy("redis_unavailable")));
    }

    if let Err(e) = state.node.check().await {
        LogContext::new("http", "health")
            .with_error(&e)
            .error("Health check failed: blockchain unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::unhealthy("blockchain_unavailable")),
        );
    }

    (StatusCode::OK, Json(HealthResponse::healthy()))
}

pub async fn get_ready(state: State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    get_health(state).await
}

pub async fn get_metrics() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "# Metrics placeholder\n")
}

/// HTTP server for the health endpoints
pub struct ApiServer {
    state: AppState,
    host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: String, port: u16) -> Self {
        Self { state, host, port }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ApiError> {
        let app = router(self.state.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP server starting on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        log::info!("HTTP server stopped");
        Ok(())
    }
}
