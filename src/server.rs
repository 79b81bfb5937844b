use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::dispatch::ResponseEnvelope;
use crate::error::BridgeError;

/// Chat requests are a single short message.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "config.loaded",
        mcp_url = %config.mcp.url,
        mcp_enabled = config.mcp.enabled,
        llm_base_url = %config.llm.base_url,
        llm_model = %config.llm.model,
        llm_protocol = %config.llm.protocol,
        "Configuration loaded"
    );

    let state = AppState::from_config(Arc::clone(&config));
    warm_catalog(&state).await;

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Fetch the catalog once so the first chat request does not pay for it.
pub async fn warm_catalog(state: &AppState) {
    if !state.bridge.tools_enabled() {
        info!(name: "mcp.catalog.skipped", "Tool use disabled, catalog not loaded");
        return;
    }
    let catalog = state.bridge.catalog().get_tools(false).await;
    if catalog.is_empty() {
        tracing::warn!(
            name: "mcp.catalog.degraded",
            endpoint = %state.config.mcp.url,
            "No tools loaded at startup, running in degraded mode"
        );
    } else {
        info!(
            name: "mcp.catalog.warmed",
            tool_count = catalog.len(),
            tools = ?catalog.names(),
            "Tool catalog loaded"
        );
    }
}

/// All routes and middleware, ready to serve.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let timeout = state.config.request_timeout();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/",
            get_service(ServeFile::new(Path::new(&static_dir).join("index.html"))),
        )
        .nest_service("/static", ServeDir::new(&static_dir))
        .route("/chat", post(api_chat))
        .route("/health", get(api_health))
        .route("/tools", get(api_tools))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            request_timeout(timeout, req, next)
        }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn request_timeout(duration: Duration, req: Request, next: Next) -> Response {
    match tokio::time::timeout(duration, next.run(req)).await {
        Ok(res) => res,
        Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!(name: "server.shutdown", "Shutdown signal received");
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content; missing or `null` counts as empty.
    #[serde(default)]
    message: Option<String>,
}

/// Error body for non-200 chat responses.
#[derive(Debug, Serialize)]
struct ApiError {
    error: &'static str,
    detail: String,
}

fn api_error(status: StatusCode, error: &'static str, detail: String) -> Response {
    (status, Json(ApiError { error, detail })).into_response()
}

/// POST /chat - Select and run one tool for the message.
async fn api_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.unwrap_or_default();
    tracing::info!(message_length = message.len(), "Received chat request");

    // Run on its own task so a panic surfaces as a 500 instead of a dropped connection.
    let bridge = Arc::clone(&state.bridge);
    let outcome = tokio::spawn(async move { bridge.run_query(&message).await }).await;

    match outcome {
        Ok(Ok(envelope)) => (StatusCode::OK, Json::<ResponseEnvelope>(envelope)).into_response(),
        Ok(Err(BridgeError::EmptyInput)) => api_error(
            StatusCode::BAD_REQUEST,
            "empty_message",
            BridgeError::EmptyInput.to_string(),
        ),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "chat request failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "chat task aborted");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "request processing aborted".to_string(),
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    mcp_enabled: bool,
    mcp_connection: &'static str,
    tools_count: usize,
    catalog_age_secs: Option<u64>,
    catalog_fresh: bool,
    fetched_at: Option<DateTime<Utc>>,
    timestamp: DateTime<Utc>,
}

/// GET /health - Tool host reachability and catalog freshness.
async fn api_health(
    State(state): State<AppState>,
    Query(q): Query<RefreshQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    let bridge = &state.bridge;
    if !bridge.tools_enabled() {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                mcp_enabled: false,
                mcp_connection: "disabled",
                tools_count: 0,
                catalog_age_secs: None,
                catalog_fresh: false,
                fetched_at: None,
                timestamp: Utc::now(),
            }),
        );
    }

    let catalog = bridge.catalog().get_tools(q.refresh).await;
    let connected = !catalog.is_empty();
    // An empty catalog is never stored, so only a stored one has an age.
    let stored = bridge.catalog().snapshot();

    let body = HealthResponse {
        status: if connected { "ok" } else { "degraded" },
        mcp_enabled: true,
        mcp_connection: if connected { "connected" } else { "unavailable" },
        tools_count: catalog.len(),
        catalog_age_secs: stored.as_ref().map(|c| c.age().as_secs()),
        catalog_fresh: stored.as_ref().is_some_and(|c| bridge.catalog().is_fresh(c)),
        fetched_at: stored.as_ref().map(|c| c.fetched_at()),
        timestamp: Utc::now(),
    };
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// One entry of the `/tools` listing.
#[derive(Debug, Serialize)]
struct ToolDto {
    name: String,
    description: String,
    parameters: Map<String, Value>,
}

/// GET /tools - Current tool catalog.
async fn api_tools(
    State(state): State<AppState>,
    Query(q): Query<RefreshQuery>,
) -> Json<Value> {
    if !state.bridge.tools_enabled() {
        return Json(json!({"tools": [], "fetched_at": null, "count": 0}));
    }

    let catalog = state.bridge.catalog().get_tools(q.refresh).await;
    let tools: Vec<ToolDto> = catalog
        .iter()
        .map(|t| ToolDto {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters(),
        })
        .collect();

    let fetched_at = state.bridge.catalog().snapshot().map(|c| c.fetched_at());

    Json(json!({
        "count": tools.len(),
        "tools": tools,
        "fetched_at": fetched_at,
    }))
}
