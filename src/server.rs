use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::advisor::{AdvisorError, AdvisorService, DEFAULT_SESSION_ID, Instructions};
use crate::config::AppConfig;
use crate::llm::ChatCompletionsClient;
use crate::session::{SessionSnapshot, SessionStore};

/// Service name reported by the index route.
const SERVICE_NAME: &str = "MiniMind Open Source Advisor API";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.llm_settings();
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        temperature = settings.temperature,
        "LLM configuration loaded"
    );

    let instructions = Instructions::load(&config.advisor.instructions_path).await?;
    let client = Arc::new(ChatCompletionsClient::new(settings)?);
    let advisor = Arc::new(AdvisorService::new(
        SessionStore::new(),
        instructions,
        client,
    ));

    let app = build_router(AppState { advisor }, &config.server.cors_origins);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Build the application router with CORS, tracing and panic handling.
///
/// An empty `cors_origins` list mirrors any requesting origin.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/docs", get(docs))
        .route("/chat", post(chat))
        .route("/history/{session_id}", delete(clear_history))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", get(get_session))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) if o != "*" => Some(v),
                _ => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    // Wildcards cannot be combined with credentials, so mirror instead.
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned by API handlers, rendered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Advisor(#[from] AdvisorError),

    #[error(transparent)]
    Rejection(#[from] JsonRejection),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Advisor(AdvisorError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Self::Rejection(rejection) => rejection.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Rejection(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unexpected internal error".to_string()
    };
    tracing::error!(detail = %detail, "Request handler panicked");
    ApiError::Internal(detail).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// The question to answer.
    question: String,
    /// Conversation to continue; `"default"` when omitted.
    #[serde(default)]
    session_id: Option<String>,
}

/// Response from chat API.
#[derive(Debug, Serialize)]
struct ChatResponse {
    answer: String,
    session_id: String,
}

/// GET / - Service description.
async fn index() -> impl IntoResponse {
    Json(json!({
        "message": SERVICE_NAME,
        "docs": "/docs",
        "endpoints": {
            "chat": "POST /chat",
            "clear_history": "DELETE /history/{session_id}",
            "sessions": "GET /sessions",
            "session": "GET /sessions/{session_id}",
            "health": "GET /health"
        }
    }))
}

/// GET /docs - Request and response shapes for each route.
async fn docs() -> impl IntoResponse {
    Json(json!({
        "title": SERVICE_NAME,
        "routes": [
            {
                "method": "POST",
                "path": "/chat",
                "request": {"question": "string", "session_id": "string (optional, default \"default\")"},
                "response": {"answer": "string", "session_id": "string"},
                "errors": {"422": "invalid body", "502": "completion service failed"}
            },
            {
                "method": "DELETE",
                "path": "/history/{session_id}",
                "response": {"message": "string"}
            },
            {
                "method": "GET",
                "path": "/sessions",
                "response": {"sessions": ["string"]}
            },
            {
                "method": "GET",
                "path": "/sessions/{session_id}",
                "response": {
                    "session_id": "string",
                    "created_at": "RFC 3339 timestamp",
                    "last_activity": "RFC 3339 timestamp",
                    "messages": [{"role": "user | assistant", "content": "string"}]
                },
                "errors": {"404": "unknown session"}
            },
            {
                "method": "GET",
                "path": "/health",
                "response": {"status": "healthy"}
            }
        ]
    }))
}

/// POST /chat - Answer a question within a session.
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    let session_id = req
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    tracing::info!(
        session_id = %session_id,
        question_length = req.question.len(),
        "Received chat request"
    );

    let answer = state.advisor.ask(&req.question, &session_id).await?;

    Ok(Json(ChatResponse { answer, session_id }))
}

/// DELETE /history/{session_id} - Clear a session's history.
async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    state.advisor.clear_history(&session_id).await;
    Json(json!({ "message": format!("History cleared for session: {session_id}") }))
}

/// GET /sessions - List known session IDs.
async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "sessions": state.advisor.list_sessions() }))
}

/// GET /sessions/{session_id} - Session history.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .advisor
        .history(&session_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {session_id}")))
}

/// GET /health - Liveness probe.
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
