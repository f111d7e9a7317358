use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use genstream_harness::{
    Event, EventKind, Harness, HarnessError, ModelRef, SessionConfig, UiStreamAdapter,
};
use serde::Deserialize;
use tracing::{info, warn};

pub struct AppState {
    pub harness: Harness,
    pub auth_token: Option<String>,
    pub default_provider: String,
    pub default_model: String,
    pub run_timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    pub prompt: String,
}

/// Per-response context handed back once the stream is over.
struct ChatContext {
    run_id: String,
    model: ModelRef,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    authorize(&headers, state.auth_token.as_deref())?;

    let model = resolve_model(&state, &payload);
    let mut builder = state
        .harness
        .session(SessionConfig::named("chat"))
        .run(model.clone())
        .user_text(payload.prompt);
    if let Some(system) = payload.system {
        builder = builder.system_prompt(system);
    }
    if let Some(timeout) = state.run_timeout {
        builder = builder.timeout(timeout);
    }

    let run = builder.start_stream().await?;
    let run_id = run.run_id().to_string();
    info!(run_id = %run_id, model = %model, "streaming chat response");

    Ok(UiStreamAdapter::new()
        .message_id(run_id.clone())
        .context(ChatContext { run_id, model })
        .on_complete(log_completion)
        .into_response(run.into_events()))
}

fn resolve_model(state: &AppState, payload: &ChatRequest) -> ModelRef {
    let model = payload
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&state.default_model);
    match payload.provider.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(provider) => ModelRef::new(provider.trim(), model.trim()),
        None => ModelRef::parse(model, &state.default_provider),
    }
}

fn log_completion(context: Option<ChatContext>, events: Vec<Event>) {
    let Some(context) = context else {
        return;
    };
    let failed = events
        .iter()
        .rev()
        .find_map(|event| match &event.kind {
            EventKind::Error {
                error_type,
                recoverable: false,
                ..
            } => Some(error_type.clone()),
            _ => None,
        });
    match failed {
        Some(error_type) => warn!(
            run_id = %context.run_id,
            model = %context.model,
            events = events.len(),
            error_type = %error_type,
            "chat response ended with error"
        ),
        None => info!(
            run_id = %context.run_id,
            model = %context.model,
            events = events.len(),
            "chat response finished"
        ),
    }
}

fn authorize(headers: &HeaderMap, token: Option<&str>) -> Result<(), ApiError> {
    let Some(token) = token else {
        return Ok(());
    };
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match header.and_then(|value| value.strip_prefix("Bearer ")) {
        Some(value) if value == token => Ok(()),
        _ => Err(ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<HarnessError> for ApiError {
    fn from(err: HarnessError) -> Self {
        let status = match &err {
            HarnessError::Validation(_) => StatusCode::BAD_REQUEST,
            HarnessError::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
