//! HTTP transport for the invocation engine.
//!
//! One discovery endpoint, one blocking and one streaming invoke endpoint
//! per agent id. Engine stream events map 1:1 onto SSE frames in order.
//! The transport holds no cross-request state; everything durable lives in
//! the thread store behind the engine.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use colloquy_engine::InvocationEngine;
use colloquy_protocol::{AgentDescriptor, AgentId, InvokeRequest, Message, ServeError, StreamEvent};
use futures_util::{Stream, StreamExt};
use serde_json::json;

#[derive(Clone)]
pub struct AppState {
    pub engine: InvocationEngine,
    /// When set, every endpoint except `/healthz` requires
    /// `Authorization: Bearer <secret>`.
    pub auth_secret: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "missing or invalid bearer token".to_owned(),
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(error: ServeError) -> Self {
        let status = match &error {
            ServeError::UnknownAgent(_) => StatusCode::NOT_FOUND,
            ServeError::DuplicateAgent(_)
            | ServeError::AgentExecution { .. }
            | ServeError::Store { .. }
            | ServeError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn build_router(state: AppState) -> Router {
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/agents", get(list_agents))
        .route("/agents/{agent_id}/invoke", post(invoke_agent))
        .route("/agents/{agent_id}/stream", post(stream_agent))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "colloquy-api"
    }))
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentDescriptor>> {
    Json(state.engine.registry().list())
}

async fn invoke_agent(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Json<Message>> {
    let agent_id = AgentId::from_string(agent_id);
    let message = state.engine.invoke(&agent_id, request).await?;
    Ok(Json(message))
}

async fn stream_agent(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let agent_id = AgentId::from_string(agent_id);
    let events = state.engine.stream(&agent_id, request).await?;
    let stream = events.map(|event| Ok(as_sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(secret) = &state.auth_secret else {
        return next.run(request).await;
    };
    if request.uri().path() == "/healthz" {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret);

    if authorized {
        next.run(request).await
    } else {
        ApiError::unauthorized().into_response()
    }
}

fn as_sse_event(event: &StreamEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|error| {
        json!({
            "kind": "error",
            "run_id": event.run_id().map(|id| id.as_str()).unwrap_or_default(),
            "detail": format!("event serialization failed: {error}"),
        })
        .to_string()
    });
    Event::default().event(event.kind_label()).data(payload)
}
