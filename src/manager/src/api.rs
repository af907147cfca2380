//! The admin HTTP API: liveness, readiness and the streams-mode CRUD
//! surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use flow::stream::StreamConfig;

use crate::streams::{StreamManager, StreamManagerError};

/// Build the admin router. The streams endpoints are mounted only in
/// streams mode.
pub fn admin_router(manager: Arc<StreamManager>, streams_mode: bool) -> Router {
    let mut router = Router::new()
        .route("/ping", get(ping_handler))
        .route("/version", get(version_handler))
        .route("/ready", get(ready_handler));
    if streams_mode {
        router = router.route("/streams", get(list_streams_handler)).route(
            "/streams/:id",
            get(get_stream_handler)
                .post(create_stream_handler)
                .put(update_stream_handler)
                .delete(delete_stream_handler),
        );
    }
    router.with_state(manager)
}

async fn ping_handler() -> &'static str {
    "pong"
}

async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "version": build_info::version(),
        "build": build_info::build_id(),
    }))
}

async fn ready_handler(State(manager): State<Arc<StreamManager>>) -> impl IntoResponse {
    if manager.all_healthy() {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "streams unhealthy").into_response()
    }
}

async fn list_streams_handler(State(manager): State<Arc<StreamManager>>) -> impl IntoResponse {
    Json(manager.list())
}

async fn get_stream_handler(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match manager.read(&id) {
        Ok(config) => Json(config).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_stream_handler(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
    body: String,
) -> axum::response::Response {
    let config = match parse_stream_config(&body) {
        Ok(config) => config,
        Err(detail) => return (StatusCode::BAD_REQUEST, detail).into_response(),
    };
    match manager.create(&id, config) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_stream_handler(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
    body: String,
) -> axum::response::Response {
    let config = match parse_stream_config(&body) {
        Ok(config) => config,
        Err(detail) => return (StatusCode::BAD_REQUEST, detail).into_response(),
    };
    match manager.update(&id, config).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_stream_handler(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match manager.delete(&id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

/// YAML is a superset of JSON, so one parser covers both body formats.
fn parse_stream_config(body: &str) -> Result<StreamConfig, String> {
    serde_yaml::from_str(body).map_err(|e| e.to_string())
}

fn error_response(err: StreamManagerError) -> axum::response::Response {
    let status = match &err {
        StreamManagerError::AlreadyExists(_) => StatusCode::CONFLICT,
        StreamManagerError::NotFound(_) => StatusCode::NOT_FOUND,
        StreamManagerError::StartFailed { .. } => StatusCode::BAD_REQUEST,
        StreamManagerError::StopFailed { .. } | StreamManagerError::Load(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}
