//! HTTP surface: command routes and the byte sink.
//!
//! The cast device never receives bytes pushed to it; it fetches them from
//! `GET /stream/{uuid}`, which serves the session's current load from its
//! start offset. The command routes drive the [`SessionContext`].

use std::collections::HashMap;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::SessionContext;
use crate::error::SessionError;

/// Router combining the command endpoints and the device-facing sink.
pub fn session_router(context: SessionContext) -> Router {
    Router::new()
        .route("/play", post(play))
        .route("/stop", post(stop))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .route("/presence", post(presence))
        .route("/devices", post(devices))
        .route("/status/{uuid}", get(status))
        .route("/stream/{uuid}", get(stream))
        .with_state(context)
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub uuid: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct UuidRequest {
    pub uuid: String,
}

/// Presence update: `cur` is the room the user is now in.
#[derive(Debug, Deserialize)]
pub struct PresenceUpdate {
    pub uuid: String,
    pub cur: String,
}

/// Device map update: room → cast device friendly name.
#[derive(Debug, Deserialize)]
pub struct DevicesUpdate {
    pub casts: HashMap<String, String>,
}

/// Réponse d'erreur REST générique.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

async fn play(State(context): State<SessionContext>, Json(req): Json<PlayRequest>) -> Response {
    match context.play(&req.uuid, &req.query).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

async fn stop(State(context): State<SessionContext>, Json(req): Json<UuidRequest>) -> Response {
    match context.stop(&req.uuid).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

async fn next(State(context): State<SessionContext>, Json(req): Json<UuidRequest>) -> Response {
    match context.next(&req.uuid).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

async fn previous(State(context): State<SessionContext>, Json(req): Json<UuidRequest>) -> Response {
    match context.previous(&req.uuid).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(err),
    }
}

async fn presence(
    State(context): State<SessionContext>,
    Json(req): Json<PresenceUpdate>,
) -> Response {
    context.update_presence(&req.uuid, &req.cur).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn devices(State(context): State<SessionContext>, Json(req): Json<DevicesUpdate>) -> Response {
    context.update_devices(req.casts).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn status(State(context): State<SessionContext>, Path(uuid): Path<String>) -> Response {
    match context.now_playing(&uuid).await {
        Ok(now_playing) => (StatusCode::OK, Json(now_playing)).into_response(),
        Err(err) => map_error(err),
    }
}

/// The byte sink the cast device pulls from. Devices may fetch the same
/// load more than once; each request gets its own reader.
async fn stream(State(context): State<SessionContext>, Path(uuid): Path<String>) -> Response {
    match context.sink_reader(&uuid).await {
        Some(reader) => {
            debug!("Device fetching stream for {}", uuid);
            let body = Body::from_stream(reader.into_stream());
            ([(header::CONTENT_TYPE, "audio/mpeg")], body).into_response()
        }
        None => map_status(
            StatusCode::NOT_FOUND,
            "NO_STREAM",
            "No stream is active for this uuid",
        ),
    }
}

fn map_error(err: SessionError) -> Response {
    let (status, code) = match &err {
        SessionError::UnknownUuid(_) => (StatusCode::NOT_FOUND, "UNKNOWN_UUID"),
        SessionError::NoSession(_) => (StatusCode::NOT_FOUND, "NO_SESSION"),
        SessionError::NoDeviceForRoom(_) => (StatusCode::NOT_FOUND, "NO_DEVICE"),
        SessionError::EmptyQueue => (StatusCode::NOT_FOUND, "EMPTY_QUEUE"),
        SessionError::NotPlaying => (StatusCode::CONFLICT, "NOT_PLAYING"),
        SessionError::Catalog(_) => (StatusCode::BAD_GATEWAY, "CATALOG_ERROR"),
        SessionError::Device(_) => (StatusCode::BAD_GATEWAY, "DEVICE_ERROR"),
        SessionError::Buffer(_) => (StatusCode::BAD_GATEWAY, "BUFFER_ERROR"),
        SessionError::Offset(_) => (StatusCode::BAD_GATEWAY, "OFFSET_ERROR"),
    };
    map_status(status, code, &err.to_string())
}

fn map_status(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}
