//! REST handlers (§4.7, §6): a stateless `axum::Router` built from a handle to the engine's
//! public contract. Each handler validates its own input and maps engine errors to status codes
//! per the taxonomy in §7.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use engine::{parse_duration, DownloadSnapshot, EngineError, Registry};

use crate::dto::{AddDownloadRequest, ApiError};
use crate::settings::SettingsStore;
use crate::ws;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<Registry>,
    pub(crate) settings: SettingsStore,
}

/// Builds the full router: the download CRUD endpoints, the settings pass-through, and `/ws`.
pub fn router(registry: Arc<Registry>) -> Router {
    let state = AppState {
        registry,
        settings: SettingsStore::default(),
    };

    Router::new()
        .route("/api/downloads", get(list_downloads).post(add_download))
        .route("/api/downloads/:id", get(get_download).delete(delete_download))
        .route("/api/downloads/:id/pause", post(pause_download))
        .route("/api/downloads/:id/resume", post(resume_download))
        .route("/api/downloads/:id/file", get(download_file))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}

fn engine_error_response(err: EngineError) -> Response {
    let (status, is_client_mistake) = match err {
        EngineError::NotFound => (StatusCode::NOT_FOUND, true),
        EngineError::InvalidRequest(_) | EngineError::InvalidState(_) => (StatusCode::BAD_REQUEST, true),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, false),
    };

    if is_client_mistake {
        tracing::warn!(error = %err, "rejected request");
    } else {
        tracing::error!(error = %err, "engine error");
    }

    (status, Json(ApiError::new(err.to_string()))).into_response()
}

fn parse_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| (StatusCode::BAD_REQUEST, Json(ApiError::new("invalid download id"))).into_response())
}

async fn list_downloads(State(state): State<AppState>) -> Json<Vec<DownloadSnapshot>> {
    Json(state.registry.list_downloads())
}

async fn add_download(State(state): State<AppState>, Json(request): Json<AddDownloadRequest>) -> Response {
    let connect_timeout = match parse_duration(&request.connect_timeout) {
        Ok(d) => d,
        Err(e) => return engine_error_response(e),
    };
    let read_timeout = match parse_duration(&request.read_timeout) {
        Ok(d) => d,
        Err(e) => return engine_error_response(e),
    };

    match state.registry.add_download(
        request.url,
        request.filename,
        request.chunks,
        connect_timeout,
        read_timeout,
    ) {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn get_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.get_download(id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn pause_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.pause_download(id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn resume_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.resume_download(id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn delete_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.registry.delete_download(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn download_file(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.registry.open_completed(id).await {
        Ok((file, snapshot)) => {
            let body = Body::from_stream(ReaderStream::new(file));
            Response::builder()
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", snapshot.filename),
                )
                .body(body)
                .expect("static headers are always valid")
        }
        Err(e) => engine_error_response(e),
    }
}

async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(state.settings.get())
}

async fn put_settings(State(state): State<AppState>, Json(values): Json<Map<String, Value>>) -> StatusCode {
    state.settings.replace(values);
    StatusCode::OK
}
