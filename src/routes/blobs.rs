use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::auth::AppState;
use crate::error::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/blobs/*key", get(get_blob))
}

/// Serves a stored blob with the headers it was uploaded with.
async fn get_blob(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Response> {
    let metadata = state
        .blobs
        .metadata(&key)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| AppError::NotFound("Blob not found".to_string()))?;
    let data = state.blobs.download(&key).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, metadata.content_type)
        .header(header::CONTENT_LENGTH, data.len());
    if let Some(cache_control) = metadata.cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control);
    }

    builder
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
