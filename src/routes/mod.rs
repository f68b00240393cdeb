mod blobs;
mod public;
mod share;

use axum::Router;
use crate::auth::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(share::router())
        .merge(public::router())
        .merge(blobs::router())
}
