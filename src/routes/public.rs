use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::get,
    Json, Router,
};

use crate::auth::AppState;
use crate::error::AppResult;
use crate::models::{PublicShareResponse, ViewRequest};

/// Edge headers that may carry the viewer's country, in order of preference.
const COUNTRY_HEADERS: &[&str] = &["cf-ipcountry", "cloudfront-viewer-country", "x-country-code"];

pub fn router() -> Router<AppState> {
    Router::new().route("/public/share/:share_id", get(get_shared_guitar))
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn view_request(headers: &HeaderMap) -> ViewRequest {
    ViewRequest {
        referrer: header_text(headers, header::REFERER.as_str()),
        country: COUNTRY_HEADERS
            .iter()
            .find_map(|name| header_text(headers, name)),
        user_agent: header_text(headers, header::USER_AGENT.as_str()),
    }
}

async fn get_shared_guitar(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<PublicShareResponse>> {
    let response = state.shares.get_public(&share_id, view_request(&headers))?;
    Ok(Json(response))
}
