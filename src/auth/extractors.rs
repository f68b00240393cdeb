use crate::auth::jwt::decode_access_token;
use crate::config::Config;
use crate::database::DbPool;
use crate::error::AppError;
use crate::processor::ShareManager;
use crate::storage::BlobStore;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;
use std::sync::Arc;

/// The authenticated collection owner.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DbPool,
    pub blobs: Arc<dyn BlobStore>,
    pub shares: Arc<ShareManager>,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let mut token_str: Option<String> = None;

        if let Some(auth_header) = parts.headers.get(AUTHORIZATION) {
            if let Ok(auth_value) = auth_header.to_str() {
                if let Some(bearer_token) = auth_value.strip_prefix("Bearer ") {
                    token_str = Some(bearer_token.to_string());
                }
            }
        }

        // Fall back to query parameter
        if token_str.is_none() {
            if let Some(query) = parts.uri.query() {
                if let Ok(params) = serde_urlencoded::from_str::<TokenQuery>(query) {
                    token_str = params.token;
                }
            }
        }

        let token =
            token_str.ok_or_else(|| AppError::Authentication("Not authenticated".to_string()))?;

        let claims = decode_access_token(&token, &app_state.config)
            .ok_or_else(|| AppError::Authentication("Invalid or expired token".to_string()))?;

        Ok(CurrentUser { id: claims.sub })
    }
}

// Helper trait for extracting AppState from state
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AppState> for AppState {
    fn from_ref(input: &AppState) -> Self {
        input.clone()
    }
}
