use axum::{extract::State, routing::post, Json, Router};

use crate::auth::{AppState, CurrentUser};
use crate::error::AppResult;
use crate::models::{
    ShareCreateRequest, ShareIdRequest, ShareListResponse, ShareResponse, ShareUpdateRequest,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/share/create", post(create_share))
        .route("/share/list", post(list_shares))
        .route("/share/get", post(get_share))
        .route("/share/update", post(update_share))
        .route("/share/delete", post(delete_share))
        .route("/share/reprocess", post(reprocess_share))
}

async fn create_share(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShareCreateRequest>,
) -> AppResult<Json<ShareResponse>> {
    let share = state.shares.create(&current_user.id, request).await?;
    Ok(Json(share))
}

async fn list_shares(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ShareListResponse>> {
    Ok(Json(state.shares.list(&current_user.id)?))
}

async fn get_share(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShareIdRequest>,
) -> AppResult<Json<ShareResponse>> {
    Ok(Json(state.shares.get(&current_user.id, &request.share_id)?))
}

async fn update_share(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShareUpdateRequest>,
) -> AppResult<Json<ShareResponse>> {
    let share = state.shares.update(&current_user.id, request).await?;
    Ok(Json(share))
}

async fn delete_share(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShareIdRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .shares
        .delete(&current_user.id, &request.share_id)
        .await?;

    Ok(Json(serde_json::json!({"message": "Share deleted successfully"})))
}

/// Retries derivative generation for a share whose processing fell short.
async fn reprocess_share(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ShareIdRequest>,
) -> AppResult<Json<ShareResponse>> {
    let share = state
        .shares
        .reprocess(&current_user.id, &request.share_id)
        .await?;
    Ok(Json(share))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{
        create_test_app, insert_test_guitar, png_bytes, sample_guitar, test_token,
    };
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn bearer(owner_id: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", test_token(owner_id))).unwrap()
    }

    #[tokio::test]
    async fn test_owner_routes_require_token() {
        let (app, _pool, _blobs) = create_test_app();
        let server = TestServer::new(app).unwrap();

        let response = server.post("/api/v1/share/list").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/v1/share/list")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_list_and_delete() {
        let (app, pool, blobs) = create_test_app();
        let guitar = sample_guitar("g1", &["a", "b"]);
        insert_test_guitar(&pool, "owner-1", &guitar);
        blobs.insert_original(&guitar, "a", png_bytes(400, 300, [20, 20, 20, 255]));
        blobs.insert_original(&guitar, "b", png_bytes(300, 400, [40, 40, 40, 255]));
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/v1/share/create")
            .add_header(header::AUTHORIZATION, bearer("owner-1"))
            .json(&json!({"guitarId": "g1", "sharedFields": {"serialNumber": true}}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let created: Value = response.json();
        let share_id = created["shareId"].as_str().unwrap().to_string();
        assert_eq!(created["optimizedImages"].as_array().unwrap().len(), 2);
        assert!(created["publicUrl"].as_str().unwrap().ends_with(&share_id));
        assert!(created.get("ownerId").is_none());

        let listed: Value = server
            .post("/api/v1/share/list")
            .add_header(header::AUTHORIZATION, bearer("owner-1"))
            .await
            .json();
        assert_eq!(listed["shares"][0]["guitar"]["brand"], json!("Gibson"));

        let response = server
            .post("/api/v1/share/delete")
            .add_header(header::AUTHORIZATION, bearer("owner-2"))
            .json(&json!({"shareId": share_id}))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let response = server
            .post("/api/v1/share/delete")
            .add_header(header::AUTHORIZATION, bearer("owner-1"))
            .json(&json!({"shareId": share_id}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = server
            .post("/api/v1/share/get")
            .add_header(header::AUTHORIZATION, bearer("owner-1"))
            .json(&json!({"shareId": share_id}))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_requests() {
        let (app, pool, _blobs) = create_test_app();
        insert_test_guitar(&pool, "owner-1", &sample_guitar("g1", &["a"]));
        let server = TestServer::new(app).unwrap();

        let too_many: Vec<String> = (0..11).map(|i| format!("i{}", i)).collect();
        for body in [
            json!({"guitarId": "g1", "selectedImageIds": too_many}),
            json!({"guitarId": "g1", "sharedFields": "brand"}),
            json!({"guitarId": "g1", "selectedImageIds": ["missing"]}),
        ] {
            let response = server
                .post("/api/v1/share/create")
                .add_header(header::AUTHORIZATION, bearer("owner-1"))
                .json(&body)
                .await;
            assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{}", body);
            let error: Value = response.json();
            assert!(error["detail"].is_string());
        }
    }
}
