use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::AppState;
use crate::config::Config;
use crate::database::DbPool;
use crate::logging::request_logger;
use crate::processor::optimizer::{ImageOptimizer, Watermark};
use crate::processor::ShareManager;
use crate::routes::api_router;
use crate::storage::BlobStore;
use crate::VERSION;

#[derive(Serialize)]
struct HealthcheckResponse {
    status: String,
    version: String,
}

async fn healthcheck() -> Json<HealthcheckResponse> {
    Json(HealthcheckResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
    })
}

pub fn create_app(config: Arc<Config>, pool: DbPool, blobs: Arc<dyn BlobStore>) -> Router {
    let watermark = Arc::new(Watermark::from_config(&config.optimizer));
    let optimizer = ImageOptimizer::new(
        Arc::clone(&blobs),
        watermark,
        config.optimizer.clone(),
        config.sharing.processing_concurrency,
    );
    let shares = ShareManager::new(
        pool.clone(),
        Arc::clone(&blobs),
        Arc::new(optimizer),
        config.sharing.clone(),
    );

    let state = AppState {
        config,
        pool,
        blobs,
        shares: Arc::new(shares),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/healthcheck", get(healthcheck))
        .merge(api_router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    #[tokio::test]
    async fn test_healthcheck() {
        let (app, _pool, _blobs) = create_test_app();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api/v1/healthcheck").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
    }
}
