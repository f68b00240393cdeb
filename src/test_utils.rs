#![cfg(test)]

use crate::app::create_app;
use crate::auth::create_access_token;
use crate::config::{Config, OptimizerConfig, SharingConfig};
use crate::database::{init_database, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{Guitar, GuitarImage, PrivateInfo, Share, SharedFields};
use crate::processor::optimizer::{ImageOptimizer, Watermark};
use crate::processor::ShareManager;
use crate::storage::{key_from_public_url, BlobMetadata, BlobStore};
use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use chrono::Utc;
use image::{ImageFormat, Rgba, RgbaImage};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_BLOB_BASE_URL: &str = "http://localhost:8000/api/v1/blobs";

/// Create an in-memory SQLite database pool with full schema applied.
///
/// Each pooled connection to `:memory:` would get its own empty database, so
/// the pool is capped at a single connection.
pub fn create_test_db() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to create test database pool");

    let conn = pool.get().expect("Failed to get connection from pool");
    init_database(&conn).expect("Failed to initialize test database schema");

    pool
}

/// In-memory blob store addressed like the production one.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Bytes, BlobMetadata)>>,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Stores `data` at the key the guitar's image URL points to.
    pub fn insert_original(&self, guitar: &Guitar, image_id: &str, data: Vec<u8>) {
        let image = guitar.image(image_id).expect("image not on guitar");
        let key = self.key_from_url(&image.url).expect("image url has no key");
        let metadata = BlobMetadata {
            content_type: "image/png".to_string(),
            cache_control: None,
            size: data.len() as u64,
        };
        self.blobs
            .lock()
            .unwrap()
            .insert(key, (Bytes::from(data), metadata));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download(&self, key: &str) -> AppResult<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| AppError::NotFound(format!("Blob not found: {}", key)))
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> AppResult<()> {
        let metadata = BlobMetadata {
            content_type: content_type.to_string(),
            cache_control: Some(cache_control.to_string()),
            size: data.len() as u64,
        };
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, metadata));
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("delete disabled".to_string()));
        }
        let mut blobs = self.blobs.lock().unwrap();
        for key in keys {
            blobs.remove(key);
        }
        Ok(())
    }

    async fn metadata(&self, key: &str) -> AppResult<Option<BlobMetadata>> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, metadata)| metadata.clone()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", TEST_BLOB_BASE_URL, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key_from_public_url(TEST_BLOB_BASE_URL, url)
    }
}

/// A fully described guitar whose images live under the test blob base URL.
pub fn sample_guitar(guitar_id: &str, image_ids: &[&str]) -> Guitar {
    Guitar {
        id: guitar_id.to_string(),
        brand: Some("Gibson".to_string()),
        model: Some("Les Paul Standard".to_string()),
        year: Some(1959),
        color: Some("Heritage Cherry Sunburst".to_string()),
        guitar_type: Some("electric".to_string()),
        body_wood: Some("Mahogany".to_string()),
        top_wood: Some("Maple".to_string()),
        pickups: Some("PAF humbuckers".to_string()),
        number_of_frets: Some(22),
        serial_number: Some("9-0824".to_string()),
        condition: Some("Excellent".to_string()),
        notes: Some("Bought from the original owner's family".to_string()),
        body_diagram: Some(json!("les-paul")),
        condition_markers: Some(vec![json!({"x": 0.4, "y": 0.7, "note": "Buckle rash"})]),
        images: image_ids
            .iter()
            .map(|id| GuitarImage {
                id: id.to_string(),
                url: format!(
                    "{}/guitars/owner-1/{}/{}.png",
                    TEST_BLOB_BASE_URL, guitar_id, id
                ),
                is_primary: false,
            })
            .collect(),
        private_info: Some(PrivateInfo {
            purchase_price: Some(250000.0),
            purchase_date: Some("2019-04-02".to_string()),
            purchase_location: Some("Private sale".to_string()),
            insurance_value: Some(400000.0),
        }),
        ..Default::default()
    }
}

/// Test fixture: store a guitar for `owner_id`, replacing any previous copy.
pub fn insert_test_guitar(pool: &DbPool, owner_id: &str, guitar: &Guitar) {
    let conn = pool.get().expect("Failed to get connection");
    let data = serde_json::to_string(guitar).expect("Failed to serialize guitar");
    conn.execute(
        "INSERT OR REPLACE INTO guitars (owner_id, guitar_id, data) VALUES (?, ?, ?)",
        rusqlite::params![owner_id, guitar.id, data],
    )
    .expect("Failed to insert test guitar");
}

/// An unprocessed share selecting images `a` and `b` with default visibility.
pub fn sample_share(owner_id: &str, share_id: &str, guitar_id: &str) -> Share {
    let now = Utc::now();
    Share {
        share_id: share_id.to_string(),
        owner_id: owner_id.to_string(),
        guitar_id: guitar_id.to_string(),
        created_at: now,
        updated_at: now,
        is_active: true,
        shared_fields: SharedFields::default(),
        selected_image_ids: vec!["a".to_string(), "b".to_string()],
        optimized_images: Vec::new(),
        view_count: 0,
        views: Vec::new(),
        last_viewed_at: None,
    }
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut data = Cursor::new(Vec::new());
    image
        .write_to(&mut data, ImageFormat::Png)
        .expect("Failed to encode test png");
    data.into_inner()
}

pub fn test_share_manager(
    pool: DbPool,
    blobs: Arc<MemoryBlobStore>,
    settings: SharingConfig,
) -> ShareManager {
    let blobs: Arc<dyn BlobStore> = blobs;
    let optimizer = ImageOptimizer::new(
        Arc::clone(&blobs),
        Arc::new(Watermark::builtin()),
        OptimizerConfig::default(),
        4,
    );
    ShareManager::new(pool, blobs, Arc::new(optimizer), settings)
}

/// Create a test app with in-memory database and blob store
pub fn create_test_app() -> (Router, DbPool, Arc<MemoryBlobStore>) {
    let pool = create_test_db();
    let blobs = Arc::new(MemoryBlobStore::new());
    let config = Arc::new(Config::default());
    let app = create_app(config, pool.clone(), blobs.clone());
    (app, pool, blobs)
}

pub fn test_token(owner_id: &str) -> String {
    create_access_token(owner_id, &Config::default()).expect("Failed to create test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_db() {
        let pool = create_test_db();
        let conn = pool.get().expect("Failed to get connection");

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('guitars', 'shares')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_insert_test_guitar_replaces() {
        let pool = create_test_db();
        let mut guitar = sample_guitar("g1", &["a"]);
        insert_test_guitar(&pool, "owner-1", &guitar);
        guitar.images.clear();
        insert_test_guitar(&pool, "owner-1", &guitar);

        let conn = pool.get().unwrap();
        let stored = crate::database::guitars::get_guitar(&conn, "owner-1", "g1")
            .unwrap()
            .unwrap();
        assert!(stored.images.is_empty());
    }

    #[tokio::test]
    async fn test_memory_blob_store_resolves_sample_urls() {
        let store = MemoryBlobStore::new();
        let guitar = sample_guitar("g1", &["a"]);
        store.insert_original(&guitar, "a", png_bytes(2, 2, [0, 0, 0, 255]));

        assert!(store.contains("guitars/owner-1/g1/a.png"));
        let data = store.download("guitars/owner-1/g1/a.png").await.unwrap();
        assert!(!data.is_empty());
    }
}
