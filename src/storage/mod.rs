mod local;

pub use local::LocalBlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, AppResult};

/// Headers a blob is served with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub size: u64,
}

/// Key-addressed object storage holding guitar originals and share derivatives.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, key: &str) -> AppResult<Bytes>;

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> AppResult<()>;

    /// Removes every key it can. Missing keys are not an error; any other
    /// failure is reported after all keys have been attempted.
    async fn delete_many(&self, keys: &[String]) -> AppResult<()>;

    async fn metadata(&self, key: &str) -> AppResult<Option<BlobMetadata>>;

    fn public_url(&self, key: &str) -> String;

    fn key_from_url(&self, url: &str) -> Option<String>;
}

pub fn validate_key(key: &str) -> AppResult<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment.starts_with('.'));

    if invalid {
        return Err(AppError::Storage(format!("Invalid blob key: {}", key)));
    }
    Ok(())
}

/// Recovers a storage key from a public URL, stripping the path of
/// `public_base_url` when the URL lives under it.
pub fn key_from_public_url(public_base_url: &str, url: &str) -> Option<String> {
    let key = match Url::parse(url) {
        Ok(parsed) => {
            let base_path = Url::parse(public_base_url)
                .map(|base| base.path().trim_matches('/').to_string())
                .unwrap_or_default();
            let path = parsed.path().trim_start_matches('/');

            if base_path.is_empty() {
                path.to_string()
            } else {
                path.strip_prefix(&format!("{}/", base_path))
                    .unwrap_or(path)
                    .to_string()
            }
        }
        Err(_) => url.trim_start_matches('/').to_string(),
    };

    validate_key(&key).ok().map(|_| key)
}
