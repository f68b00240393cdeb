use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{key_from_public_url, validate_key, BlobMetadata, BlobStore};
use crate::error::{AppError, AppResult};

const METADATA_DIR: &str = ".meta";

/// Filesystem blob store. Headers for each blob live in a JSON file under
/// `.meta/`, mirroring the key layout.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn blob_path(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn metadata_path(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(METADATA_DIR).join(format!("{}.json", key)))
    }

    async fn remove_if_present(path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn download(&self, key: &str) -> AppResult<Bytes> {
        let path = self.blob_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", key))
            } else {
                AppError::Storage(format!("Failed to read blob {}: {}", key, e))
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> AppResult<()> {
        let path = self.blob_path(key)?;
        let metadata_path = self.metadata_path(key)?;

        for parent in [path.parent(), metadata_path.parent()].into_iter().flatten() {
            fs::create_dir_all(parent).await?;
        }

        let metadata = BlobMetadata {
            content_type: content_type.to_string(),
            cache_control: Some(cache_control.to_string()),
            size: data.len() as u64,
        };

        fs::write(&path, &data).await?;
        fs::write(&metadata_path, serde_json::to_vec(&metadata)?).await?;

        tracing::debug!("Stored blob {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        let mut failures = Vec::new();

        for key in keys {
            let result = async {
                Self::remove_if_present(&self.blob_path(key)?).await?;
                Self::remove_if_present(&self.metadata_path(key)?).await?;
                Ok::<(), AppError>(())
            }
            .await;

            if let Err(e) = result {
                failures.push(format!("{}: {}", key, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Storage(format!(
                "Failed to delete {} of {} blobs: {}",
                failures.len(),
                keys.len(),
                failures.join("; ")
            )))
        }
    }

    async fn metadata(&self, key: &str) -> AppResult<Option<BlobMetadata>> {
        let path = self.blob_path(key)?;
        let size = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored = match fs::read(self.metadata_path(key)?).await {
            Ok(raw) => serde_json::from_slice::<BlobMetadata>(&raw).ok(),
            Err(_) => None,
        };

        Ok(Some(match stored {
            Some(metadata) => BlobMetadata { size, ..metadata },
            None => BlobMetadata {
                content_type: mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .to_string(),
                cache_control: None,
                size,
            },
        }))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key_from_public_url(&self.public_base_url, url)
    }
}
