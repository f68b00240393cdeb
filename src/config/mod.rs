use crate::constants::{
    DEFAULT_MAX_VIEW_ENTRIES, DEFAULT_OPTIMIZED_MAX_WIDTH, DEFAULT_OPTIMIZED_QUALITY,
    DEFAULT_WATERMARK_MAX_WIDTH, DEFAULT_WATERMARK_MIN_WIDTH, DEFAULT_WATERMARK_PADDING,
    DEFAULT_WATERMARK_WIDTH_RATIO,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,
}

fn default_secret_key() -> String {
    "change-me-in-production-use-openssl-rand-hex-32".to_string()
}

fn default_access_token_expire_minutes() -> i64 {
    30
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            access_token_expire_minutes: default_access_token_expire_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL under which blobs are publicly reachable.
    #[serde(default = "default_blob_base_url")]
    pub public_base_url: String,
}

fn default_blob_base_url() -> String {
    "http://localhost:8000/api/v1/blobs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_blob_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Frontend origin used to build the public share link handed to owners.
    #[serde(default = "default_share_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_max_view_entries")]
    pub max_view_entries: usize,
    #[serde(default = "default_fallback_to_originals")]
    pub fallback_to_originals: bool,
    #[serde(default = "default_processing_concurrency")]
    pub processing_concurrency: usize,
}

fn default_share_base_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_max_view_entries() -> usize {
    DEFAULT_MAX_VIEW_ENTRIES
}

fn default_fallback_to_originals() -> bool {
    true
}

fn default_processing_concurrency() -> usize {
    num_cpus::get()
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_share_base_url(),
            max_view_entries: default_max_view_entries(),
            fallback_to_originals: default_fallback_to_originals(),
            processing_concurrency: default_processing_concurrency(),
        }
    }
}

impl SharingConfig {
    pub fn share_url(&self, share_id: &str) -> String {
        format!(
            "{}/share/{}",
            self.public_base_url.trim_end_matches('/'),
            share_id
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,
    #[serde(default = "default_watermark_width_ratio")]
    pub watermark_width_ratio: f32,
    #[serde(default = "default_watermark_min_width")]
    pub watermark_min_width: u32,
    #[serde(default = "default_watermark_max_width")]
    pub watermark_max_width: u32,
    #[serde(default = "default_watermark_padding")]
    pub watermark_padding: u32,
}

fn default_max_width() -> u32 {
    DEFAULT_OPTIMIZED_MAX_WIDTH
}

fn default_quality() -> u8 {
    DEFAULT_OPTIMIZED_QUALITY
}

fn default_watermark_width_ratio() -> f32 {
    DEFAULT_WATERMARK_WIDTH_RATIO
}

fn default_watermark_min_width() -> u32 {
    DEFAULT_WATERMARK_MIN_WIDTH
}

fn default_watermark_max_width() -> u32 {
    DEFAULT_WATERMARK_MAX_WIDTH
}

fn default_watermark_padding() -> u32 {
    DEFAULT_WATERMARK_PADDING
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            quality: default_quality(),
            watermark_path: None,
            watermark_width_ratio: default_watermark_width_ratio(),
            watermark_min_width: default_watermark_min_width(),
            watermark_max_width: default_watermark_max_width(),
            watermark_padding: default_watermark_padding(),
        }
    }
}

impl OptimizerConfig {
    /// Height ceiling keeps derivatives at most twice as tall as they are wide.
    pub fn max_height(&self) -> u32 {
        self.max_width.saturating_mul(2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sharing: SharingConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

pub fn load_config(config_path: &Path) -> Config {
    if !config_path.exists() {
        return Config::default();
    }

    match fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration at {:?}, using defaults: {}", config_path, e);
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_default_config(config_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(config_path, yaml)
}
