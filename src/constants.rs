use once_cell::sync::Lazy;
use std::path::PathBuf;

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("GUITAR_SHARE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/data"))
});

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("config.yaml"));
pub static DATABASE_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("database.sqlite"));
pub static BLOBS_DIR: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("blobs"));

/// Upper bound on images a single share may expose.
pub const MAX_SELECTED_IMAGES: usize = 10;
pub const DEFAULT_MAX_VIEW_ENTRIES: usize = 100;
pub const SHARE_ID_LENGTH: usize = 22;

pub const DEFAULT_OPTIMIZED_MAX_WIDTH: u32 = 1600;
pub const DEFAULT_OPTIMIZED_QUALITY: u8 = 82;
pub const DEFAULT_WATERMARK_WIDTH_RATIO: f32 = 0.18;
pub const DEFAULT_WATERMARK_MIN_WIDTH: u32 = 60;
pub const DEFAULT_WATERMARK_MAX_WIDTH: u32 = 400;
pub const DEFAULT_WATERMARK_PADDING: u32 = 24;

pub const OPTIMIZED_CONTENT_TYPE: &str = "image/jpeg";
pub const OPTIMIZED_EXTENSION: &str = "jpg";
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Prefix under which every per-share derivative is stored.
pub const SHARE_BLOB_PREFIX: &str = "shares";
