use bytes::Bytes;
use futures::stream::{self, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::OptimizerConfig;
use crate::constants::{
    IMMUTABLE_CACHE_CONTROL, OPTIMIZED_CONTENT_TYPE, OPTIMIZED_EXTENSION, SHARE_BLOB_PREFIX,
};
use crate::error::{AppError, AppResult};
use crate::models::{Guitar, GuitarImage, OptimizedImage};
use crate::storage::BlobStore;

/// The brand mark stamped onto every public derivative.
pub struct Watermark {
    mark: RgbaImage,
}

impl Watermark {
    pub fn load(path: &Path) -> AppResult<Self> {
        let mark = image::open(path)?.to_rgba8();
        if mark.width() == 0 || mark.height() == 0 {
            return Err(AppError::Validation(format!(
                "Watermark {:?} has no pixels",
                path
            )));
        }
        Ok(Self { mark })
    }

    /// A plain six-string motif used when no mark file is configured.
    pub fn builtin() -> Self {
        let mut mark = RgbaImage::from_pixel(320, 80, Rgba([0, 0, 0, 96]));
        let stroke = Rgba([255, 255, 255, 220]);

        for string in 0..6u32 {
            let top = 12 + string * 11;
            for y in top..top + 3 {
                for x in 16..304 {
                    mark.put_pixel(x, y, stroke);
                }
            }
        }
        for y in 8..72 {
            for x in 16..22 {
                mark.put_pixel(x, y, stroke);
            }
        }

        Self { mark }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        match config.watermark_path {
            Some(ref path) => match Self::load(path) {
                Ok(watermark) => {
                    info!("Loaded watermark from {:?}", path);
                    watermark
                }
                Err(e) => {
                    warn!("Failed to load watermark {:?}, using built-in mark: {}", path, e);
                    Self::builtin()
                }
            },
            None => Self::builtin(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mark.dimensions()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPlacement {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

pub struct RenderedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Scales `(width, height)` down to fit inside the bounds. Never upscales.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled = |value: u32| ((value as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Mark width is a fixed share of the image width, clamped to absolute
/// bounds; height follows the mark's own aspect ratio. Anchored bottom-right.
pub fn watermark_placement(
    image_width: u32,
    image_height: u32,
    mark_width: u32,
    mark_height: u32,
    settings: &OptimizerConfig,
) -> WatermarkPlacement {
    let min_width = settings.watermark_min_width;
    let max_width = settings.watermark_max_width.max(min_width);
    let target = (image_width as f32 * settings.watermark_width_ratio).round() as u32;
    let width = target.clamp(min_width, max_width).max(1);
    let height = ((width as f64 * mark_height as f64 / mark_width.max(1) as f64).round() as u32).max(1);

    let padding = settings.watermark_padding as i64;
    WatermarkPlacement {
        width,
        height,
        x: image_width as i64 - width as i64 - padding,
        y: image_height as i64 - height as i64 - padding,
    }
}

/// Resize, watermark and re-encode one original. Pure CPU work.
pub fn render_derivative(
    original: &[u8],
    watermark: &Watermark,
    settings: &OptimizerConfig,
) -> AppResult<RenderedImage> {
    let source = image::load_from_memory(original)?;
    let (width, height) = fit_within(
        source.width(),
        source.height(),
        settings.max_width,
        settings.max_height(),
    );

    let resized = if (width, height) == (source.width(), source.height()) {
        source
    } else {
        source.resize_exact(width, height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel, so transparent originals are flattened onto white.
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &resized.to_rgba8(), 0, 0);

    let (mark_width, mark_height) = watermark.dimensions();
    let placement = watermark_placement(width, height, mark_width, mark_height, settings);
    let mark = imageops::resize(
        &watermark.mark,
        placement.width,
        placement.height,
        FilterType::Lanczos3,
    );
    imageops::overlay(&mut canvas, &mark, placement.x, placement.y);

    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut data = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut data, settings.quality))?;

    Ok(RenderedImage {
        data,
        width,
        height,
    })
}

pub struct ImageOptimizer {
    blobs: Arc<dyn BlobStore>,
    watermark: Arc<Watermark>,
    settings: OptimizerConfig,
    concurrency: usize,
}

impl ImageOptimizer {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        watermark: Arc<Watermark>,
        settings: OptimizerConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            blobs,
            watermark,
            settings,
            concurrency: concurrency.max(1),
        }
    }

    /// Ids made of `[A-Za-z0-9_-]` are used as is. Any other id is sanitized and
    /// suffixed with the hex of its raw bytes; the `.` separator keeps those
    /// names disjoint from the plain ones.
    pub fn derivative_key(share_id: &str, image_id: &str) -> String {
        let is_plain = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        let safe_id = if image_id.chars().all(is_plain) {
            image_id.to_string()
        } else {
            let sanitized: String = image_id
                .chars()
                .map(|c| if is_plain(c) { c } else { '_' })
                .collect();
            let hex: String = image_id.bytes().map(|b| format!("{:02x}", b)).collect();
            format!("{}.{}", sanitized, hex)
        };
        format!(
            "{}/{}/{}.{}",
            SHARE_BLOB_PREFIX, share_id, safe_id, OPTIMIZED_EXTENSION
        )
    }

    /// Every key a derivative of these images could live under.
    pub fn derivative_keys<'a>(
        share_id: &str,
        image_ids: impl IntoIterator<Item = &'a String>,
    ) -> Vec<String> {
        let mut keys: Vec<String> = image_ids
            .into_iter()
            .map(|image_id| Self::derivative_key(share_id, image_id))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Processes the selected images that still exist on the guitar. Output
    /// follows selection order; failed images are logged and left out.
    pub async fn process_images(
        &self,
        share_id: &str,
        selected_image_ids: &[String],
        guitar: &Guitar,
    ) -> Vec<OptimizedImage> {
        let images: Vec<GuitarImage> = selected_image_ids
            .iter()
            .filter_map(|image_id| guitar.image(image_id).cloned())
            .collect();
        let requested = images.len();

        let optimized: Vec<OptimizedImage> = stream::iter(images)
            .map(|image| async move {
                let result = self.process_single(&image, share_id).await;
                (image, result)
            })
            .buffered(self.concurrency)
            .filter_map(|(image, result)| async move {
                match result {
                    Ok(optimized) => Some(optimized),
                    Err(e) => {
                        warn!(
                            "Failed to process image {} for share {}: {}",
                            image.id, share_id, e
                        );
                        None
                    }
                }
            })
            .collect()
            .await;

        info!(
            "Processed {}/{} images for share {}",
            optimized.len(),
            requested,
            share_id
        );
        optimized
    }

    pub async fn process_single(
        &self,
        image: &GuitarImage,
        share_id: &str,
    ) -> AppResult<OptimizedImage> {
        let source_key = self.blobs.key_from_url(&image.url).ok_or_else(|| {
            AppError::Storage(format!("Cannot derive a storage key from {}", image.url))
        })?;
        let original = self.blobs.download(&source_key).await?;

        let watermark = Arc::clone(&self.watermark);
        let settings = self.settings.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            render_derivative(&original, &watermark, &settings)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))??;

        let key = Self::derivative_key(share_id, &image.id);
        self.blobs
            .upload(
                &key,
                Bytes::from(rendered.data),
                OPTIMIZED_CONTENT_TYPE,
                IMMUTABLE_CACHE_CONTROL,
            )
            .await?;

        Ok(OptimizedImage {
            image_id: image.id.clone(),
            url: self.blobs.public_url(&key),
            key,
            width: rendered.width,
            height: rendered.height,
        })
    }
}
