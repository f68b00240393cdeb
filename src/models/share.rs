use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{GuitarSummary, SharedFields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedImage {
    pub image_id: String,
    pub key: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub viewed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub browser: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub share_id: String,
    #[serde(skip_serializing)]
    pub owner_id: String,
    pub guitar_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub shared_fields: SharedFields,
    pub selected_image_ids: Vec<String>,
    pub optimized_images: Vec<OptimizedImage>,
    pub view_count: i64,
    pub views: Vec<ViewEntry>,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// Lifecycle position of a share. Only `is_active` is persisted; the rest is
/// derived from whether derivatives exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareState {
    Processed,
    Unprocessed,
    Inactive,
}

impl Share {
    pub fn state(&self) -> ShareState {
        if !self.is_active {
            ShareState::Inactive
        } else if self.optimized_images.len() < self.selected_image_ids.len() {
            ShareState::Unprocessed
        } else {
            ShareState::Processed
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCreateRequest {
    pub guitar_id: String,
    pub shared_fields: Option<Value>,
    pub selected_image_ids: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareUpdateRequest {
    pub share_id: String,
    pub shared_fields: Option<Value>,
    pub selected_image_ids: Option<Value>,
    pub is_active: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareIdRequest {
    pub share_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    #[serde(flatten)]
    pub share: Share,
    pub public_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListItem {
    #[serde(flatten)]
    pub share: Share,
    pub public_url: String,
    pub guitar: Option<GuitarSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListResponse {
    pub shares: Vec<ShareListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Everything an anonymous viewer receives for a share.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicShareResponse {
    pub guitar: Map<String, Value>,
    pub images: Vec<PublicImage>,
    pub created_at: DateTime<Utc>,
}

/// Request metadata the analytics recorder is allowed to look at.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub user_agent: Option<String>,
}
