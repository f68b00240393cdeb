use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SharingConfig;
use crate::constants::{MAX_SELECTED_IMAGES, SHARE_ID_LENGTH};
use crate::database::shares::{self, ShareChanges};
use crate::database::{get_connection, guitars, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{
    FieldOverrides, Guitar, GuitarSummary, PublicImage, PublicShareResponse, Share,
    ShareCreateRequest, ShareListItem, ShareListResponse, ShareResponse, ShareState,
    ShareUpdateRequest, SharedFields, ViewRequest,
};
use crate::processor::analytics::spawn_record_view;
use crate::processor::optimizer::ImageOptimizer;
use crate::processor::projector::project;
use crate::storage::BlobStore;

const SHARE_NOT_FOUND: &str = "Share not found";
const GUITAR_GONE: &str = "Guitar no longer exists";

/// Parses an owner-supplied image selection: an array of at most
/// `MAX_SELECTED_IMAGES` non-empty strings. The limit applies to the array as
/// sent; duplicates then collapse onto their first position.
pub fn parse_selected_image_ids(value: &Value) -> AppResult<Vec<String>> {
    let items = value.as_array().ok_or_else(|| {
        AppError::Validation("selectedImageIds must be an array of image ids".to_string())
    })?;

    if items.len() > MAX_SELECTED_IMAGES {
        return Err(AppError::Validation(format!(
            "At most {} images can be shared, got {}",
            MAX_SELECTED_IMAGES,
            items.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "selectedImageIds must contain only non-empty strings".to_string(),
                )
            })?;
        if seen.insert(id) {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}

pub fn validate_selection(selected: &[String], guitar: &Guitar) -> AppResult<()> {
    match selected.iter().find(|id| guitar.image(id).is_none()) {
        Some(unknown) => Err(AppError::Validation(format!(
            "Image {} does not belong to this guitar",
            unknown
        ))),
        None => Ok(()),
    }
}

pub fn parse_is_active(value: &Value) -> AppResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| AppError::Validation("isActive must be a boolean".to_string()))
}

/// True when the two selections differ as sets. Reordering alone is not a change.
pub fn selection_changed(current: &[String], requested: &[String]) -> bool {
    let current: HashSet<&String> = current.iter().collect();
    let requested: HashSet<&String> = requested.iter().collect();
    current.symmetric_difference(&requested).next().is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePlan {
    pub reprocess: bool,
    pub state: ShareState,
}

/// Decides what an update does to a share before anything is written.
pub fn plan_update(share: &Share, selection: Option<&[String]>, is_active: Option<bool>) -> UpdatePlan {
    let reprocess = selection
        .map(|requested| selection_changed(&share.selected_image_ids, requested))
        .unwrap_or(false);

    let state = if !is_active.unwrap_or(share.is_active) {
        ShareState::Inactive
    } else if reprocess {
        ShareState::Unprocessed
    } else {
        Share {
            is_active: true,
            ..share.clone()
        }
        .state()
    };

    UpdatePlan { reprocess, state }
}

/// Images a public viewer gets. Derivatives win; without any, the originals of
/// the selection are served unwatermarked unless that fallback is disabled, in
/// which case `None` hides the share.
pub fn select_display_images(
    share: &Share,
    guitar: &Guitar,
    fallback_to_originals: bool,
) -> Option<Vec<PublicImage>> {
    if !share.optimized_images.is_empty() {
        return Some(
            share
                .optimized_images
                .iter()
                .map(|image| PublicImage {
                    url: image.url.clone(),
                    width: Some(image.width),
                    height: Some(image.height),
                })
                .collect(),
        );
    }

    let originals: Vec<PublicImage> = share
        .selected_image_ids
        .iter()
        .filter_map(|id| guitar.image(id))
        .map(|image| PublicImage {
            url: image.url.clone(),
            width: None,
            height: None,
        })
        .collect();

    if originals.is_empty() || fallback_to_originals {
        Some(originals)
    } else {
        None
    }
}

fn generate_share_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SHARE_ID_LENGTH)
        .map(char::from)
        .collect()
}

pub struct ShareManager {
    pool: DbPool,
    blobs: Arc<dyn BlobStore>,
    optimizer: Arc<ImageOptimizer>,
    settings: SharingConfig,
}

impl ShareManager {
    pub fn new(
        pool: DbPool,
        blobs: Arc<dyn BlobStore>,
        optimizer: Arc<ImageOptimizer>,
        settings: SharingConfig,
    ) -> Self {
        Self {
            pool,
            blobs,
            optimizer,
            settings,
        }
    }

    fn respond(&self, share: Share) -> ShareResponse {
        ShareResponse {
            public_url: self.settings.share_url(&share.share_id),
            share,
        }
    }

    fn load_owned_share(&self, owner_id: &str, share_id: &str) -> AppResult<Share> {
        let conn = get_connection(&self.pool)?;
        shares::get_share(&conn, owner_id, share_id)?
            .ok_or_else(|| AppError::NotFound(SHARE_NOT_FOUND.to_string()))
    }

    fn load_guitar(&self, owner_id: &str, guitar_id: &str) -> AppResult<Option<Guitar>> {
        let conn = get_connection(&self.pool)?;
        guitars::get_guitar(&conn, owner_id, guitar_id)
    }

    fn apply_changes(&self, share: &Share, changes: &ShareChanges) -> AppResult<Share> {
        let conn = get_connection(&self.pool)?;
        shares::update_share(&conn, &share.owner_id, &share.share_id, changes, Utc::now())?
            .ok_or_else(|| AppError::NotFound(SHARE_NOT_FOUND.to_string()))
    }

    /// Runs the pipeline for the share's current selection and stores the result.
    async fn process_and_store(&self, share: Share, guitar: &Guitar) -> AppResult<Share> {
        let optimized = self
            .optimizer
            .process_images(&share.share_id, &share.selected_image_ids, guitar)
            .await;

        if optimized.is_empty() && share.optimized_images.is_empty() {
            return Ok(share);
        }

        self.apply_changes(
            &share,
            &ShareChanges {
                optimized_images: Some(optimized),
                ..Default::default()
            },
        )
    }

    async fn delete_blobs_best_effort(&self, share_id: &str, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        if let Err(e) = self.blobs.delete_many(&keys).await {
            warn!("Failed to clean up derivatives of share {}: {}", share_id, e);
        }
    }

    pub async fn create(&self, owner_id: &str, request: ShareCreateRequest) -> AppResult<ShareResponse> {
        let overrides = request
            .shared_fields
            .as_ref()
            .map(FieldOverrides::parse)
            .transpose()?
            .unwrap_or_default();
        let requested = request
            .selected_image_ids
            .as_ref()
            .map(parse_selected_image_ids)
            .transpose()?;

        let guitar = self
            .load_guitar(owner_id, &request.guitar_id)?
            .ok_or_else(|| AppError::Validation("Guitar not found".to_string()))?;

        let selected_image_ids = match requested {
            Some(ids) => {
                validate_selection(&ids, &guitar)?;
                ids
            }
            None => guitar
                .image_ids()
                .into_iter()
                .take(MAX_SELECTED_IMAGES)
                .collect(),
        };

        let now = Utc::now();
        let share = Share {
            share_id: generate_share_id(),
            owner_id: owner_id.to_string(),
            guitar_id: request.guitar_id,
            created_at: now,
            updated_at: now,
            is_active: true,
            shared_fields: SharedFields::default().with_overrides(&overrides),
            selected_image_ids,
            optimized_images: Vec::new(),
            view_count: 0,
            views: Vec::new(),
            last_viewed_at: None,
        };

        {
            let conn = get_connection(&self.pool)?;
            shares::insert_share(&conn, &share)?;
        }
        info!(
            "Created share {} for guitar {} with {} images",
            share.share_id,
            share.guitar_id,
            share.selected_image_ids.len()
        );

        // The share exists from here on; a failed derivative write leaves it unprocessed.
        let share = match self.process_and_store(share.clone(), &guitar).await {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Failed to store derivatives for share {}: {}", share.share_id, e);
                share
            }
        };
        Ok(self.respond(share))
    }

    pub async fn update(&self, owner_id: &str, request: ShareUpdateRequest) -> AppResult<ShareResponse> {
        let overrides = request
            .shared_fields
            .as_ref()
            .map(FieldOverrides::parse)
            .transpose()?;
        let requested = request
            .selected_image_ids
            .as_ref()
            .map(parse_selected_image_ids)
            .transpose()?;
        let is_active = request.is_active.as_ref().map(parse_is_active).transpose()?;

        let share = self.load_owned_share(owner_id, &request.share_id)?;
        // The guitar may have been deleted since the share was made.
        let guitar = self.load_guitar(owner_id, &share.guitar_id)?;

        if let Some(ref ids) = requested {
            match guitar {
                Some(ref guitar) => validate_selection(ids, guitar)?,
                None if selection_changed(&share.selected_image_ids, ids) => {
                    return Err(AppError::Validation(format!(
                        "{}; images cannot be changed",
                        GUITAR_GONE
                    )));
                }
                None => {}
            }
        }

        let plan = plan_update(&share, requested.as_deref(), is_active);
        let previous_keys: Vec<String> = share
            .optimized_images
            .iter()
            .map(|image| image.key.clone())
            .collect();

        let changes = ShareChanges {
            is_active,
            shared_fields: overrides.map(|o| share.shared_fields.with_overrides(&o)),
            selected_image_ids: requested,
            optimized_images: plan.reprocess.then(Vec::new),
        };
        if changes.is_empty() {
            return Ok(self.respond(share));
        }

        let mut updated = self.apply_changes(&share, &changes)?;
        info!("Updated share {} ({:?})", updated.share_id, plan.state);

        if plan.reprocess {
            if let Some(ref guitar) = guitar {
                updated = self.process_and_store(updated, guitar).await?;
            }
            let kept: HashSet<&String> = updated.optimized_images.iter().map(|i| &i.key).collect();
            let stale: Vec<String> = previous_keys
                .into_iter()
                .filter(|key| !kept.contains(key))
                .collect();
            self.delete_blobs_best_effort(&updated.share_id, stale).await;
        }

        Ok(self.respond(updated))
    }

    /// Re-runs the pipeline on the current selection, overwriting derivatives in place.
    pub async fn reprocess(&self, owner_id: &str, share_id: &str) -> AppResult<ShareResponse> {
        let share = self.load_owned_share(owner_id, share_id)?;
        let guitar = self
            .load_guitar(owner_id, &share.guitar_id)?
            .ok_or_else(|| AppError::Validation(GUITAR_GONE.to_string()))?;

        let share = self.process_and_store(share, &guitar).await?;
        Ok(self.respond(share))
    }

    pub async fn delete(&self, owner_id: &str, share_id: &str) -> AppResult<()> {
        let share = self.load_owned_share(owner_id, share_id)?;

        let mut keys = ImageOptimizer::derivative_keys(&share.share_id, &share.selected_image_ids);
        keys.extend(share.optimized_images.iter().map(|image| image.key.clone()));
        keys.sort();
        keys.dedup();
        self.delete_blobs_best_effort(&share.share_id, keys).await;

        let conn = get_connection(&self.pool)?;
        shares::delete_share(&conn, owner_id, share_id)?;
        info!("Deleted share {}", share_id);
        Ok(())
    }

    pub fn get(&self, owner_id: &str, share_id: &str) -> AppResult<ShareResponse> {
        let share = self.load_owned_share(owner_id, share_id)?;
        Ok(self.respond(share))
    }

    pub fn list(&self, owner_id: &str) -> AppResult<ShareListResponse> {
        let conn = get_connection(&self.pool)?;
        let owned = shares::list_shares_for_owner(&conn, owner_id)?;

        let mut summaries: HashMap<String, Option<GuitarSummary>> = HashMap::new();
        let mut items = Vec::with_capacity(owned.len());

        for share in owned {
            let summary = summaries
                .entry(share.guitar_id.clone())
                .or_insert_with(|| {
                    match guitars::get_guitar(&conn, owner_id, &share.guitar_id) {
                        Ok(guitar) => guitar.as_ref().map(GuitarSummary::from),
                        Err(e) => {
                            warn!("Failed to load guitar {}: {}", share.guitar_id, e);
                            None
                        }
                    }
                })
                .clone();

            items.push(ShareListItem {
                public_url: self.settings.share_url(&share.share_id),
                guitar: summary,
                share,
            });
        }

        Ok(ShareListResponse { shares: items })
    }

    /// The unauthenticated path. Missing and inactive shares look the same.
    pub fn get_public(&self, share_id: &str, request: ViewRequest) -> AppResult<PublicShareResponse> {
        let share = {
            let conn = get_connection(&self.pool)?;
            shares::find_shares_by_public_id(&conn, share_id)?
                .into_iter()
                .find(|share| share.is_active)
                .ok_or_else(|| AppError::NotFound(SHARE_NOT_FOUND.to_string()))?
        };

        let guitar = self
            .load_guitar(&share.owner_id, &share.guitar_id)?
            .ok_or_else(|| AppError::Gone(GUITAR_GONE.to_string()))?;

        let images = select_display_images(&share, &guitar, self.settings.fallback_to_originals)
            .ok_or_else(|| AppError::NotFound(SHARE_NOT_FOUND.to_string()))?;

        let response = PublicShareResponse {
            guitar: project(&guitar, &share.shared_fields),
            images,
            created_at: share.created_at,
        };

        spawn_record_view(
            self.pool.clone(),
            share,
            request,
            self.settings.max_view_entries,
        );

        Ok(response)
    }
}
