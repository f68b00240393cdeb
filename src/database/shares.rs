use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Row, ToSql};
use serde::de::DeserializeOwned;

use crate::database::{execute_query, fetch_all, fetch_one, queries, DbConn};
use crate::error::AppResult;
use crate::models::{OptimizedImage, Share, SharedFields, ViewEntry};

/// Partial update of owner-controlled share fields. `None` leaves a column as is.
#[derive(Debug, Clone, Default)]
pub struct ShareChanges {
    pub is_active: Option<bool>,
    pub shared_fields: Option<SharedFields>,
    pub selected_image_ids: Option<Vec<String>>,
    pub optimized_images: Option<Vec<OptimizedImage>>,
}

impl ShareChanges {
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none()
            && self.shared_fields.is_none()
            && self.selected_image_ids.is_none()
            && self.optimized_images.is_none()
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw, idx)
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_timestamp(&value, idx)).transpose()
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_share_row(row: &Row<'_>) -> rusqlite::Result<Share> {
    Ok(Share {
        share_id: row.get(0)?,
        owner_id: row.get(1)?,
        guitar_id: row.get(2)?,
        is_active: row.get::<_, i32>(3)? != 0,
        shared_fields: json_column(row, 4)?,
        selected_image_ids: json_column(row, 5)?,
        optimized_images: json_column(row, 6)?,
        view_count: row.get(7)?,
        views: json_column(row, 8)?,
        last_viewed_at: optional_timestamp_column(row, 9)?,
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}

pub fn get_share(conn: &DbConn, owner_id: &str, share_id: &str) -> AppResult<Option<Share>> {
    let sql = format!("{} {}", queries::shares::SELECT_COLUMNS, queries::shares::WHERE_KEY);
    fetch_one(conn, &sql, &[&owner_id, &share_id], map_share_row)
}

/// Secondary lookup by the public-facing id, without knowing the owner.
pub fn find_shares_by_public_id(conn: &DbConn, share_id: &str) -> AppResult<Vec<Share>> {
    let sql = format!(
        "{} {}",
        queries::shares::SELECT_COLUMNS,
        queries::shares::WHERE_PUBLIC_ID
    );
    fetch_all(conn, &sql, &[&share_id], map_share_row)
}

pub fn list_shares_for_owner(conn: &DbConn, owner_id: &str) -> AppResult<Vec<Share>> {
    let sql = format!("{} {}", queries::shares::SELECT_COLUMNS, queries::shares::WHERE_OWNER);
    fetch_all(conn, &sql, &[&owner_id], map_share_row)
}

pub fn insert_share(conn: &DbConn, share: &Share) -> AppResult<()> {
    let shared_fields = serde_json::to_string(&share.shared_fields)?;
    let selected = serde_json::to_string(&share.selected_image_ids)?;
    let optimized = serde_json::to_string(&share.optimized_images)?;
    let views = serde_json::to_string(&share.views)?;
    let last_viewed_at = share.last_viewed_at.map(|dt| dt.to_rfc3339());

    execute_query(
        conn,
        queries::shares::INSERT,
        &[
            &share.share_id,
            &share.owner_id,
            &share.guitar_id,
            &share.is_active,
            &shared_fields,
            &selected,
            &optimized,
            &share.view_count,
            &views,
            &last_viewed_at,
            &share.created_at.to_rfc3339(),
            &share.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Applies `changes` column by column and returns the stored record afterwards.
pub fn update_share(
    conn: &DbConn,
    owner_id: &str,
    share_id: &str,
    changes: &ShareChanges,
    updated_at: DateTime<Utc>,
) -> AppResult<Option<Share>> {
    let mut assignments: Vec<&str> = vec!["updated_at = ?"];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(updated_at.to_rfc3339())];

    if let Some(is_active) = changes.is_active {
        assignments.push("is_active = ?");
        values.push(Box::new(is_active));
    }
    if let Some(ref shared_fields) = changes.shared_fields {
        assignments.push("shared_fields = ?");
        values.push(Box::new(serde_json::to_string(shared_fields)?));
    }
    if let Some(ref selected) = changes.selected_image_ids {
        assignments.push("selected_image_ids = ?");
        values.push(Box::new(serde_json::to_string(selected)?));
    }
    if let Some(ref optimized) = changes.optimized_images {
        assignments.push("optimized_images = ?");
        values.push(Box::new(serde_json::to_string(optimized)?));
    }

    values.push(Box::new(owner_id.to_string()));
    values.push(Box::new(share_id.to_string()));

    let sql = format!(
        "UPDATE shares SET {} {}",
        assignments.join(", "),
        queries::shares::WHERE_KEY
    );
    let params: Vec<&dyn ToSql> = values.iter().map(|value| value.as_ref()).collect();
    execute_query(conn, &sql, &params)?;

    get_share(conn, owner_id, share_id)
}

pub fn increment_view_count(conn: &DbConn, owner_id: &str, share_id: &str) -> AppResult<()> {
    execute_query(
        conn,
        queries::shares::INCREMENT_VIEW_COUNT,
        &[&owner_id, &share_id],
    )?;
    Ok(())
}

/// Overwrites the view window. Callers compute it from a previously read copy,
/// so concurrent writers may drop each other's entries.
pub fn store_views(
    conn: &DbConn,
    owner_id: &str,
    share_id: &str,
    views: &[ViewEntry],
    last_viewed_at: DateTime<Utc>,
) -> AppResult<()> {
    let views = serde_json::to_string(views)?;
    execute_query(
        conn,
        queries::shares::UPDATE_VIEWS,
        &[&views, &last_viewed_at.to_rfc3339(), &owner_id, &share_id],
    )?;
    Ok(())
}

pub fn delete_share(conn: &DbConn, owner_id: &str, share_id: &str) -> AppResult<bool> {
    let deleted = execute_query(conn, queries::shares::DELETE, &[&owner_id, &share_id])?;
    Ok(deleted > 0)
}
