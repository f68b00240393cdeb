use crate::database::{fetch_one, queries, DbConn};
use crate::error::AppResult;
use crate::models::Guitar;

/// Loads a guitar through its owner-scoped key. Guitars belonging to someone
/// else are indistinguishable from missing ones.
pub fn get_guitar(conn: &DbConn, owner_id: &str, guitar_id: &str) -> AppResult<Option<Guitar>> {
    let data: Option<String> = fetch_one(
        conn,
        queries::guitars::SELECT_BY_KEY,
        &[&owner_id, &guitar_id],
        |row| row.get(0),
    )?;

    match data {
        Some(json) => {
            let mut guitar: Guitar = serde_json::from_str(&json)?;
            if guitar.id.is_empty() {
                guitar.id = guitar_id.to_string();
            }
            Ok(Some(guitar))
        }
        None => Ok(None),
    }
}
