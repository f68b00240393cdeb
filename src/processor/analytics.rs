use chrono::Utc;
use tracing::{debug, warn};

use crate::database::{get_connection, shares, DbPool};
use crate::error::AppResult;
use crate::models::{Share, ViewEntry, ViewRequest};

/// Ordered substring checks; the first hit names the family. Order matters
/// because most user agents claim to be several browsers at once.
const BROWSER_FAMILIES: &[(&[&str], &str)] = &[
    (&["Edg/", "Edge/", "EdgA/", "EdgiOS/"], "Edge"),
    (&["OPR/", "Opera"], "Opera"),
    (&["SamsungBrowser"], "Samsung Internet"),
    (&["Firefox/", "FxiOS/"], "Firefox"),
    (&["Chrome/", "CriOS/", "Chromium/"], "Chrome"),
    (&["Safari/"], "Safari"),
];

pub const OTHER_BROWSER: &str = "Other";

pub fn classify_browser(user_agent: Option<&str>) -> &'static str {
    let Some(user_agent) = user_agent else {
        return OTHER_BROWSER;
    };

    BROWSER_FAMILIES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| user_agent.contains(needle)))
        .map(|(_, family)| *family)
        .unwrap_or(OTHER_BROWSER)
}

/// Two-letter country code from edge metadata. Unknown and Tor markers are dropped.
pub fn coarse_country(raw: Option<&str>) -> Option<String> {
    let code = raw?.trim().to_ascii_uppercase();
    let is_code = code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic());
    if !is_code || code == "XX" || code == "T1" {
        return None;
    }
    Some(code)
}

pub fn view_entry(request: &ViewRequest) -> ViewEntry {
    ViewEntry {
        viewed_at: Utc::now(),
        referrer: request
            .referrer
            .as_deref()
            .map(str::trim)
            .filter(|referrer| !referrer.is_empty())
            .map(str::to_string),
        country: coarse_country(request.country.as_deref()),
        browser: classify_browser(request.user_agent.as_deref()).to_string(),
    }
}

/// Appends `entry`, evicting the oldest entries so at most `max` remain.
pub fn append_view(views: &mut Vec<ViewEntry>, entry: ViewEntry, max: usize) {
    if max == 0 {
        views.clear();
        return;
    }
    if views.len() >= max {
        let excess = views.len() + 1 - max;
        views.drain(..excess);
    }
    views.push(entry);
}

/// Records one public view of `share`.
///
/// The counter is bumped in its own statement so it advances even if the
/// window write fails. The window itself is rebuilt from the copy of the share
/// the caller loaded, so overlapping views can overwrite each other's entries.
pub fn record_view(
    pool: &DbPool,
    share: &Share,
    request: &ViewRequest,
    max_entries: usize,
) -> AppResult<()> {
    let conn = get_connection(pool)?;
    shares::increment_view_count(&conn, &share.owner_id, &share.share_id)?;

    let entry = view_entry(request);
    let viewed_at = entry.viewed_at;
    let mut views = share.views.clone();
    append_view(&mut views, entry, max_entries);

    shares::store_views(&conn, &share.owner_id, &share.share_id, &views, viewed_at)?;
    debug!("Recorded view of share {}", share.share_id);
    Ok(())
}

/// Fire-and-forget wrapper for the public path. Never reports back.
pub fn spawn_record_view(pool: DbPool, share: Share, request: ViewRequest, max_entries: usize) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = record_view(&pool, &share, &request, max_entries) {
            warn!("Failed to record view for share {}: {}", share.share_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::shares::{get_share, insert_share};
    use crate::test_utils::{create_test_db, sample_share};
    use chrono::Duration;

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15";
    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const OPERA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 OPR/105.0.0.0";

    fn entry(seconds: i64) -> ViewEntry {
        ViewEntry {
            viewed_at: Utc::now() + Duration::seconds(seconds),
            referrer: None,
            country: None,
            browser: OTHER_BROWSER.to_string(),
        }
    }

    #[test]
    fn test_classify_browser_first_match_wins() {
        assert_eq!(classify_browser(Some(EDGE)), "Edge");
        assert_eq!(classify_browser(Some(OPERA)), "Opera");
        assert_eq!(classify_browser(Some(CHROME)), "Chrome");
        assert_eq!(classify_browser(Some(SAFARI)), "Safari");
        assert_eq!(classify_browser(Some(FIREFOX)), "Firefox");
        assert_eq!(classify_browser(Some("curl/8.4.0")), OTHER_BROWSER);
        assert_eq!(classify_browser(None), OTHER_BROWSER);
    }

    #[test]
    fn test_view_entry_never_keeps_raw_user_agent() {
        let request = ViewRequest {
            referrer: Some("https://forum.example.com/thread/1".to_string()),
            country: Some("us".to_string()),
            user_agent: Some(FIREFOX.to_string()),
        };
        let entry = view_entry(&request);

        assert_eq!(entry.browser, "Firefox");
        assert_eq!(entry.country.as_deref(), Some("US"));
        assert_eq!(
            entry.referrer.as_deref(),
            Some("https://forum.example.com/thread/1")
        );
        let serialized = serde_json::to_string(&entry).unwrap();
        assert!(!serialized.contains("Gecko"));
    }

    #[test]
    fn test_coarse_country_drops_unknown_markers() {
        assert_eq!(coarse_country(Some("XX")), None);
        assert_eq!(coarse_country(Some("T1")), None);
        assert_eq!(coarse_country(Some("Germany")), None);
        assert_eq!(coarse_country(None), None);
        assert_eq!(coarse_country(Some(" gb ")), Some("GB".to_string()));
    }

    #[test]
    fn test_append_view_at_cap_evicts_oldest() {
        let mut views: Vec<ViewEntry> = (0..5).map(entry).collect();
        let oldest_survivor = views[1].clone();
        let newest = entry(100);

        append_view(&mut views, newest.clone(), 5);

        assert_eq!(views.len(), 5);
        assert_eq!(views[0], oldest_survivor);
        assert_eq!(views.last(), Some(&newest));
    }

    #[test]
    fn test_append_view_never_exceeds_cap() {
        let mut views = Vec::new();
        for i in 0..25 {
            append_view(&mut views, entry(i), 10);
            assert!(views.len() <= 10);
        }
        assert_eq!(views.len(), 10);
        assert_eq!(views.last().unwrap().viewed_at, views.iter().map(|v| v.viewed_at).max().unwrap());
    }

    #[test]
    fn test_append_view_shrinks_oversized_window() {
        let mut views: Vec<ViewEntry> = (0..8).map(entry).collect();
        append_view(&mut views, entry(50), 3);
        assert_eq!(views.len(), 3);
    }

    #[test]
    fn test_record_view_updates_counter_window_and_timestamp() {
        let pool = create_test_db();
        let mut share = sample_share("owner-1", "share-1", "guitar-1");
        share.views = (0..3).map(entry).collect();
        share.view_count = 3;
        insert_share(&pool.get().unwrap(), &share).unwrap();

        let request = ViewRequest {
            user_agent: Some(SAFARI.to_string()),
            ..Default::default()
        };
        record_view(&pool, &share, &request, 3).unwrap();

        let conn = pool.get().unwrap();
        let stored = get_share(&conn, "owner-1", "share-1").unwrap().unwrap();
        assert_eq!(stored.view_count, 4);
        assert_eq!(stored.views.len(), 3);
        assert_eq!(stored.views.last().unwrap().browser, "Safari");
        assert_eq!(stored.last_viewed_at, Some(stored.views.last().unwrap().viewed_at));
    }

    #[test]
    fn test_stale_copies_lose_entries_but_not_counts() {
        let pool = create_test_db();
        let share = sample_share("owner-1", "share-1", "guitar-1");
        insert_share(&pool.get().unwrap(), &share).unwrap();

        // Two overlapping viewers both loaded the share before either wrote.
        record_view(&pool, &share, &ViewRequest::default(), 10).unwrap();
        record_view(&pool, &share, &ViewRequest::default(), 10).unwrap();

        let conn = pool.get().unwrap();
        let stored = get_share(&conn, "owner-1", "share-1").unwrap().unwrap();
        assert_eq!(stored.view_count, 2);
        assert_eq!(stored.views.len(), 1);
    }
}
