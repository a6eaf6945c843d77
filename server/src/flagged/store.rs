//! Flagged URL storage (SQLite).
//!
//! URLs are keyed by their normalized form, so `https://www.x.com/` and
//! `x.com` are the same entry. The URL as first added is kept for display.
//! All functions are blocking; call them from `spawn_blocking`.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;

use super::normalize_url;
use crate::db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedUrl {
    pub url: String,
    pub normalized_url: String,
    pub added_at: String,
}

/// Add a URL. Returns false if its normalized form was already flagged.
pub fn add_url(db: &DbPool, url: &str) -> Result<bool, CatalogError> {
    let normalized = normalize_url(url);
    let conn = db.lock().map_err(|_| CatalogError::LockPoisoned)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO flagged_urls (normalized_url, url, added_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![normalized, url.trim(), Utc::now().to_rfc3339()],
    )?;
    if inserted > 0 {
        tracing::debug!(url = %url, normalized = %normalized, "Flagged URL added");
    }
    Ok(inserted > 0)
}

/// Remove a URL (matched by normalized form). Returns false if it was absent.
pub fn remove_url(db: &DbPool, url: &str) -> Result<bool, CatalogError> {
    let conn = db.lock().map_err(|_| CatalogError::LockPoisoned)?;
    let deleted = conn.execute(
        "DELETE FROM flagged_urls WHERE normalized_url = ?1",
        [normalize_url(url)],
    )?;
    Ok(deleted > 0)
}

/// All flagged URLs, oldest first.
pub fn list_urls(db: &DbPool) -> Result<Vec<FlaggedUrl>, CatalogError> {
    let conn = db.lock().map_err(|_| CatalogError::LockPoisoned)?;
    let mut stmt = conn.prepare(
        "SELECT url, normalized_url, added_at FROM flagged_urls ORDER BY added_at, normalized_url",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FlaggedUrl {
            url: row.get(0)?,
            normalized_url: row.get(1)?,
            added_at: row.get(2)?,
        })
    })?;
    let urls = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(urls)
}

/// The normalized forms of `urls` that are flagged.
pub fn matching<'a, I>(db: &DbPool, urls: I) -> Result<HashSet<String>, CatalogError>
where
    I: IntoIterator<Item = &'a str>,
{
    let conn = db.lock().map_err(|_| CatalogError::LockPoisoned)?;
    let mut stmt = conn.prepare_cached("SELECT 1 FROM flagged_urls WHERE normalized_url = ?1")?;
    let mut found = HashSet::new();
    for url in urls {
        let normalized = normalize_url(url);
        if found.contains(&normalized) {
            continue;
        }
        if stmt.exists([&normalized])? {
            let _ = found.insert(normalized);
        }
    }
    Ok(found)
}

/// Insert the configured URLs at startup. Returns how many were new.
pub fn seed(db: &DbPool, urls: &[String]) -> Result<usize, CatalogError> {
    let mut added = 0;
    for url in urls {
        if url.trim().is_empty() {
            continue;
        }
        if add_url(db, url)? {
            added += 1;
        }
    }
    Ok(added)
}
