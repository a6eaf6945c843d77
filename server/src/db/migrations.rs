use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: flagged URL catalog

CREATE TABLE flagged_urls (
    normalized_url TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    added_at TEXT NOT NULL
);
",
    )])
}
