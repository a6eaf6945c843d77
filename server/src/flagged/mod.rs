//! Catalog of flagged URLs.
//!
//! A tab is "live" when its normalized URL is in this catalog. Only the
//! live-tab HTTP endpoints consult it; the core tab state never does.

pub mod normalize;
pub mod routes;
pub mod store;

pub use normalize::normalize_url;
