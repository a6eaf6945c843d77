//! Per-user browser tab state.
//!
//! `store` owns the in-memory user → tab-id → URL map, `service` is the
//! query/command façade used by HTTP handlers and the WebSocket actor,
//! `routes` exposes the façade over HTTP.

pub mod routes;
pub mod service;
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Identifies a browser tab within one user's session. Not globally unique.
pub type TabId = String;

/// All open tabs of one user: tab id → URL.
/// Ordered so that serialized snapshots are deterministic.
pub type UserTabSet = BTreeMap<TabId, String>;

/// A single open tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub tab_id: TabId,
    pub url: String,
}

impl TabRecord {
    pub fn new(tab_id: impl Into<TabId>, url: impl Into<String>) -> Self {
        Self {
            tab_id: tab_id.into(),
            url: url.into(),
        }
    }
}

/// Flatten a tab set into records, ordered by tab id.
pub fn records(tabs: &UserTabSet) -> Vec<TabRecord> {
    tabs.iter()
        .map(|(tab_id, url)| TabRecord::new(tab_id.clone(), url.clone()))
        .collect()
}

/// Browsers report tab ids as integers while older clients send strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTabId {
    Text(String),
    Integer(i64),
}

/// Accept a tab id given either as a JSON string or a JSON integer.
pub fn deserialize_tab_id<'de, D>(deserializer: D) -> Result<TabId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawTabId::deserialize(deserializer)? {
        RawTabId::Text(s) => s,
        RawTabId::Integer(n) => n.to_string(),
    })
}

/// Optional variant of [`deserialize_tab_id`] for request bodies.
pub fn deserialize_opt_tab_id<'de, D>(deserializer: D) -> Result<Option<TabId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawTabId>::deserialize(deserializer)?.map(|raw| match raw {
        RawTabId::Text(s) => s,
        RawTabId::Integer(n) => n.to_string(),
    }))
}
