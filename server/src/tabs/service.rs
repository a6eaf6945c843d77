//! Query/command façade over the tab store and the broadcast pipeline.
//!
//! This is the only entry point HTTP handlers use, and the one the WebSocket
//! actor applies client events through. Every operation is synchronous: it
//! returns after the in-memory mutation and the best-effort sends are done.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::store::TabStateStore;
use super::{records, TabRecord, UserTabSet};
use crate::flagged::normalize_url;
use crate::ws::broadcast::{Broadcaster, CloseTarget};
use crate::ws::protocol::ClientEvent;
use crate::ws::{Connection, ConnectionRegistry};

/// Result of closing a single tab (or every tab showing one URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
    /// Tabs removed from the server-side state.
    pub closed: Vec<TabRecord>,
    /// Connections the close directive was queued to.
    pub notified: usize,
}

/// Result of closing a batch of tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseAllOutcome {
    pub closed: Vec<TabRecord>,
    /// Directives queued, summed over connections.
    pub directives: usize,
}

#[derive(Clone)]
pub struct TabService {
    tabs: Arc<TabStateStore>,
    connections: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
}

impl Default for TabService {
    fn default() -> Self {
        Self::new()
    }
}

impl TabService {
    pub fn new() -> Self {
        let tabs = Arc::new(TabStateStore::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(tabs.clone(), connections.clone());
        Self {
            tabs,
            connections,
            broadcaster,
        }
    }

    pub fn store(&self) -> &TabStateStore {
        &self.tabs
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    // --- Session lifecycle (called from the WS session) ---

    /// Register a freshly accepted connection and bootstrap it with the
    /// user's current tabs.
    pub fn register_connection(&self, connection: &Connection) {
        let user_id = connection.user_id();
        let known = self.tabs.contains_user(user_id);
        self.connections.register(user_id, connection.clone());
        self.tabs.ensure_user(user_id);
        if !known {
            tracing::info!(
                user_id = %user_id,
                users = self.tabs.user_count(),
                "First connection for new user"
            );
        }
        if !self.broadcaster.send_snapshot(connection) {
            tracing::debug!(user_id = %user_id, "Bootstrap snapshot not delivered");
        }
    }

    pub fn unregister_connection(&self, connection: &Connection) {
        self.connections
            .unregister(connection.user_id(), connection.id());
    }

    /// Apply one decoded client event and broadcast the resulting state.
    /// Returns the number of connections the broadcast reached.
    pub fn apply_event(&self, user_id: &str, event: &ClientEvent) -> usize {
        match event {
            ClientEvent::OpenTab { tab_id, url } => {
                self.tabs.open_tab(user_id, tab_id, url);
                tracing::debug!(user_id = %user_id, tab_id = %tab_id, url = %url, "Tab opened");
                self.broadcaster.broadcast_tabs(user_id)
            }
            ClientEvent::CloseTab { tab_id } => {
                let _ = self.tabs.close_tab(user_id, tab_id);
                tracing::debug!(user_id = %user_id, tab_id = %tab_id, "Tab closed");
                self.broadcaster.broadcast_tabs(user_id)
            }
            ClientEvent::Ping => 0,
        }
    }

    // --- Queries ---

    /// The user's open tabs. Empty for unknown users.
    pub fn get_tabs(&self, user_id: &str) -> UserTabSet {
        self.tabs.snapshot(user_id)
    }

    /// The subset of the user's tabs whose normalized URL is in `flagged`.
    pub fn live_tabs(&self, user_id: &str, flagged: &HashSet<String>) -> UserTabSet {
        self.tabs
            .snapshot(user_id)
            .into_iter()
            .filter(|(_, url)| flagged.contains(&normalize_url(url)))
            .collect()
    }

    // --- Commands ---

    /// Remove a tab from state and tell the user's clients to close it.
    /// Unknown tabs still get an id-keyed directive.
    pub fn request_close_tab(&self, user_id: &str, tab_id: &str) -> CloseOutcome {
        let removed = self.tabs.close_tab(user_id, tab_id);
        let (target, closed) = match removed {
            Some(url) => {
                let record = TabRecord::new(tab_id, url);
                (CloseTarget::Record(record.clone()), vec![record])
            }
            None => (CloseTarget::ById(tab_id.to_string()), Vec::new()),
        };

        let notified = self.broadcaster.direct_close(user_id, target);
        let _ = self.broadcaster.broadcast_tabs(user_id);

        tracing::info!(
            user_id = %user_id,
            tab_id = %tab_id,
            notified,
            "Close tab requested"
        );
        CloseOutcome { closed, notified }
    }

    /// Close every tab of the user showing exactly `url`.
    pub fn request_close_url(&self, user_id: &str, url: &str) -> CloseOutcome {
        let closed = self.tabs.close_url(user_id, url);
        let notified = self
            .broadcaster
            .direct_close(user_id, CloseTarget::ByUrl(url.to_string()));
        if !closed.is_empty() {
            let _ = self.broadcaster.broadcast_tabs(user_id);
        }

        tracing::info!(
            user_id = %user_id,
            url = %url,
            closed = closed.len(),
            notified,
            "Close by URL requested"
        );
        CloseOutcome { closed, notified }
    }

    /// Drain all of the user's tabs and send a directive for each one.
    pub fn request_close_all(&self, user_id: &str) -> CloseAllOutcome {
        let drained = self.tabs.close_all(user_id);
        let closed = records(&drained);
        let directives = self.send_close_directives(user_id, &closed);
        let _ = self.broadcaster.broadcast_tabs(user_id);

        tracing::info!(
            user_id = %user_id,
            closed = closed.len(),
            directives,
            "Close all tabs requested"
        );
        CloseAllOutcome { closed, directives }
    }

    /// Close a chosen set of tabs (e.g. the flagged ones). Tabs that are no
    /// longer open, or whose URL changed since `tabs` was read, are skipped.
    pub fn request_close_tabs(&self, user_id: &str, tabs: &[TabRecord]) -> CloseAllOutcome {
        let mut closed = Vec::with_capacity(tabs.len());
        for record in tabs {
            if self.tabs.close_tab_if_url(user_id, &record.tab_id, &record.url) {
                closed.push(record.clone());
            }
        }
        let directives = self.send_close_directives(user_id, &closed);
        let _ = self.broadcaster.broadcast_tabs(user_id);
        CloseAllOutcome { closed, directives }
    }

    fn send_close_directives(&self, user_id: &str, closed: &[TabRecord]) -> usize {
        closed
            .iter()
            .map(|record| {
                self.broadcaster
                    .direct_close(user_id, CloseTarget::Record(record.clone()))
            })
            .sum()
    }
}
