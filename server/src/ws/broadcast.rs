use axum::extract::ws::Message;
use std::sync::Arc;

use super::protocol::ServerMessage;
use super::{Connection, ConnectionRegistry};
use crate::tabs::store::TabStateStore;
use crate::tabs::{TabId, TabRecord};

/// What a close directive names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseTarget {
    ById(TabId),
    ByUrl(String),
    /// Both id and URL; older clients only act on the URL.
    Record(TabRecord),
}

impl CloseTarget {
    fn into_message(self, user_id: &str) -> ServerMessage {
        let (tab_id, url) = match self {
            CloseTarget::ById(tab_id) => (Some(tab_id), None),
            CloseTarget::ByUrl(url) => (None, Some(url)),
            CloseTarget::Record(record) => (Some(record.tab_id), Some(record.url)),
        };
        ServerMessage::CloseTab {
            tab_id,
            url,
            user_id: user_id.to_string(),
        }
    }
}

/// Pushes tab state and close directives to a user's live connections.
#[derive(Clone)]
pub struct Broadcaster {
    tabs: Arc<TabStateStore>,
    connections: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(tabs: Arc<TabStateStore>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { tabs, connections }
    }

    /// Send the user's current tabs to all of their connections.
    ///
    /// The snapshot is taken and queued while holding the user's store lock,
    /// so every connection sees one user's snapshots in mutation order.
    /// Returns the number of connections the message was queued to.
    pub fn broadcast_tabs(&self, user_id: &str) -> usize {
        self.tabs.with_tabs(user_id, |tabs| {
            let msg = ServerMessage::OpenTabs { tabs: tabs.clone() };
            match msg.to_frame() {
                Some(frame) => deliver(&self.connections.connections_for(user_id), frame),
                None => 0,
            }
        })
    }

    /// Send the user's current tabs to a single (newly accepted) connection.
    pub fn send_snapshot(&self, connection: &Connection) -> bool {
        self.tabs.with_tabs(connection.user_id(), |tabs| {
            let msg = ServerMessage::OpenTabs { tabs: tabs.clone() };
            msg.to_frame()
                .map(|frame| deliver(std::slice::from_ref(connection), frame) == 1)
                .unwrap_or(false)
        })
    }

    /// Tell every connection of the user to close a tab. Fire-and-forget:
    /// returns once the directive is queued, not when the tab is closed.
    pub fn direct_close(&self, user_id: &str, target: CloseTarget) -> usize {
        match target.into_message(user_id).to_frame() {
            Some(frame) => deliver(&self.connections.connections_for(user_id), frame),
            None => 0,
        }
    }
}

/// Queue a frame to each open connection. Failures are isolated per connection.
fn deliver(connections: &[Connection], frame: Message) -> usize {
    let mut delivered = 0;
    for conn in connections {
        if !conn.is_open() {
            continue;
        }
        match conn.send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!(
                    user_id = %conn.user_id(),
                    error = %e,
                    "Dropping message for closed connection"
                );
            }
        }
    }
    delivered
}
