pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// A send to one connection failed. Never fatal to a broadcast.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    ConnectionClosed(Uuid),
}

/// One live WebSocket connection, tagged with the user it belongs to.
/// Cloning shares the underlying outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    user_id: String,
    tx: ConnectionSender,
}

impl Connection {
    pub fn new(user_id: impl Into<String>, tx: ConnectionSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The writer task has not gone away yet.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a message for the writer task.
    pub fn send(&self, msg: Message) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::ConnectionClosed(self.id));
        }
        self.tx
            .send(msg)
            .map_err(|_| DeliveryError::ConnectionClosed(self.id))
    }
}

/// Connection registry: tracks all active WebSocket connections per user.
/// A user can have multiple concurrent connections (multiple devices/tabs).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. It is a broadcast target as soon as this returns.
    pub fn register(&self, user_id: &str, connection: Connection) {
        let count = {
            let mut conns = self.connections.entry(user_id.to_string()).or_default();
            conns.push(connection);
            conns.len()
        };
        tracing::debug!(
            user_id = %user_id,
            connections = count,
            "Connection registered"
        );
    }

    /// Remove a connection by id. Unknown ids are ignored.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) {
        let mut remove_user = false;

        if let Some(mut conns) = self.connections.get_mut(user_id) {
            conns.retain(|c| c.id != connection_id);
            remove_user = conns.is_empty();
        }

        if remove_user {
            // Re-check under the write lock: a register may have slipped in.
            let _ = self
                .connections
                .remove_if(user_id, |_, conns| conns.is_empty());
        }

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
    }

    /// Current live connections for a user. Empty if none.
    pub fn connections_for(&self, user_id: &str) -> Vec<Connection> {
        self.connections
            .get(user_id)
            .map(|conns| conns.value().clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .get(user_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.connections.len()
    }
}
