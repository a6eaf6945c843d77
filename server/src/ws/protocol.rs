//! JSON wire protocol spoken with the browser extension, and the
//! per-connection session state machine that applies it.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tabs::service::TabService;
use crate::tabs::{deserialize_tab_id, TabId, UserTabSet};
use crate::ws::Connection;

/// Event types a client may send.
const KNOWN_EVENT_TYPES: &[&str] = &["openTab", "closeTab", "ping"];

/// Inbound event from a client, validated at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    OpenTab {
        #[serde(deserialize_with = "deserialize_tab_id")]
        tab_id: TabId,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    CloseTab {
        #[serde(deserialize_with = "deserialize_tab_id")]
        tab_id: TabId,
    },
    /// Application-level keepalive sent by the extension.
    Ping,
}

/// Outbound message pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full tab state of the user.
    OpenTabs { tabs: UserTabSet },
    /// Directive: close this tab locally.
    #[serde(rename_all = "camelCase")]
    CloseTab {
        #[serde(skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        user_id: String,
    },
}

impl ServerMessage {
    /// Serialize into a WebSocket text frame.
    pub fn to_frame(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }
}

/// A client message that could not be applied. Never fatal to the connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Decode one inbound text payload.
pub fn decode_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing \"type\" field".to_string()))?;

    if !KNOWN_EVENT_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Active,
    Closed,
}

/// Per-connection protocol logic, independent of the socket itself.
///
/// Dropping an active session unregisters its connection, so the registry
/// never keeps a connection whose actor has gone away.
pub struct Session {
    service: TabService,
    connection: Connection,
    state: SessionState,
}

impl Session {
    pub fn new(service: TabService, connection: Connection) -> Self {
        Self {
            service,
            connection,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> &str {
        self.connection.user_id()
    }

    /// Unauthenticated → Active: register the connection and send it the
    /// user's current tabs.
    pub fn activate(&mut self) {
        if self.state != SessionState::Unauthenticated {
            return;
        }
        self.service.register_connection(&self.connection);
        self.state = SessionState::Active;
    }

    /// Decode and apply one text frame. Returns the applied event; protocol
    /// errors are logged here and also returned to the caller.
    pub fn handle_text(&mut self, text: &str) -> Result<Option<ClientEvent>, ProtocolError> {
        if self.state != SessionState::Active {
            tracing::debug!(
                user_id = %self.user_id(),
                state = ?self.state,
                "Dropping message for inactive session"
            );
            return Ok(None);
        }

        let event = match decode_event(text) {
            Ok(event) => event,
            Err(err) => {
                match &err {
                    ProtocolError::UnknownType(kind) => tracing::info!(
                        user_id = %self.user_id(),
                        kind = %kind,
                        "Unknown message type, ignoring"
                    ),
                    ProtocolError::Malformed(reason) => tracing::warn!(
                        user_id = %self.user_id(),
                        error = %reason,
                        "Failed to decode client message"
                    ),
                }
                return Err(err);
            }
        };

        let _ = self.service.apply_event(self.connection.user_id(), &event);
        Ok(Some(event))
    }

    /// Active → Closed. Tab state of the user is left untouched.
    pub fn close(&mut self) {
        if self.state == SessionState::Active {
            self.service.unregister_connection(&self.connection);
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
