use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection: ?userId=...
#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// WebSocket close code: no user id in the handshake.
pub const CLOSE_USER_ID_MISSING: u16 = 4001;

/// The handshake did not identify a user.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("User ID not provided")]
    MissingUserId,
}

impl IdentityError {
    pub fn close_code(&self) -> u16 {
        match self {
            IdentityError::MissingUserId => CLOSE_USER_ID_MISSING,
        }
    }
}

/// Decide who a connection belongs to. Blank ids count as missing.
pub fn authenticate(query: WsConnectQuery) -> Result<String, IdentityError> {
    match query.user_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(IdentityError::MissingUserId),
    }
}

/// GET /socket?userId=...
/// On a missing user id, upgrades then immediately closes with 4001 without
/// registering anything. Otherwise spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match authenticate(params) {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection established");
            ws.on_upgrade(move |socket| handle_authenticated(socket, state, user_id))
        }
        Err(err) => {
            let close_code = err.close_code();
            tracing::warn!(
                close_code = close_code,
                reason = %err,
                "WebSocket connection rejected"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: err.to_string().into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

/// Handle an authenticated WebSocket connection by running the actor.
async fn handle_authenticated(socket: WebSocket, state: AppState, user_id: String) {
    actor::run_connection(socket, state, user_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: Option<&str>) -> WsConnectQuery {
        WsConnectQuery {
            user_id: user_id.map(str::to_string),
        }
    }

    #[test]
    fn test_authenticate() {
        assert_eq!(authenticate(query(Some("u1"))), Ok("u1".to_string()));
        assert_eq!(
            authenticate(query(None)),
            Err(IdentityError::MissingUserId)
        );
        assert_eq!(
            authenticate(query(Some(""))),
            Err(IdentityError::MissingUserId)
        );
    }

    #[test]
    fn test_missing_user_close_frame() {
        let err = IdentityError::MissingUserId;
        assert_eq!(err.close_code(), 4001);
        assert_eq!(err.to_string(), "User ID not provided");
    }
}
