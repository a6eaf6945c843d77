use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::{AppState, Heartbeat};
use crate::ws::protocol::Session;
use crate::ws::Connection;

/// Run the actor-per-connection pattern for an accepted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes incoming events and applies them through the session
///
/// The mpsc sender is what the registry holds, so broadcasts never touch the
/// socket directly.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection = Connection::new(user_id.clone(), tx.clone());
    let connection_id = connection.id();

    // Registers the connection and queues the bootstrap snapshot.
    let mut session = Session::new(state.tabs.clone(), connection);
    session.activate();

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        connections = state.tabs.connections().connection_count(&user_id),
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(heartbeat_task(tx.clone(), pong_rx, state.heartbeat));

    loop {
        // A peer that vanished never sends a close frame, so the reader also
        // stops once the heartbeat gives up or the writer can no longer send.
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut ping_handle => {
                tracing::info!(user_id = %user_id, "Heartbeat ended, dropping connection");
                break;
            }
            _ = &mut writer_handle => {
                tracing::info!(user_id = %user_id, "Writer ended, dropping connection");
                break;
            }
        };
        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    let _ = session.handle_text(text.as_str());
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        let _ = session.handle_text(text);
                    }
                    Err(_) => {
                        tracing::debug!(
                            user_id = %user_id,
                            len = data.len(),
                            "Ignoring non-UTF-8 binary frame"
                        );
                    }
                },
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();

    // Active → Closed: unregister. The user's tabs stay for reconnects.
    session.close();

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        connected_users = state.tabs.connections().user_count(),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Sends periodic pings and closes the connection when a pong is late.
async fn heartbeat_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    heartbeat: Heartbeat,
) {
    let mut ping_timer = interval(heartbeat.ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(heartbeat.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}
