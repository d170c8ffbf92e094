//! WebSocket fan-out of task events and notifications.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /api/v1/notifications/ws`. Upgrades to a WebSocket that streams
/// every task event and notification as JSON text frames.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.event_tx.subscribe();
    let mut notification_rx = state.notification_tx.subscribe();

    tracing::debug!("websocket client connected");

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_json(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket client lagged on events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            notification = notification_rx.recv() => {
                match notification {
                    Ok(notification) => {
                        if send_json(&mut sender, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket client lagged on notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // inbound frames are ignored
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::debug!("websocket client disconnected");
}

async fn send_json<T: serde::Serialize>(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    match serde_json::to_string(payload) {
        Ok(text) => sender.send(Message::Text(text)).await,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize websocket payload");
            Ok(())
        }
    }
}
