//! WebSocket push adapter (§4.7, §6): forwards every broadcast `DownloadEvent` to the connected
//! client as one JSON text frame, until the socket closes or the engine's event stream ends.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;

use engine::Registry;

use crate::routes::AppState;

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state.registry))
}

async fn forward_events(mut socket: WebSocket, registry: Arc<Registry>) {
    let mut events = registry.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket subscriber lagged; some events were dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => return,
                };

                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize download event");
                        continue;
                    }
                };

                if socket.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            incoming = socket.recv() => {
                // A `None` means the client closed the connection; any inbound message is
                // otherwise ignored, this channel is push-only.
                if incoming.is_none() {
                    return;
                }
            }
        }
    }
}
