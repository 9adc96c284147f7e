//! WebSocket sessions for live reload.
//!
//! Bridges a [`BroadcastHub`] registration to a browser socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;

use super::hub::BroadcastHub;

/// Accept a WebSocket upgrade and run the session in the background.
pub(crate) fn upgrade(ws: WebSocketUpgrade, hub: Arc<BroadcastHub>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Forward hub messages until either side goes away.
async fn handle_socket(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (id, mut outbound) = hub.register();

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(text) = message else {
                    // Dropped by the hub
                    break;
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            // The agent never sends data; this only detects close
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unregister(id);
}
