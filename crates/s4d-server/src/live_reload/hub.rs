//! Registry of live reload connections.
//!
//! Each WebSocket session registers and receives an outbound queue. A
//! broadcast writes the serialized event into every queue; connections whose
//! session has ended are pruned at that point.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of a registered connection.
pub(crate) type ConnectionId = Uuid;

/// Message pushed to browsers when a file changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct ChangeEvent {
    /// Always `"change"`.
    #[serde(rename = "type")]
    event_type: &'static str,
    /// Changed path relative to the webroot.
    pub(crate) url: String,
}

impl ChangeEvent {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            event_type: "change",
            url: url.into(),
        }
    }
}

/// Set of open connections.
#[derive(Default)]
pub(crate) struct BroadcastHub {
    connections: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl BroadcastHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a connection. The session forwards everything from the returned
    /// receiver to its socket and ends when the receiver closes.
    pub(crate) fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut connections = self.connections.lock().unwrap();
        connections.insert(id, tx);
        tracing::debug!(%id, connections = connections.len(), "Client connected");

        (id, rx)
    }

    /// Remove a connection after its session ended.
    pub(crate) fn unregister(&self, id: ConnectionId) {
        let mut connections = self.connections.lock().unwrap();
        if connections.remove(&id).is_some() {
            tracing::debug!(%id, connections = connections.len(), "Client disconnected");
        }
    }

    /// Send an event to every open connection.
    ///
    /// Connections that are no longer open are dropped, which terminates
    /// their session. Returns the number of connections the event was queued
    /// for.
    pub(crate) fn broadcast(&self, event: &ChangeEvent) -> usize {
        let message = match serde_json::to_string(event) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize change event");
                return 0;
            }
        };

        let mut connections = self.connections.lock().unwrap();
        connections.retain(|id, tx| {
            if tx.is_closed() || tx.send(message.clone()).is_err() {
                tracing::debug!(%id, "Dropping closed connection");
                return false;
            }
            true
        });

        connections.len()
    }

    /// Terminate every session.
    pub(crate) fn close_all(&self) {
        self.connections.lock().unwrap().clear();
    }

    /// Number of registered connections.
    pub(crate) fn len(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_change_event_serialization() {
        let json = serde_json::to_string(&ChangeEvent::new("css/style.css")).unwrap();

        assert_eq!(json, r#"{"type":"change","url":"css/style.css"}"#);
    }

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let hub = BroadcastHub::new();
        let (_a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        let delivered = hub.broadcast(&ChangeEvent::new("index.html"));

        assert_eq!(delivered, 2);
        let expected = r#"{"type":"change","url":"index.html"}"#;
        assert_eq!(rx_a.try_recv().unwrap(), expected);
        assert_eq!(rx_b.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_broadcast_prunes_closed_connections() {
        let hub = BroadcastHub::new();
        let (_open, mut rx_open) = hub.register();
        let (_gone, rx_gone) = hub.register();
        drop(rx_gone);

        let delivered = hub.broadcast(&ChangeEvent::new("a.css"));

        assert_eq!(delivered, 1);
        assert_eq!(hub.len(), 1);
        assert!(rx_open.try_recv().is_ok());
    }

    #[test]
    fn test_unregister_removes_connection() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.register();

        hub.unregister(id);

        assert_eq!(hub.len(), 0);
        assert_eq!(hub.broadcast(&ChangeEvent::new("a.css")), 0);
    }

    #[test]
    fn test_close_all_terminates_sessions() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.register();

        hub.close_all();

        assert_eq!(hub.len(), 0);
        // Sender dropped: the session sees end of stream
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_hubs_do_not_share_state() {
        let first = BroadcastHub::new();
        let second = BroadcastHub::new();
        let (_id, _rx) = first.register();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }
}
