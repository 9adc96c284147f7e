//! Live reload: file watching, connection registry and WebSocket sessions.

mod debouncer;
mod hub;
mod manager;
mod watcher;
mod websocket;

pub(crate) use hub::BroadcastHub;
pub(crate) use manager::LiveReloadManager;
pub(crate) use watcher::WatchOptions;
pub(crate) use websocket::upgrade;
