//! Application state.
//!
//! Owned by one [`DevServer`](crate::DevServer); nothing is process-global.

use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::live_reload::BroadcastHub;

/// State shared by all request handlers.
pub(crate) struct AppState {
    /// Resolved responses.
    pub(crate) cache: Arc<ResponseCache>,
    /// Open live reload connections.
    pub(crate) hub: Arc<BroadcastHub>,
}
