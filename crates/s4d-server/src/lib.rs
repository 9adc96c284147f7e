//! Static development server with live reload.
//!
//! Serves files from a webroot, watches it for changes, and pushes change
//! notifications to every open page over a WebSocket. HTML pages get a small
//! agent script appended that patches stylesheets and images in place, or
//! reloads the page when nothing on it can be patched.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use s4d_server::{DevServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         webroot: PathBuf::from("public"),
//!         port: 0,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = DevServer::start(config).await.unwrap();
//!     println!("{}", server.base_url());
//!     server.close().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum fallback handler
//!    ▲                   │
//!    │                   ├─► ResponseCache ──► FileResolver ──► disk
//!    │                   │
//!    │                   └─► WebSocket upgrade ──► BroadcastHub
//!    │                                               ▲
//!    └──── {"type":"change"} ◄───────────────────────┤
//!                                                    │
//! notify ──► ChangeWatcher ──► LiveReloadManager ────┘
//!                                   └─► ResponseCache::invalidate
//! ```

mod agent;
mod app;
mod cache;
mod error;
mod handler;
mod live_reload;
mod middleware;
mod resolver;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use error::{ServerError, StartupError};
pub use resolver::ResolveError;

use cache::ResponseCache;
use live_reload::{BroadcastHub, LiveReloadManager, WatchOptions};
use resolver::FileResolver;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory to serve and watch.
    pub webroot: PathBuf,
    /// Host name or address to bind to.
    pub host: String,
    /// Port to listen on (`0` picks a free port).
    pub port: u16,
    /// Serve `index.html` for extensionless paths that do not exist.
    pub spa: bool,
    /// Quiet period before a file change is reported.
    pub debounce_ms: u64,
    /// Glob patterns (relative to the webroot) that never trigger a reload.
    pub ignore_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            webroot: PathBuf::from("."),
            host: "localhost".to_owned(),
            port: 8080,
            spa: false,
            debounce_ms: 50,
            ignore_patterns: Vec::new(),
        }
    }
}

/// A running development server.
pub struct DevServer {
    local_addr: SocketAddr,
    host: String,
    hub: Arc<BroadcastHub>,
    live_reload: LiveReloadManager,
    shutdown: oneshot::Sender<()>,
    serve_task: JoinHandle<std::io::Result<()>>,
}

impl DevServer {
    /// Start watching the webroot and listening for requests.
    ///
    /// The watcher starts first; if binding fails it is stopped again before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the webroot is invalid, the watcher cannot be
    /// started, or the listener cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self, StartupError> {
        let webroot = config
            .webroot
            .canonicalize()
            .map_err(|source| StartupError::Webroot {
                path: config.webroot.clone(),
                source,
            })?;
        if !webroot.is_dir() {
            return Err(StartupError::NotADirectory(webroot));
        }

        let options = WatchOptions::new(
            Duration::from_millis(config.debounce_ms),
            &config.ignore_patterns,
        )?;

        let cache = Arc::new(ResponseCache::new(FileResolver::new(
            webroot.clone(),
            config.spa,
        )));
        let hub = Arc::new(BroadcastHub::new());

        let live_reload =
            LiveReloadManager::start(&webroot, options, Arc::clone(&cache), Arc::clone(&hub))?;

        let address = format!("{}:{}", config.host, config.port);
        let bound = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await;
        let listener = match bound {
            Ok(listener) => listener,
            Err(source) => {
                live_reload.stop();
                return Err(StartupError::Bind { address, source });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                live_reload.stop();
                return Err(StartupError::Bind { address, source });
            }
        };

        let state = Arc::new(AppState {
            cache,
            hub: Arc::clone(&hub),
        });
        let app = app::create_router(state);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let serve_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            address = %local_addr,
            webroot = %webroot.display(),
            spa = config.spa,
            "Starting server"
        );

        Ok(Self {
            local_addr,
            host: config.host,
            hub,
            live_reload,
            shutdown,
            serve_task,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port the listener is bound to; differs from the configured port when
    /// `0` was requested.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// URL for users to open.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", display_host(&self.host), self.port())
    }

    /// Stop the watcher and listener.
    ///
    /// Live reload sessions are closed; in-flight requests complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the server task failed.
    pub async fn close(self) -> Result<(), StartupError> {
        let sessions = self.hub.len();
        self.hub.close_all();
        self.live_reload.stop();
        let _ = self.shutdown.send(());

        match self.serve_task.await {
            Ok(result) => result?,
            Err(err) if err.is_cancelled() => {}
            Err(err) => return Err(StartupError::Serve(std::io::Error::other(err))),
        }

        tracing::info!(sessions, "Server stopped");
        Ok(())
    }
}

/// Host shown to users; wildcard addresses are reported as `localhost`.
fn display_host(host: &str) -> &str {
    match host {
        "" | "0.0.0.0" | "::" | "[::]" => "localhost",
        host => host,
    }
}

/// Run the server until Ctrl-C.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `on_started` - Called once the server is listening
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(
    config: ServerConfig,
    on_started: impl FnOnce(&DevServer),
) -> Result<(), StartupError> {
    let server = DevServer::start(config).await?;
    on_started(&server);

    shutdown_signal().await;
    server.close().await
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
