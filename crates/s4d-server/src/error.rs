//! Error types for the HTTP server.

use std::io;
use std::path::PathBuf;

use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::resolver::ResolveError;

/// Request-scoped error, rendered as a plain-text response.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Only GET and HEAD are served.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    /// Resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_owned(),
            ),
            Self::Resolve(err) if err.is_not_found() => {
                (StatusCode::NOT_FOUND, "Not found".to_owned())
            }
            Self::Resolve(err) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {err}"),
                )
            }
        };

        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

/// Failure while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Webroot missing or unreadable.
    #[error("Invalid webroot {}: {source}", path.display())]
    Webroot {
        /// Configured webroot.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Webroot exists but is not a directory.
    #[error("Webroot is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Ignore pattern does not parse.
    #[error("Invalid ignore pattern: {0}")]
    IgnorePattern(#[from] glob::PatternError),

    /// File watcher could not be started.
    #[error("Failed to watch webroot: {0}")]
    Watch(#[from] notify::Error),

    /// Listener could not be bound.
    #[error("Failed to listen on {address}: {source}")]
    Bind {
        /// Requested `host:port`.
        address: String,
        /// Underlying error.
        source: io::Error,
    },

    /// Server task failed.
    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}
