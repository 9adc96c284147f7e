//! Request handler.
//!
//! Every request lands here. WebSocket upgrades are handed to the live reload
//! hub; everything else is a static file request:
//!
//! ```text
//! method check ─► resolve (cache, SPA fallback) ─► If-None-Match ─► 304 | 200
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::live_reload;
use crate::state::AppState;

/// Handle any request.
pub(crate) async fn handle(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();

    if is_websocket_upgrade(&parts.headers) {
        return upgrade(&mut parts, &state).await;
    }

    match serve_file(&state, &parts).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn upgrade(parts: &mut Parts, state: &Arc<AppState>) -> Response {
    match WebSocketUpgrade::from_request_parts(parts, state).await {
        Ok(ws) => live_reload::upgrade(ws, Arc::clone(&state.hub)),
        Err(rejection) => rejection.into_response(),
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Serve a static file request.
async fn serve_file(state: &AppState, parts: &Parts) -> Result<Response, ServerError> {
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return Err(ServerError::MethodNotAllowed(parts.method.clone()));
    }

    let entry = state.cache.get_or_resolve(parts.uri.path()).await?;

    let fresh = parts
        .headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|value| value.as_bytes() == entry.version.as_bytes());
    if fresh {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, entry.version)]).into_response());
    }

    // hyper drops the body for HEAD, keeping the GET headers
    Ok((
        [
            (header::CONTENT_TYPE, entry.content_type),
            (header::CONTENT_LENGTH, entry.contents.len().to_string()),
            (header::ETAG, entry.version),
        ],
        Body::from(entry.contents),
    )
        .into_response())
}
