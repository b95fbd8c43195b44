//! WebSocket gateway.
//!
//! One task per socket reads inbound frames and hands text frames to the
//! [`MessageRouter`](crate::router::MessageRouter); a second task owns the
//! sink and drains the connection's outbound queue.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use murmur_shared::UserId;

use crate::api::AppState;
use crate::auth::token_from_request;
use crate::error::ServerError;
use crate::registry::ConnectionHandle;
use crate::sessions::SessionVerifier;

/// `GET /ws`.  A token presented with the upgrade request is checked before
/// upgrading; otherwise the first text frame must carry it.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let user = match token_from_request(&headers, uri.query()) {
        Some(raw) => match state.verifier.resolve(&raw).await {
            Ok(user) => Some(user),
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: Option<UserId>) {
    let (mut sink, mut stream) = socket.split();

    let user = match user {
        Some(user) => user,
        None => {
            let timeout_secs = state.config.identify_timeout_secs;
            match identify(&mut stream, &state.verifier, timeout_secs).await {
                Some(user) => user,
                None => {
                    let _ = sink.close().await;
                    return;
                }
            }
        }
    };

    let (handle, mut outbound) = ConnectionHandle::new(state.config.outbound_queue_capacity);
    state.registry.register(user, handle.clone()).await;

    let connection = handle.id();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(connection, error = %e, "WebSocket write failed");
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Err(e) = state.router.route_frame(user, &text).await {
                    match &e {
                        ServerError::BadRequest(_) => {
                            warn!(user = %user, error = %e, "Dropping malformed chat frame")
                        }
                        ServerError::Unauthorized(_) => {
                            warn!(user = %user, error = %e, "Refused chat frame")
                        }
                        _ => warn!(user = %user, error = %e, "Failed to route chat frame"),
                    }
                }
            }
            Ok(Message::Binary(data)) => {
                debug!(user = %user, size = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by the transport.
            Ok(_) => {}
            Err(e) => {
                debug!(user = %user, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    state.registry.unregister(user, &handle).await;
    writer.abort();
    info!(user = %user, connection, "WebSocket closed");
}

/// Wait up to `timeout_secs` for the first text frame and resolve it as a
/// session token.
async fn identify(
    stream: &mut SplitStream<WebSocket>,
    verifier: &SessionVerifier,
    timeout_secs: u64,
) -> Option<UserId> {
    let first = tokio::time::timeout(Duration::from_secs(timeout_secs), stream.next()).await;

    match first {
        Ok(Some(Ok(Message::Text(raw)))) => {
            let raw = raw.trim();
            let raw = raw.strip_prefix("Bearer ").unwrap_or(raw);
            match verifier.resolve(raw).await {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "WebSocket identify failed");
                    None
                }
            }
        }
        Ok(_) => {
            debug!("WebSocket closed before identifying");
            None
        }
        Err(_) => {
            debug!(timeout_secs, "WebSocket identify timed out");
            None
        }
    }
}
