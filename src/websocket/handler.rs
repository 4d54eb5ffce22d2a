use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::extract_bearer_token;
use crate::connection_manager::SessionHandle;
use crate::metrics::{WsMessageMetrics, WS_SESSIONS_CLOSED, WS_SESSIONS_OPENED, WS_SESSION_DURATION};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let principal = match resolve_principal(&state, &query, &headers) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    tracing::info!(principal = ?principal, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

/// Resolve the session identity from the query token or Authorization header.
///
/// A present token must be valid. A missing token is accepted only when
/// anonymous sessions are enabled.
fn resolve_principal(
    state: &AppState,
    query: &WsQuery,
    headers: &HeaderMap,
) -> Result<Option<String>, Response> {
    let token = query
        .token
        .as_deref()
        .or_else(|| extract_bearer_token(headers));

    match token {
        Some(token) => match state.jwt_validator.authenticate(token) {
            Ok(user_id) => Ok(Some(user_id)),
            Err(e) => {
                tracing::warn!(error = %e, "JWT validation failed");
                Err((StatusCode::UNAUTHORIZED, "Invalid token").into_response())
            }
        },
        None if state.settings.websocket.allow_anonymous => Ok(None),
        None => Err((StatusCode::UNAUTHORIZED, "Missing authentication token").into_response()),
    }
}

/// Handle an established WebSocket connection
#[tracing::instrument(
    name = "ws.session",
    skip(socket, state),
    fields(otel.kind = "server")
)]
async fn handle_socket(socket: WebSocket, state: AppState, principal: Option<String>) {
    let session_start = std::time::Instant::now();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.settings.websocket.channel_buffer);
    let handle = state.connection_manager.register(principal, tx);
    let session_id = handle.id;

    WS_SESSIONS_OPENED.inc();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Task for receiving messages from WebSocket
    let state_clone = state.clone();
    let handle_clone = handle.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &state_clone, &handle_clone).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {
            tracing::debug!(session_id = %session_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(session_id = %session_id, "Receive task completed");
        }
    }

    // Leaves every joined room; empty rooms disappear with it
    state.connection_manager.unregister(session_id);

    WS_SESSIONS_CLOSED.inc();
    let duration = session_start.elapsed().as_secs_f64();
    WS_SESSION_DURATION.observe(duration);

    tracing::info!(
        session_id = %session_id,
        duration_secs = duration,
        "WebSocket session closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, state: &AppState, handle: &Arc<SessionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            handle.update_activity();

            let client_msg: ClientMessage = match serde_json::from_str(&text) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse client message");
                    let _ = handle
                        .send(ServerMessage::error("INVALID_MESSAGE", e.to_string()))
                        .await;
                    return true;
                }
            };

            handle_client_message(client_msg, state, handle).await;
            true
        }
        Message::Binary(_) => {
            let _ = handle
                .send(ServerMessage::error(
                    "UNSUPPORTED_FORMAT",
                    "Binary messages are not supported",
                ))
                .await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            handle.update_activity();
            true
        }
        Message::Close(_) => {
            tracing::debug!(session_id = %handle.id, "Received close frame");
            false
        }
    }
}

/// Handle a parsed client message
#[tracing::instrument(
    name = "ws.message",
    skip(state, handle, msg),
    fields(session_id = %handle.id, principal = ?handle.principal)
)]
async fn handle_client_message(msg: ClientMessage, state: &AppState, handle: &Arc<SessionHandle>) {
    match msg {
        ClientMessage::Join(user_id) => {
            WsMessageMetrics::record_join();
            handle_join(user_id, state, handle).await;
        }
        ClientMessage::PrivateMessage { from, to, message } => {
            WsMessageMetrics::record_private_message();
            handle_private_message(from, to, message, state, handle).await;
        }
        ClientMessage::Notification { to, notification } => {
            WsMessageMetrics::record_notification();
            state
                .router
                .route_to_user(&to, ServerMessage::NewNotification(notification))
                .await;
        }
        ClientMessage::Ping => {
            WsMessageMetrics::record_ping();
            let _ = handle.send(ServerMessage::Pong).await;
        }
    }
}

async fn handle_join(user_id: String, state: &AppState, handle: &Arc<SessionHandle>) {
    if user_id.trim().is_empty() {
        let _ = handle
            .send(ServerMessage::error("INVALID_MESSAGE", "Room name is required"))
            .await;
        return;
    }

    if !handle.may_act_as(&user_id) {
        tracing::warn!(room = %user_id, "Rejected join of another user's room");
        let _ = handle
            .send(ServerMessage::error("FORBIDDEN", "Cannot join another user's room"))
            .await;
        return;
    }

    if state.connection_manager.join(handle.id, &user_id) {
        tracing::info!(room = %user_id, "Session joined room");
        let _ = handle.send(ServerMessage::joined(user_id)).await;
    }
}

async fn handle_private_message(
    from: String,
    to: String,
    message: Value,
    state: &AppState,
    handle: &Arc<SessionHandle>,
) {
    if !handle.may_act_as(&from) {
        tracing::warn!(from = %from, "Rejected relay with forged sender");
        let _ = handle
            .send(ServerMessage::error("FORBIDDEN", "Sender does not match session"))
            .await;
        return;
    }

    state
        .router
        .route_to_user(&to, ServerMessage::NewMessage { from, message })
        .await;
}
