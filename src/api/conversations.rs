//! Conversation endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::ApiJson;
use crate::auth::AuthUser;
use crate::conversation::{
    ConversationDetail, ConversationSummary, Message, SendMessageRequest, StartConversationRequest,
    StartedConversation,
};
use crate::error::AppError;
use crate::server::AppState;

/// An id that does not parse cannot name an existing conversation
fn parse_conversation_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Conversation not found".to_string()))
}

/// GET /api/v1/conversations
#[tracing::instrument(name = "http.list_conversations", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn list_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = state.conversations.list_conversations(caller.id()).await?;
    Ok(Json(conversations))
}

/// GET /api/v1/conversations/{id} - detail; marks incoming messages read
#[tracing::instrument(name = "http.get_conversation", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn get_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, AppError> {
    let id = parse_conversation_id(&id)?;
    let detail = state.conversations.get_conversation_detail(caller.id(), id).await?;
    Ok(Json(detail))
}

/// POST /api/v1/conversations
#[tracing::instrument(name = "http.start_conversation", skip(state, caller, request), fields(user_id = %caller.id()))]
pub async fn start_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartedConversation>), AppError> {
    let started = state.conversations.start_conversation(caller.id(), request).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/v1/conversations/{id}
#[tracing::instrument(name = "http.send_message", skip(state, caller, request), fields(user_id = %caller.id()))]
pub async fn send_message(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let id = parse_conversation_id(&id)?;
    let message = state
        .conversations
        .send_message(caller.id(), id, request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
