//! REST endpoints for conversation management.
//!
//! Conversations are one-to-one. The store normalizes the participant pair so
//! creating a conversation from either side returns the same row.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::chat::broadcast;
use crate::db::models::Conversation;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub recipient_id: String,
}

/// Load a conversation and require the caller to be one of its participants.
pub(crate) async fn participant_conversation(
    state: &AppState,
    conversation_id: &str,
    caller: &str,
) -> ApiResult<Conversation> {
    let conversation = state
        .conversations
        .get(conversation_id)
        .await?
        .ok_or(ApiError::NotFound("chat"))?;

    if !conversation.has_participant(caller) {
        return Err(ApiError::Forbidden);
    }
    Ok(conversation)
}

/// POST /api/chats: Create or get the conversation with `recipientId`.
/// Returns 201 and notifies both participants when a new row was created.
pub async fn create_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let recipient_id = body.recipient_id.trim();
    if recipient_id.is_empty() {
        return Err(ApiError::BadRequest("recipientId is required"));
    }
    if recipient_id == claims.sub {
        return Err(ApiError::BadRequest("cannot start a chat with yourself"));
    }

    let (conversation, created) = state
        .conversations
        .find_or_create(&claims.sub, recipient_id)
        .await?;

    if created {
        let delivered = broadcast::broadcast_conversation_created(&state.realtime, &conversation);
        tracing::info!(
            conversation_id = %conversation.id,
            sender_id = %claims.sub,
            recipient_id = %recipient_id,
            delivered,
            "Conversation created"
        );
        Ok((StatusCode::CREATED, Json(conversation)))
    } else {
        Ok((StatusCode::OK, Json(conversation)))
    }
}

/// GET /api/chats: Conversations the caller participates in.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Json<Vec<Conversation>>> {
    let conversations = state.conversations.list_for(&claims.sub).await?;
    Ok(Json(conversations))
}

/// GET /api/chats/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    let conversation = participant_conversation(&state, &conversation_id, &claims.sub).await?;
    Ok(Json(conversation))
}

/// DELETE /api/chats/{id}: Remove the conversation and all of its messages.
pub async fn delete_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<String>,
) -> ApiResult<StatusCode> {
    let conversation = participant_conversation(&state, &conversation_id, &claims.sub).await?;

    let order = state.realtime.ordering.acquire(&conversation.id).await;
    if !state.conversations.delete(&conversation.id).await? {
        // Lost a race with the other participant
        return Err(ApiError::NotFound("chat"));
    }

    broadcast::broadcast_conversation_deleted(&state.realtime, &conversation);
    drop(order);
    state.realtime.ordering.forget(&conversation.id);
    tracing::info!(
        conversation_id = %conversation.id,
        deleted_by = %claims.sub,
        "Conversation deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
