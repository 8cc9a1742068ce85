//! REST endpoints for sending, listing and deleting conversation messages.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::chat::broadcast;
use crate::db::models::{Message, NewMessage};
use crate::dm::conversations::participant_conversation;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message_text: String,
}

/// GET /api/messages/{chat_id}: History of a conversation in creation order.
pub async fn list_messages(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversation = participant_conversation(&state, &conversation_id, &claims.sub).await?;
    let messages = state.messages.list(&conversation.id).await?;
    Ok(Json(messages))
}

/// POST /api/messages/{chat_id}: Persist a message and push it to the
/// recipient's personal room.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    if body.message_text.trim().is_empty() {
        return Err(ApiError::BadRequest("messageText must not be empty"));
    }

    let conversation = participant_conversation(&state, &conversation_id, &claims.sub).await?;
    let recipient_id = conversation
        .other_participant(&claims.sub)
        .ok_or(ApiError::Forbidden)?
        .to_string();

    let _order = state.realtime.ordering.acquire(&conversation.id).await;
    let message = state
        .messages
        .create(NewMessage {
            conversation_id: conversation.id.clone(),
            sender_id: claims.sub.clone(),
            recipient_id,
            text: body.message_text,
        })
        .await?;

    let delivered = broadcast::broadcast_new_message(&state.realtime, &message);
    tracing::debug!(
        message_id = %message.id,
        conversation_id = %message.conversation_id,
        delivered,
        "Message sent"
    );

    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/messages/{message_id}: Only the sender may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(message_id): Path<String>,
) -> ApiResult<StatusCode> {
    let message = state
        .messages
        .get(&message_id)
        .await?
        .ok_or(ApiError::NotFound("message"))?;

    if message.sender_id != claims.sub {
        return Err(ApiError::Forbidden);
    }

    let _order = state.realtime.ordering.acquire(&message.conversation_id).await;
    if !state.messages.delete(&message.id).await? {
        return Err(ApiError::NotFound("message"));
    }

    broadcast::broadcast_message_deleted(&state.realtime, &message.conversation_id, &message.id);

    Ok(StatusCode::NO_CONTENT)
}
