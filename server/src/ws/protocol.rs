//! Wire format of the realtime channel and the intent router.
//!
//! Every frame is a JSON text frame `{"event": <name>, "data": <payload>}`.
//! Inbound frames decode into [`ClientIntent`]; outbound frames are encoded
//! from [`ServerEvent`].

use axum::extract::ws::Message;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;

use crate::chat::rooms::RoomId;
use crate::chat::{broadcast, receipts};
use crate::db::models::{Conversation, Message as ChatMessage};
use crate::state::AppState;
use crate::ws::broadcast::send_to_connection;
use crate::ws::ConnectionId;

/// Payload naming one conversation. Older clients send `chatId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineQuery {
    pub user_id: String,
}

/// Client-to-server intents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientIntent {
    /// Start receiving conversation-scoped events for a conversation.
    #[serde(rename = "join_chat")]
    JoinChat(String),
    #[serde(rename = "messages-seen")]
    MessagesSeen(ConversationRef),
    #[serde(rename = "typing")]
    Typing(ConversationRef),
    #[serde(rename = "stop_typing")]
    StopTyping(ConversationRef),
    /// Point lookup, answered only to the asking connection.
    #[serde(rename = "is_online")]
    IsOnline(OnlineQuery),
}

/// `{conversationId, userId}` attached to receipts and typing signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSignal {
    pub conversation_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MessageAction {
    New {
        message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        message_id: String,
        conversation_id: String,
    },
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "online_users")]
    OnlineUsers(Vec<String>),
    #[serde(rename = "messages")]
    Messages(MessageAction),
    #[serde(rename = "messages-seen")]
    MessagesSeen(ParticipantSignal),
    #[serde(rename = "user_typing")]
    UserTyping(ParticipantSignal),
    #[serde(rename = "user_stop_typing")]
    UserStopTyping(ParticipantSignal),
    #[serde(rename = "chat-created")]
    ChatCreated { chat: Conversation },
    #[serde(rename = "chat-deleted", rename_all = "camelCase")]
    ChatDeleted { conversation_id: String },
    #[serde(rename = "is_online", rename_all = "camelCase")]
    IsOnline { user_id: String, online: bool },
    #[serde(rename = "posts")]
    Posts(serde_json::Value),
    #[serde(rename = "comments")]
    Comments(serde_json::Value),
    #[serde(rename = "notifications")]
    Notifications(serde_json::Value),
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server event");
                None
            }
        }
    }
}

/// Handle one inbound text frame from `connection`.
///
/// A frame that does not decode is logged and dropped; the sender gets an
/// `error` event and the connection stays open.
pub async fn handle_text_message(
    text: &str,
    state: &AppState,
    connection: ConnectionId,
    user_id: &str,
) {
    let intent = match serde_json::from_str::<ClientIntent>(text) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Dropping malformed intent: {}",
                text.chars().take(100).collect::<String>()
            );
            send_to_connection(
                &state.realtime,
                connection,
                &ServerEvent::Error {
                    message: "Malformed event".to_string(),
                },
            );
            return;
        }
    };

    // A panic in one handler must not take the connection down with it
    let outcome = AssertUnwindSafe(dispatch_intent(intent, state, connection, user_id))
        .catch_unwind()
        .await;
    if outcome.is_err() {
        tracing::error!(user_id = %user_id, "Intent handler panicked");
    }
}

/// Whether `user_id` takes part in `conversation_id`. Unknown conversations
/// and store failures count as no; the caller gets an `error` event.
async fn check_participant(
    state: &AppState,
    connection: ConnectionId,
    conversation_id: &str,
    user_id: &str,
) -> bool {
    let allowed = match state.conversations.get(conversation_id).await {
        Ok(Some(conversation)) => conversation.has_participant(user_id),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %e,
                "Participant lookup failed"
            );
            false
        }
    };
    if !allowed {
        tracing::warn!(
            user_id = %user_id,
            conversation_id = %conversation_id,
            "Dropping intent for a conversation the caller is not part of"
        );
        send_to_connection(
            &state.realtime,
            connection,
            &ServerEvent::Error {
                message: "Not a participant of this conversation".to_string(),
            },
        );
    }
    allowed
}

/// Dispatch a decoded intent to the appropriate handler.
pub async fn dispatch_intent(
    intent: ClientIntent,
    state: &AppState,
    connection: ConnectionId,
    user_id: &str,
) {
    let realtime = &state.realtime;
    match intent {
        ClientIntent::JoinChat(conversation_id) => {
            if conversation_id.is_empty() {
                tracing::warn!(user_id = %user_id, "join_chat without conversation id");
                return;
            }
            if !check_participant(state, connection, &conversation_id, user_id).await {
                return;
            }
            realtime
                .rooms
                .join_conversation_room(connection, &conversation_id);
        }
        ClientIntent::MessagesSeen(ConversationRef { conversation_id }) => {
            if !check_participant(state, connection, &conversation_id, user_id).await {
                return;
            }
            if let Err(e) = receipts::mark_seen(
                state.messages.as_ref(),
                realtime,
                &conversation_id,
                user_id,
                Some(connection),
            )
            .await
            {
                tracing::warn!(
                    user_id = %user_id,
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to mark messages seen"
                );
            }
        }
        // Typing is only relayed from connections that joined the room,
        // which already passed the participant check
        ClientIntent::Typing(ConversationRef { conversation_id })
        | ClientIntent::StopTyping(ConversationRef { conversation_id })
            if !realtime
                .rooms
                .is_member(connection, &RoomId::conversation(&conversation_id)) =>
        {
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                "Ignoring typing signal outside a joined conversation"
            );
        }
        ClientIntent::Typing(ConversationRef { conversation_id }) => {
            broadcast::broadcast_typing(realtime, &conversation_id, user_id, connection, true);
        }
        ClientIntent::StopTyping(ConversationRef { conversation_id }) => {
            broadcast::broadcast_typing(realtime, &conversation_id, user_id, connection, false);
        }
        ClientIntent::IsOnline(OnlineQuery { user_id: queried }) => {
            let online = realtime.presence.is_online(&queried);
            send_to_connection(
                realtime,
                connection,
                &ServerEvent::IsOnline {
                    user_id: queried,
                    online,
                },
            );
        }
    }
}
