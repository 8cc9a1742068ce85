//! Message Broadcaster: routes each chat event to the rooms it belongs to.
//!
//! Callers persist first and broadcast after the store call returned.
//! Delivery is fire-and-forget; nobody is told about absent recipients.

use crate::chat::rooms::RoomId;
use crate::db::models::{Conversation, Message};
use crate::ws::broadcast::{broadcast_to_all, send_to_rooms};
use crate::ws::protocol::{MessageAction, ParticipantSignal, ServerEvent};
use crate::ws::{ConnectionId, Realtime};

/// Full online set to every connection.
pub fn broadcast_online_users(realtime: &Realtime) {
    let users = realtime.presence.online_users();
    broadcast_to_all(realtime, &ServerEvent::OnlineUsers(users));
}

/// New message to the recipient's personal room. The sender already has it.
pub fn broadcast_new_message(realtime: &Realtime, message: &Message) -> usize {
    send_to_rooms(
        realtime,
        &[RoomId::personal(&message.recipient_id)],
        None,
        &ServerEvent::Messages(MessageAction::New {
            message: message.clone(),
        }),
    )
}

/// Deletion to everyone viewing the conversation, deleter included.
pub fn broadcast_message_deleted(
    realtime: &Realtime,
    conversation_id: &str,
    message_id: &str,
) -> usize {
    send_to_rooms(
        realtime,
        &[RoomId::conversation(conversation_id)],
        None,
        &ServerEvent::Messages(MessageAction::Delete {
            message_id: message_id.to_string(),
            conversation_id: conversation_id.to_string(),
        }),
    )
}

/// Read receipt to the conversation room, minus the connection that marked.
pub fn broadcast_messages_seen(
    realtime: &Realtime,
    conversation_id: &str,
    reader: &str,
    origin: Option<ConnectionId>,
) -> usize {
    send_to_rooms(
        realtime,
        &[RoomId::conversation(conversation_id)],
        origin,
        &ServerEvent::MessagesSeen(ParticipantSignal {
            conversation_id: conversation_id.to_string(),
            user_id: reader.to_string(),
        }),
    )
}

/// Typing start/stop to the conversation room, minus the typing connection.
pub fn broadcast_typing(
    realtime: &Realtime,
    conversation_id: &str,
    user_id: &str,
    origin: ConnectionId,
    started: bool,
) -> usize {
    let signal = ParticipantSignal {
        conversation_id: conversation_id.to_string(),
        user_id: user_id.to_string(),
    };
    let event = if started {
        ServerEvent::UserTyping(signal)
    } else {
        ServerEvent::UserStopTyping(signal)
    };
    send_to_rooms(
        realtime,
        &[RoomId::conversation(conversation_id)],
        Some(origin),
        &event,
    )
}

/// New conversation to both participants, creator included.
pub fn broadcast_conversation_created(realtime: &Realtime, conversation: &Conversation) -> usize {
    let rooms = conversation.participants().map(RoomId::personal);
    send_to_rooms(
        realtime,
        &rooms,
        None,
        &ServerEvent::ChatCreated {
            chat: conversation.clone(),
        },
    )
}

/// Conversation removal to both participants and to the conversation room.
/// A connection in several of those rooms gets it once.
pub fn broadcast_conversation_deleted(realtime: &Realtime, conversation: &Conversation) -> usize {
    let [a, b] = conversation.participants();
    send_to_rooms(
        realtime,
        &[
            RoomId::personal(a),
            RoomId::personal(b),
            RoomId::conversation(&conversation.id),
        ],
        None,
        &ServerEvent::ChatDeleted {
            conversation_id: conversation.id.clone(),
        },
    )
}

// --- Feed events published by the posts/comments/notifications services ---

/// Post feed change (`{action, post}` or `{action, postId}`) to everyone.
pub fn broadcast_posts(realtime: &Realtime, payload: serde_json::Value) {
    broadcast_to_all(realtime, &ServerEvent::Posts(payload));
}

/// Comment change to everyone.
pub fn broadcast_comments(realtime: &Realtime, payload: serde_json::Value) {
    broadcast_to_all(realtime, &ServerEvent::Comments(payload));
}

/// Notification to every connection of `recipient`.
pub fn notify_user(realtime: &Realtime, recipient: &str, payload: serde_json::Value) -> usize {
    send_to_rooms(
        realtime,
        &[RoomId::personal(recipient)],
        None,
        &ServerEvent::Notifications(payload),
    )
}
