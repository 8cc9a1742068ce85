//! Read-Receipt Coordinator.

use crate::chat::broadcast::broadcast_messages_seen;
use crate::store::{MessageStore, StoreResult};
use crate::ws::{ConnectionId, Realtime};

/// Mark every unread message in `conversation_id` that `reader` did not send
/// as read, then tell the conversation room.
///
/// The broadcast goes out on every call, even when nothing changed, and is
/// skipped only when the store write fails. Returns the number of messages
/// that changed state.
pub async fn mark_seen(
    messages: &dyn MessageStore,
    realtime: &Realtime,
    conversation_id: &str,
    reader: &str,
    origin: Option<ConnectionId>,
) -> StoreResult<usize> {
    let _order = realtime.ordering.acquire(conversation_id).await;
    let updated = messages.mark_read(conversation_id, reader).await?;

    tracing::debug!(
        user_id = %reader,
        conversation_id = %conversation_id,
        updated,
        "Messages marked seen"
    );

    broadcast_messages_seen(realtime, conversation_id, reader, origin);
    Ok(updated)
}
