//! Per-conversation commit ordering.
//!
//! A store call returns before its broadcast is sent, and handlers resume on
//! any worker. Holding the conversation's guard from the write until the
//! broadcast has been queued keeps delivery order equal to commit order.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write-and-publish access to `conversation_id`.
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock of a deleted conversation.
    pub fn forget(&self, conversation_id: &str) {
        self.locks.remove(conversation_id);
    }

    pub fn clear(&self) {
        self.locks.clear();
    }
}
