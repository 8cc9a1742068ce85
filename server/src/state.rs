use std::sync::Arc;

use crate::config::RealtimeConfig;
use crate::db::DbPool;
use crate::store::{ConversationStore, MessageStore, SqliteStore};
use crate::ws::Realtime;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Message-store collaborator
    pub messages: Arc<dyn MessageStore>,
    /// Conversation-store collaborator
    pub conversations: Arc<dyn ConversationStore>,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live connections, rooms and presence for this process
    pub realtime: Arc<Realtime>,
    /// Keepalive settings for socket actors
    pub realtime_config: RealtimeConfig,
}

impl AppState {
    /// State backed by a single SQLite database for both stores.
    pub fn with_sqlite(db: DbPool, jwt_secret: Vec<u8>, realtime_config: RealtimeConfig) -> Self {
        let store = Arc::new(SqliteStore::new(db));
        Self {
            messages: store.clone(),
            conversations: store,
            jwt_secret,
            realtime: Realtime::new(),
            realtime_config,
        }
    }
}
