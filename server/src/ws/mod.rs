pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::ordering::ConversationLocks;
use crate::chat::presence::PresenceRegistry;
use crate::chat::rooms::RoomMembership;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Process-unique id of one live socket.
pub type ConnectionId = Uuid;

/// A live, authenticated connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub identity: String,
    pub sender: ConnectionSender,
}

/// Connection registry: every live connection keyed by its id.
/// One identity may own several entries (multiple devices/tabs).
pub type ConnectionRegistry = DashMap<ConnectionId, Connection>;

/// Process-scoped realtime state: live connections, room membership and
/// presence. Created once at startup, shared through `AppState`, and
/// cleared by [`Realtime::shutdown`].
#[derive(Default)]
pub struct Realtime {
    pub connections: ConnectionRegistry,
    pub rooms: RoomMembership,
    pub presence: PresenceRegistry,
    /// Serializes commit-then-broadcast per conversation
    pub ordering: ConversationLocks,
}

impl Realtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a connection to the registry and return its id.
    pub fn attach(&self, identity: &str, sender: ConnectionSender) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            Connection {
                identity: identity.to_string(),
                sender,
            },
        );
        tracing::debug!(
            user_id = %identity,
            connection_id = %id,
            connections = self.connections.len(),
            "Connection registered"
        );
        id
    }

    /// Remove a connection and every room membership it holds.
    pub fn detach(&self, connection_id: ConnectionId) -> Option<Connection> {
        self.rooms.leave_all(connection_id);
        let removed = self.connections.remove(&connection_id).map(|(_, c)| c);
        tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        removed
    }

    /// Close every socket with 1001 and drop all realtime state.
    pub fn shutdown(&self) {
        broadcast::close_all(self, 1001, "Server shutting down");
        self.connections.clear();
        self.rooms.clear();
        self.presence.clear();
        self.ordering.clear();
        tracing::info!("Realtime state cleared");
    }
}
