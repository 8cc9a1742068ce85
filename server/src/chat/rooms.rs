//! Room membership: which live connections belong to which broadcast group.
//!
//! Rooms carry no storage of their own. Every connection joins the personal
//! room of its identity at admission and accumulates conversation rooms as
//! the client opens them. All memberships go away with the connection.

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;

use crate::ws::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// All connections of one identity
    Personal(String),
    /// Connections currently viewing a conversation
    Conversation(String),
}

impl RoomId {
    pub fn personal(identity: &str) -> Self {
        Self::Personal(identity.to_string())
    }

    pub fn conversation(conversation_id: &str) -> Self {
        Self::Conversation(conversation_id.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal(id) => write!(f, "user:{id}"),
            Self::Conversation(id) => write!(f, "chat:{id}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomMembership {
    members: DashMap<RoomId, HashSet<ConnectionId>>,
    joined: DashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the personal room of `identity`. Called once at admission.
    pub fn join_personal_room(&self, connection: ConnectionId, identity: &str) {
        self.join(connection, RoomId::personal(identity));
    }

    /// Join a conversation room. Returns false if already a member.
    pub fn join_conversation_room(&self, connection: ConnectionId, conversation_id: &str) -> bool {
        self.join(connection, RoomId::conversation(conversation_id))
    }

    fn join(&self, connection: ConnectionId, room: RoomId) -> bool {
        let added = self
            .joined
            .entry(connection)
            .or_default()
            .insert(room.clone());
        if added {
            tracing::debug!(connection_id = %connection, room = %room, "Joined room");
            self.members.entry(room).or_default().insert(connection);
        }
        added
    }

    /// Drop every membership held by `connection`.
    pub fn leave_all(&self, connection: ConnectionId) {
        let Some((_, rooms)) = self.joined.remove(&connection) else {
            return;
        };
        for room in rooms {
            if let Some(mut set) = self.members.get_mut(&room) {
                set.remove(&connection);
            }
            self.members.remove_if(&room, |_, set| set.is_empty());
        }
    }

    /// Connections currently in `room`.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.members
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self.joined
            .get(&connection)
            .map(|rooms| rooms.contains(room))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.members.clear();
        self.joined.clear();
    }
}
