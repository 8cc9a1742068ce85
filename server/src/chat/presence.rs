//! Server-side presence tracking and broadcast.
//!
//! In-memory presence store (DashMap) keyed by identity. An identity is
//! online while it has at least one live connection. Every change to the
//! table is followed by one `online_users` broadcast to all connections.

use axum::{
    extract::{Path, State},
    Json,
};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;

use crate::auth::middleware::Claims;
use crate::chat::broadcast::broadcast_online_users;
use crate::state::AppState;
use crate::ws::{ConnectionId, Realtime};

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    online: DashMap<String, HashSet<ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `connection` for `identity`. Returns false if it was already there.
    pub fn insert(&self, identity: &str, connection: ConnectionId) -> bool {
        self.online
            .entry(identity.to_string())
            .or_default()
            .insert(connection)
    }

    /// Forget `connection`; the identity goes offline with its last one.
    /// Returns false if the connection was not registered.
    pub fn remove(&self, identity: &str, connection: ConnectionId) -> bool {
        let removed = match self.online.get_mut(identity) {
            Some(mut conns) => conns.remove(&connection),
            None => false,
        };
        if removed {
            self.online.remove_if(identity, |_, conns| conns.is_empty());
        }
        removed
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.online.contains_key(identity)
    }

    /// Online identities, sorted.
    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.online.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn connection_count(&self, identity: &str) -> usize {
        self.online.get(identity).map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.online.clear();
    }
}

// --- Functions called from WS actor lifecycle ---

/// Mark `connection` online and broadcast the full online set to everyone.
pub fn register(realtime: &Realtime, identity: &str, connection: ConnectionId) {
    if realtime.presence.insert(identity, connection) {
        tracing::debug!(user_id = %identity, connection_id = %connection, "Presence registered");
        broadcast_online_users(realtime);
    }
}

/// Mark `connection` gone and broadcast the full online set to everyone.
/// A repeated call for the same connection does nothing.
pub fn unregister(realtime: &Realtime, identity: &str, connection: ConnectionId) {
    if realtime.presence.remove(identity, connection) {
        tracing::debug!(
            user_id = %identity,
            connection_id = %connection,
            remaining = realtime.presence.connection_count(identity),
            "Presence unregistered"
        );
        broadcast_online_users(realtime);
    }
}

// --- REST endpoint handlers ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatusResponse {
    pub user_id: String,
    pub online: bool,
}

/// GET /api/presence: Online identities. JWT auth required.
pub async fn get_presence(State(state): State<AppState>, _claims: Claims) -> Json<Vec<String>> {
    Json(state.realtime.presence.online_users())
}

/// GET /api/presence/{user_id}: Whether one identity is online. JWT auth required.
pub async fn get_user_presence(
    State(state): State<AppState>,
    _claims: Claims,
    Path(user_id): Path<String>,
) -> Json<OnlineStatusResponse> {
    let online = state.realtime.presence.is_online(&user_id);
    Json(OnlineStatusResponse { user_id, online })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ServerEvent;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn next_event(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<ServerEvent> {
        match rx.try_recv().ok()? {
            Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }

    #[test]
    fn online_while_any_connection_remains() {
        let presence = PresenceRegistry::new();
        let tab1 = Uuid::new_v4();
        let tab2 = Uuid::new_v4();
        presence.insert("u1", tab1);
        presence.insert("u1", tab2);

        assert_eq!(presence.connection_count("u1"), 2);

        assert!(presence.remove("u1", tab1));
        assert!(presence.is_online("u1"));
        assert_eq!(presence.connection_count("u1"), 1);
        assert!(presence.remove("u1", tab2));
        assert!(!presence.is_online("u1"));
        assert_eq!(presence.connection_count("u1"), 0);
        assert!(!presence.remove("u1", tab2));
    }

    #[test]
    fn online_users_is_sorted() {
        let presence = PresenceRegistry::new();
        presence.insert("zoe", Uuid::new_v4());
        presence.insert("adam", Uuid::new_v4());
        assert_eq!(presence.online_users(), vec!["adam", "zoe"]);
    }

    #[test]
    fn register_and_unregister_broadcast_once_each() {
        let rt = Realtime::default();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let c1 = rt.attach("u1", tx1);
        let c2 = rt.attach("u2", tx2);

        register(&rt, "u1", c1);
        register(&rt, "u2", c2);

        // u1 saw both broadcasts, u2 also saw both
        assert_eq!(
            next_event(&mut rx1),
            Some(ServerEvent::OnlineUsers(vec!["u1".into()]))
        );
        assert_eq!(
            next_event(&mut rx1),
            Some(ServerEvent::OnlineUsers(vec!["u1".into(), "u2".into()]))
        );
        assert_eq!(
            next_event(&mut rx2),
            Some(ServerEvent::OnlineUsers(vec!["u1".into()]))
        );
        assert_eq!(
            next_event(&mut rx2),
            Some(ServerEvent::OnlineUsers(vec!["u1".into(), "u2".into()]))
        );

        rt.detach(c1);
        unregister(&rt, "u1", c1);
        assert_eq!(
            next_event(&mut rx2),
            Some(ServerEvent::OnlineUsers(vec!["u2".into()]))
        );

        // Second disconnect of the same connection is a no-op
        unregister(&rt, "u1", c1);
        assert!(rx2.try_recv().is_err());
        assert!(!rt.presence.is_online("u1"));
    }
}
