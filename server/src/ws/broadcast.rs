//! Delivery primitives: push an encoded event to connections.
//! A connection that has gone away is skipped silently.

use std::collections::HashSet;

use crate::chat::rooms::RoomId;
use crate::ws::protocol::ServerEvent;
use crate::ws::{ConnectionId, Realtime};

/// Send an event to every live connection.
pub fn broadcast_to_all(realtime: &Realtime, event: &ServerEvent) {
    let Some(msg) = event.to_message() else {
        return;
    };
    for entry in realtime.connections.iter() {
        let _ = entry.value().sender.send(msg.clone());
    }
}

/// Send an event to a single connection.
pub fn send_to_connection(realtime: &Realtime, connection: ConnectionId, event: &ServerEvent) {
    let Some(msg) = event.to_message() else {
        return;
    };
    if let Some(conn) = realtime.connections.get(&connection) {
        let _ = conn.sender.send(msg);
    }
}

/// Send an event to the members of `rooms`, each connection at most once,
/// skipping `except` when given. Returns how many connections were reached.
pub fn send_to_rooms(
    realtime: &Realtime,
    rooms: &[RoomId],
    except: Option<ConnectionId>,
    event: &ServerEvent,
) -> usize {
    let mut targets: HashSet<ConnectionId> = HashSet::new();
    for room in rooms {
        targets.extend(realtime.rooms.members(room));
    }
    if let Some(skip) = except {
        targets.remove(&skip);
    }
    if targets.is_empty() {
        return 0;
    }

    let Some(msg) = event.to_message() else {
        return 0;
    };
    let mut delivered = 0;
    for id in targets {
        if let Some(conn) = realtime.connections.get(&id) {
            if conn.sender.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }
    }
    delivered
}

/// Force-close all connections.
/// Sends a WebSocket Close frame with the given code and reason.
pub fn close_all(realtime: &Realtime, close_code: u16, reason: &str) {
    let close_frame = axum::extract::ws::CloseFrame {
        code: close_code,
        reason: reason.into(),
    };
    for entry in realtime.connections.iter() {
        let _ = entry
            .value()
            .sender
            .send(axum::extract::ws::Message::Close(Some(close_frame.clone())));
    }
}
