//! Message routing for the banter relay.
//!
//! The router validates inbound join/leave/message events and resolves them
//! into [`Outbound`] delivery batches. It always runs inside the gateway's
//! critical section, so recipient sets are final by the time a batch is
//! returned. Invalid or unroutable events are dropped silently toward the
//! sender and logged.

use banter_protocol::{
    MessageKind, MessagePayload, PrivateMessage, PublicMessage, ServerEvent, StatusMessage,
};
use tracing::{debug, warn};

use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::rooms::RoomDirectory;

/// A resolved outbound delivery: one event addressed to one or more
/// connections.
///
/// A batch with a single recipient is a unicast; a batch addressed to a
/// room's members is a multicast; a batch addressed to every live
/// connection is a broadcast. Batches with no recipients are never
/// produced.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Connections this event is addressed to.
    pub recipients: Vec<ConnectionId>,
    /// The event to deliver.
    pub event: ServerEvent,
}

impl Outbound {
    /// Address an event to a single connection.
    #[must_use]
    pub fn unicast(recipient: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipients: vec![recipient],
            event,
        }
    }

    /// Address an event to a set of connections.
    #[must_use]
    pub fn multicast(recipients: Vec<ConnectionId>, event: ServerEvent) -> Self {
        Self { recipients, event }
    }

    /// Number of connections this batch targets.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

/// Handle a join request.
///
/// Joining the current room again is a no-op: no duplicate status notice,
/// no duplicate history replay. Otherwise the room association is replaced,
/// the room (including the joiner) is notified, and the joiner alone
/// receives the history snapshot.
pub(crate) fn route_join(
    registry: &mut ConnectionRegistry,
    rooms: &RoomDirectory,
    conn: &ConnectionId,
    room: &str,
) -> Vec<Outbound> {
    if !rooms.is_valid(room) {
        warn!(connection = %conn, room = %room, "Invalid room join attempt");
        return Vec::new();
    }
    let Some(username) = registry.username(conn).map(str::to_owned) else {
        warn!(connection = %conn, "Join from unregistered connection");
        return Vec::new();
    };
    if registry.current_room(conn) == Some(room) {
        debug!(connection = %conn, room = %room, "Already in room, join ignored");
        return Vec::new();
    }
    if registry.set_room(conn, Some(room.to_string())).is_err() {
        // Unregistered connections were rejected above.
        return Vec::new();
    }

    let members = registry.connections_in(room);
    debug!(connection = %conn, username = %username, room = %room, members = members.len(), "Joined room");

    vec![
        Outbound::multicast(members, ServerEvent::Status(StatusMessage::joined(&username))),
        Outbound::unicast(
            conn.clone(),
            ServerEvent::ChatHistory {
                messages: rooms.history_of(room),
            },
        ),
    ]
}

/// Handle a leave request.
///
/// The room association is cleared only when it matches the named room;
/// leaving a room the connection never joined is tolerated and still
/// notifies that room's members. A room with no members (including an
/// unknown room name) produces no sends.
pub(crate) fn route_leave(
    registry: &mut ConnectionRegistry,
    conn: &ConnectionId,
    room: &str,
) -> Vec<Outbound> {
    let Some(username) = registry.username(conn).map(str::to_owned) else {
        warn!(connection = %conn, "Leave from unregistered connection");
        return Vec::new();
    };
    if registry.current_room(conn) == Some(room) {
        // The connection exists, checked above.
        let _ = registry.set_room(conn, None);
        debug!(connection = %conn, username = %username, room = %room, "Left room");
    } else {
        debug!(connection = %conn, room = %room, "Leave for a room the connection is not in");
    }

    let members = registry.connections_in(room);
    if members.is_empty() {
        return Vec::new();
    }
    vec![Outbound::multicast(
        members,
        ServerEvent::Status(StatusMessage::left(&username)),
    )]
}

/// Handle a chat message.
///
/// Text is trimmed first; empty messages are dropped. Private messages go
/// to the first live connection matching the receiver's username, public
/// messages to every member of the (possibly defaulted) room. Every drop is
/// silent toward the sender.
pub(crate) fn route_message(
    registry: &ConnectionRegistry,
    rooms: &mut RoomDirectory,
    conn: &ConnectionId,
    payload: &MessagePayload,
) -> Vec<Outbound> {
    let text = payload.text.trim();
    if text.is_empty() {
        debug!(connection = %conn, "Empty message dropped");
        return Vec::new();
    }
    let Some(username) = registry.username(conn).map(str::to_owned) else {
        warn!(connection = %conn, "Message from unregistered connection");
        return Vec::new();
    };

    match payload.kind {
        MessageKind::Private => {
            let Some(receiver) = payload.receiver.as_deref().filter(|r| !r.is_empty()) else {
                debug!(connection = %conn, "Private message without receiver dropped");
                return Vec::new();
            };
            match registry.find_by_username(receiver) {
                Some(target) => {
                    debug!(sender = %username, receiver = %receiver, "Private message routed");
                    vec![Outbound::unicast(
                        target.clone(),
                        ServerEvent::PrivateMessage(PrivateMessage::new(text, &username, receiver)),
                    )]
                }
                None => {
                    warn!(sender = %username, receiver = %receiver, "Private message target not found");
                    Vec::new()
                }
            }
        }
        MessageKind::Message => {
            let room = match &payload.room {
                Some(room) => room.clone(),
                None => rooms.default_room().to_string(),
            };
            if !rooms.is_valid(&room) {
                warn!(connection = %conn, room = %room, "Message to invalid room");
                return Vec::new();
            }

            let message = PublicMessage::new(text, &username, &room);
            rooms.append_history(&room, message.clone());

            let members = registry.connections_in(&room);
            if members.is_empty() {
                debug!(room = %room, "No members in room, message retained only");
                return Vec::new();
            }
            debug!(room = %room, sender = %username, recipients = members.len(), "Public message routed");
            vec![Outbound::multicast(members, ServerEvent::Message(message))]
        }
    }
}
