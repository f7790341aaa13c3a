//! Event gateway for the banter relay.
//!
//! The gateway is the boundary between the transport and the coordination
//! core, and the single serialization point for all shared state. Each
//! event handler takes the one lock, mutates registry/directory state,
//! resolves the full recipient set, and returns [`Outbound`] batches. The
//! caller delivers them after the lock is released, so a slow recipient
//! never stalls another connection's event.
//!
//! No handler performs I/O or awaits while holding the lock, and no
//! handler returns an error: invalid or unroutable events degrade to
//! logged drops, never to a closed connection.

use std::sync::{Mutex, MutexGuard};

use banter_protocol::MessagePayload;
use tracing::{debug, error, info};

use crate::presence;
use crate::registry::{ConnectionId, ConnectionRegistry, RegistryError, User};
use crate::rooms::RoomDirectory;
use crate::router::{self, Outbound};

/// Registry and directory state behind the gateway's lock.
#[derive(Debug)]
struct CoreState {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
}

/// The relay coordination core behind its single lock.
#[derive(Debug)]
pub struct EventGateway {
    state: Mutex<CoreState>,
}

impl EventGateway {
    /// Create a gateway over the configured room directory.
    #[must_use]
    pub fn new(rooms: RoomDirectory) -> Self {
        Self {
            state: Mutex::new(CoreState {
                registry: ConnectionRegistry::new(),
                rooms,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        // A poisoned lock means a panic inside a critical section; the core
        // state can no longer be trusted and the process must go down.
        self.state.lock().expect("core state lock poisoned")
    }

    /// Register a new connection and broadcast the presence snapshot to
    /// every connection, the new one included.
    pub fn on_connect(&self, conn: ConnectionId, username: impl Into<String>) -> Vec<Outbound> {
        let user = User::new(username);
        let mut state = self.lock();
        match state.registry.register(conn.clone(), user.clone()) {
            Ok(()) => {
                info!(connection = %conn, username = %user.username, "User connected");
                let event = presence::online_users(&state.registry);
                vec![Outbound::multicast(state.registry.connection_ids(), event)]
            }
            Err(e) => {
                error!(connection = %conn, error = %e, "Connection registration failed");
                Vec::new()
            }
        }
    }

    /// Unregister a connection and broadcast the presence snapshot to the
    /// remaining connections.
    ///
    /// A disconnect for an unknown connection is ignored: the transport may
    /// fire it before registration completes, or twice. `reason` is
    /// informational only.
    pub fn on_disconnect(&self, conn: &ConnectionId, reason: &str) -> Vec<Outbound> {
        let mut state = self.lock();
        match state.registry.unregister(conn) {
            Ok(user) => {
                info!(connection = %conn, username = %user.username, reason = %reason, "User disconnected");
                let recipients = state.registry.connection_ids();
                if recipients.is_empty() {
                    return Vec::new();
                }
                let event = presence::online_users(&state.registry);
                vec![Outbound::multicast(recipients, event)]
            }
            Err(RegistryError::NotFound(_)) => {
                debug!(connection = %conn, "Disconnect for unknown connection ignored");
                Vec::new()
            }
            Err(e) => {
                error!(connection = %conn, error = %e, "Disconnect failed");
                Vec::new()
            }
        }
    }

    /// Handle a join request.
    pub fn on_join(&self, conn: &ConnectionId, room: &str) -> Vec<Outbound> {
        let mut state = self.lock();
        let CoreState { registry, rooms } = &mut *state;
        router::route_join(registry, rooms, conn, room)
    }

    /// Handle a leave request.
    pub fn on_leave(&self, conn: &ConnectionId, room: &str) -> Vec<Outbound> {
        let mut state = self.lock();
        router::route_leave(&mut state.registry, conn, room)
    }

    /// Handle a chat message.
    pub fn on_message(&self, conn: &ConnectionId, payload: &MessagePayload) -> Vec<Outbound> {
        let mut state = self.lock();
        let CoreState { registry, rooms } = &mut *state;
        router::route_message(registry, rooms, conn, payload)
    }

    /// Usernames of all currently connected users.
    #[must_use]
    pub fn online_usernames(&self) -> Vec<String> {
        self.lock().registry.snapshot_usernames()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock().registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_protocol::ServerEvent;

    fn gateway() -> EventGateway {
        EventGateway::new(
            RoomDirectory::new(
                vec!["General".to_string(), "News".to_string()],
                "General",
                100,
            )
            .unwrap(),
        )
    }

    fn online_users(batch: &Outbound) -> &[String] {
        match &batch.event {
            ServerEvent::OnlineUsers { users } => users,
            other => panic!("expected online_users event, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_broadcasts_presence_to_all() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        let c2 = ConnectionId::new("conn-2");

        let batches = gateway.on_connect(c1.clone(), "alice");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].recipients, vec![c1.clone()]);
        assert_eq!(online_users(&batches[0]), ["alice"]);

        let batches = gateway.on_connect(c2.clone(), "bob");
        assert_eq!(batches[0].recipients, vec![c1.clone(), c2.clone()]);
        assert_eq!(online_users(&batches[0]), ["alice", "bob"]);
    }

    #[test]
    fn test_disconnect_updates_presence_for_remaining() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        let c2 = ConnectionId::new("conn-2");
        gateway.on_connect(c1.clone(), "alice");
        gateway.on_connect(c2.clone(), "bob");

        let batches = gateway.on_disconnect(&c1, "client closed");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].recipients, vec![c2]);
        assert_eq!(online_users(&batches[0]), ["bob"]);
        assert_eq!(gateway.online_usernames(), vec!["bob"]);
    }

    #[test]
    fn test_disconnect_double_fire_tolerated() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        gateway.on_connect(c1.clone(), "alice");

        assert!(gateway.on_disconnect(&c1, "closed").is_empty()); // no one left to notify
        assert!(gateway.on_disconnect(&c1, "closed").is_empty()); // already gone
        assert_eq!(gateway.connection_count(), 0);
    }

    #[test]
    fn test_duplicate_connect_keeps_first_identity() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        gateway.on_connect(c1.clone(), "alice");

        let batches = gateway.on_connect(c1.clone(), "mallory");
        assert!(batches.is_empty());
        assert_eq!(gateway.online_usernames(), vec!["alice"]);
    }

    #[test]
    fn test_connect_join_message_scenario() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");

        let batches = gateway.on_connect(c1.clone(), "alice");
        assert_eq!(online_users(&batches[0]), ["alice"]);

        // Joining delivers a join notice and an empty history snapshot.
        let batches = gateway.on_join(&c1, "General");
        assert_eq!(batches.len(), 2);
        let ServerEvent::Status(notice) = &batches[0].event else {
            panic!("expected status event");
        };
        assert_eq!(notice.text, "alice has joined the room.");
        let ServerEvent::ChatHistory { messages } = &batches[1].event else {
            panic!("expected chat_history event");
        };
        assert!(messages.is_empty());

        // The room hears the message.
        let payload = MessagePayload::public("hi", "General");
        let batches = gateway.on_message(&c1, &payload);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].recipients, vec![c1.clone()]);

        // A later joiner sees it in the history replay.
        let c2 = ConnectionId::new("conn-2");
        gateway.on_connect(c2.clone(), "bob");
        let batches = gateway.on_join(&c2, "General");
        let ServerEvent::ChatHistory { messages } = &batches[1].event else {
            panic!("expected chat_history event");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hi");
        assert_eq!(messages[0].username, "alice");
    }

    #[test]
    fn test_private_message_scenario() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        let c2 = ConnectionId::new("conn-2");
        let c3 = ConnectionId::new("conn-3");
        gateway.on_connect(c1.clone(), "alice");
        gateway.on_connect(c2.clone(), "bob");
        gateway.on_connect(c3.clone(), "carol");

        let payload = MessagePayload::private("hey", "bob");
        let batches = gateway.on_message(&c1, &payload);
        assert_eq!(batches.len(), 1);
        // Only bob's connection is targeted.
        assert_eq!(batches[0].recipients, vec![c2]);
        let ServerEvent::PrivateMessage(message) = &batches[0].event else {
            panic!("expected private_message event");
        };
        assert_eq!(message.sender, "alice");
        assert_eq!(message.receiver, "bob");
    }

    #[test]
    fn test_leave_then_message_falls_back_to_default_room() {
        let gateway = gateway();
        let c1 = ConnectionId::new("conn-1");
        let c2 = ConnectionId::new("conn-2");
        gateway.on_connect(c1.clone(), "alice");
        gateway.on_connect(c2.clone(), "bob");
        gateway.on_join(&c1, "News");
        gateway.on_join(&c2, "General");

        gateway.on_leave(&c1, "News");

        // No explicit room: the message lands in the default room, which
        // alice is no longer part of.
        let payload = MessagePayload {
            text: "hi".to_string(),
            kind: banter_protocol::MessageKind::Message,
            room: None,
            receiver: None,
        };
        let batches = gateway.on_message(&c1, &payload);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].recipients, vec![c2]);
        let ServerEvent::Message(message) = &batches[0].event else {
            panic!("expected message event");
        };
        assert_eq!(message.room, "General");
    }
}
