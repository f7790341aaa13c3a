//! Event types for the banter protocol.
//!
//! Every frame on the wire is a JSON object tagged by an `event` field.
//! Inbound events come from clients; outbound events are produced by the
//! relay core.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn unix_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Declared kind of an inbound chat message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Public message addressed to a room.
    #[default]
    Message,
    /// Direct message addressed to a single username.
    Private,
}

/// Payload of an inbound `message` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Message text. Trimmed by the router; empty after trimming is dropped.
    pub text: String,
    /// Message kind, defaults to public.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Target room for public messages. Falls back to the configured
    /// default room when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Target username for private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

impl MessagePayload {
    /// Create a public message payload.
    #[must_use]
    pub fn public(text: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Message,
            room: Some(room.into()),
            receiver: None,
        }
    }

    /// Create a private message payload.
    #[must_use]
    pub fn private(text: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: MessageKind::Private,
            room: None,
            receiver: Some(receiver.into()),
        }
    }
}

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Request to join a room.
    Join {
        /// Room name; must be one of the configured rooms.
        room: String,
    },
    /// Request to leave a room.
    Leave {
        /// Room name as named by the client; not validated against
        /// membership.
        room: String,
    },
    /// Chat message, public or private.
    Message(MessagePayload),
}

/// Kind of a room status notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Join,
    Leave,
}

/// Join/leave notice multicast to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Human-readable notice text.
    pub text: String,
    /// Whether the user joined or left.
    #[serde(rename = "type")]
    pub kind: StatusKind,
    /// Creation time, epoch milliseconds.
    pub timestamp: Timestamp,
}

impl StatusMessage {
    /// Notice for a user joining a room.
    #[must_use]
    pub fn joined(username: &str) -> Self {
        Self {
            text: format!("{username} has joined the room."),
            kind: StatusKind::Join,
            timestamp: unix_millis(),
        }
    }

    /// Notice for a user leaving a room.
    #[must_use]
    pub fn left(username: &str) -> Self {
        Self {
            text: format!("{username} has left the room."),
            kind: StatusKind::Leave,
            timestamp: unix_millis(),
        }
    }
}

/// Message broadcast to every member of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicMessage {
    /// Message text.
    pub text: String,
    /// Sender username.
    pub username: String,
    /// Room the message was addressed to.
    pub room: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: Timestamp,
}

impl PublicMessage {
    /// Create a public message stamped with the current time.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        username: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            username: username.into(),
            room: room.into(),
            timestamp: unix_millis(),
        }
    }
}

/// Message delivered to exactly one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    /// Message text.
    pub text: String,
    /// Sender username.
    pub sender: String,
    /// Receiver username as named by the sender.
    pub receiver: String,
    /// Creation time, epoch milliseconds.
    pub timestamp: Timestamp,
}

impl PrivateMessage {
    /// Create a private message stamped with the current time.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            timestamp: unix_millis(),
        }
    }
}

/// Events sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Presence snapshot, broadcast to everyone on connect/disconnect.
    OnlineUsers {
        /// Usernames of all currently connected users.
        users: Vec<String>,
    },
    /// Join/leave notice, multicast to a room.
    Status(StatusMessage),
    /// History replay, unicast to a joining connection.
    ChatHistory {
        /// Retained public messages in arrival order.
        messages: Vec<PublicMessage>,
    },
    /// Public chat message, multicast to a room.
    Message(PublicMessage),
    /// Private chat message, unicast to one connection.
    PrivateMessage(PrivateMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_join_shape() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "room": "General"})).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                room: "General".to_string()
            }
        );
    }

    #[test]
    fn test_message_payload_defaults() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "message", "text": "hi"})).unwrap();
        let ClientEvent::Message(payload) = event else {
            panic!("expected message event");
        };
        assert_eq!(payload.kind, MessageKind::Message);
        assert!(payload.room.is_none());
        assert!(payload.receiver.is_none());
    }

    #[test]
    fn test_private_message_payload() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "message",
            "text": "hey",
            "type": "private",
            "receiver": "bob"
        }))
        .unwrap();
        let ClientEvent::Message(payload) = event else {
            panic!("expected message event");
        };
        assert_eq!(payload.kind, MessageKind::Private);
        assert_eq!(payload.receiver.as_deref(), Some("bob"));
    }

    #[test]
    fn test_status_event_shape() {
        let status = StatusMessage::joined("alice");
        assert_eq!(status.text, "alice has joined the room.");

        let value = serde_json::to_value(ServerEvent::Status(status.clone())).unwrap();
        assert_eq!(value["event"], "status");
        assert_eq!(value["type"], "join");
        assert_eq!(value["text"], "alice has joined the room.");
        assert_eq!(value["timestamp"], status.timestamp);
    }

    #[test]
    fn test_online_users_event_shape() {
        let event = ServerEvent::OnlineUsers {
            users: vec!["alice".to_string(), "bob".to_string()],
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value, json!({"event": "online_users", "users": ["alice", "bob"]}));
    }

    #[test]
    fn test_public_message_event_shape() {
        let message = PublicMessage::new("hi", "alice", "General");
        let value = serde_json::to_value(ServerEvent::Message(message.clone())).unwrap();
        assert_eq!(value["event"], "message");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["room"], "General");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["timestamp"], message.timestamp);
    }

    #[test]
    fn test_private_message_event_shape() {
        let message = PrivateMessage::new("hey", "alice", "bob");
        let value = serde_json::to_value(ServerEvent::PrivateMessage(message)).unwrap();
        assert_eq!(value["event"], "private_message");
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["receiver"], "bob");
    }

    #[test]
    fn test_chat_history_event_shape() {
        let value = serde_json::to_value(ServerEvent::ChatHistory {
            messages: Vec::new(),
        })
        .unwrap();
        assert_eq!(value, json!({"event": "chat_history", "messages": []}));
    }
}
