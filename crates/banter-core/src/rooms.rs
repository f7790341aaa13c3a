//! Room directory for the banter relay.
//!
//! Rooms are a fixed set of names configured at startup; the set never
//! changes while the process runs. Each room keeps a bounded, arrival-order
//! history of public messages for replay to joining connections.

use banter_protocol::PublicMessage;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::trace;

/// Directory construction errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The configured room list is empty.
    #[error("Room set cannot be empty")]
    EmptyRoomSet,

    /// A room name is blank.
    #[error("Invalid room name: {0:?}")]
    InvalidRoomName(String),

    /// A room name appears more than once.
    #[error("Duplicate room name: {0}")]
    DuplicateRoom(String),

    /// The default room is not part of the room set.
    #[error("Default room {0:?} is not in the room set")]
    UnknownDefaultRoom(String),
}

/// Fixed set of valid rooms with bounded per-room history.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: Vec<String>,
    default_room: String,
    history: HashMap<String, VecDeque<PublicMessage>>,
    history_limit: usize,
}

impl RoomDirectory {
    /// Create a directory from the configured room set.
    ///
    /// A `history_limit` of zero disables history retention entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the room list is empty, contains blank or
    /// duplicate names, or the default room is not in the list.
    pub fn new(
        rooms: Vec<String>,
        default_room: impl Into<String>,
        history_limit: usize,
    ) -> Result<Self, DirectoryError> {
        if rooms.is_empty() {
            return Err(DirectoryError::EmptyRoomSet);
        }
        for (i, room) in rooms.iter().enumerate() {
            if room.trim().is_empty() {
                return Err(DirectoryError::InvalidRoomName(room.clone()));
            }
            if rooms[..i].contains(room) {
                return Err(DirectoryError::DuplicateRoom(room.clone()));
            }
        }
        let default_room = default_room.into();
        if !rooms.contains(&default_room) {
            return Err(DirectoryError::UnknownDefaultRoom(default_room));
        }
        let history = rooms
            .iter()
            .map(|room| (room.clone(), VecDeque::new()))
            .collect();
        Ok(Self {
            rooms,
            default_room,
            history,
            history_limit,
        })
    }

    /// Check whether a name belongs to the configured room set.
    #[must_use]
    pub fn is_valid(&self, name: &str) -> bool {
        self.rooms.iter().any(|room| room == name)
    }

    /// The room public messages fall back to when none is named.
    #[must_use]
    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    /// All configured room names, in configuration order.
    #[must_use]
    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// Append a message to a room's history, evicting the oldest entry when
    /// the cap is reached. No-op when retention is disabled or the room is
    /// unknown.
    pub fn append_history(&mut self, room: &str, message: PublicMessage) {
        if self.history_limit == 0 {
            return;
        }
        let Some(buffer) = self.history.get_mut(room) else {
            return;
        };
        if buffer.len() == self.history_limit {
            buffer.pop_front();
        }
        buffer.push_back(message);
        trace!(room = %room, retained = buffer.len(), "Message appended to history");
    }

    /// Snapshot of a room's retained messages in arrival order.
    #[must_use]
    pub fn history_of(&self, room: &str) -> Vec<PublicMessage> {
        self.history
            .get(room)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }
}
