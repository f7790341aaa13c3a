//! Connection registry for the banter relay.
//!
//! The registry is the authoritative map of live connections to user
//! identities and current rooms. An entry exists exactly as long as the
//! connection is live; identifiers are never reused.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        Self(format!("conn_{:x}", timestamp))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity associated with a connection for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Display name. Stable per session, not guaranteed unique.
    pub username: String,
}

impl User {
    /// Create a new user identity.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The connection is already registered.
    #[error("Connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),

    /// The connection is not registered.
    #[error("Connection not found: {0}")]
    NotFound(ConnectionId),
}

/// Session state for one live connection.
#[derive(Debug)]
struct SessionEntry {
    user: User,
    current_room: Option<String>,
}

/// Authoritative map of live connections.
///
/// Keys are kept in `BTreeMap` order so snapshots and first-match username
/// lookups are deterministic; generated connection IDs sort roughly by
/// accept time.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: BTreeMap<ConnectionId, SessionEntry>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Check whether a connection is registered.
    #[must_use]
    pub fn contains(&self, conn: &ConnectionId) -> bool {
        self.sessions.contains_key(conn)
    }

    /// Register a new connection with its identity and no current room.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is already registered; the
    /// transport guarantees fresh identifiers, so this indicates a caller
    /// bug and must not replace the existing entry.
    pub fn register(&mut self, conn: ConnectionId, user: User) -> Result<(), RegistryError> {
        match self.sessions.entry(conn) {
            Entry::Occupied(occupied) => {
                Err(RegistryError::AlreadyRegistered(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => {
                debug!(connection = %vacant.key(), username = %user.username, "Connection registered");
                vacant.insert(SessionEntry {
                    user,
                    current_room: None,
                });
                Ok(())
            }
        }
    }

    /// Remove a connection, returning its identity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the connection is not registered; callers
    /// tolerate this silently to survive disconnect races.
    pub fn unregister(&mut self, conn: &ConnectionId) -> Result<User, RegistryError> {
        let entry = self
            .sessions
            .remove(conn)
            .ok_or_else(|| RegistryError::NotFound(conn.clone()))?;
        debug!(connection = %conn, username = %entry.user.username, "Connection unregistered");
        Ok(entry.user)
    }

    /// Set or clear a connection's current room.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the connection is not registered.
    pub fn set_room(
        &mut self,
        conn: &ConnectionId,
        room: Option<String>,
    ) -> Result<(), RegistryError> {
        let entry = self
            .sessions
            .get_mut(conn)
            .ok_or_else(|| RegistryError::NotFound(conn.clone()))?;
        entry.current_room = room;
        Ok(())
    }

    /// The connection's current room, if it has joined one.
    #[must_use]
    pub fn current_room(&self, conn: &ConnectionId) -> Option<&str> {
        self.sessions.get(conn)?.current_room.as_deref()
    }

    /// The connection's username.
    #[must_use]
    pub fn username(&self, conn: &ConnectionId) -> Option<&str> {
        self.sessions.get(conn).map(|e| e.user.username.as_str())
    }

    /// Usernames of all live connections, in registry order.
    #[must_use]
    pub fn snapshot_usernames(&self) -> Vec<String> {
        self.sessions
            .values()
            .map(|e| e.user.username.clone())
            .collect()
    }

    /// First connection whose username matches, in registry order.
    ///
    /// Usernames are not enforced unique; the first match wins.
    #[must_use]
    pub fn find_by_username(&self, username: &str) -> Option<&ConnectionId> {
        self.sessions
            .iter()
            .find(|(_, entry)| entry.user.username == username)
            .map(|(conn, _)| conn)
    }

    /// Connections whose current room equals `room`.
    ///
    /// Membership is derived from session state on every call, so it can
    /// never drift from the registry.
    #[must_use]
    pub fn connections_in(&self, room: &str) -> Vec<ConnectionId> {
        self.sessions
            .iter()
            .filter(|(_, entry)| entry.current_room.as_deref() == Some(room))
            .map(|(conn, _)| conn.clone())
            .collect()
    }

    /// All live connection IDs, in registry order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.keys().cloned().collect()
    }
}
