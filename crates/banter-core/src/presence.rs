//! Presence snapshots for the banter relay.
//!
//! Presence is a pure view of the connection registry; the registry is the
//! single source of truth, so there is no separate state to keep in sync.

use banter_protocol::ServerEvent;

use crate::registry::ConnectionRegistry;

/// Build the online-users event from current registry state.
///
/// The gateway calls this after every mutation that changes membership
/// (connect and disconnect). Join and leave only change rooms and do not
/// produce a snapshot.
#[must_use]
pub fn online_users(registry: &ConnectionRegistry) -> ServerEvent {
    ServerEvent::OnlineUsers {
        users: registry.snapshot_usernames(),
    }
}
