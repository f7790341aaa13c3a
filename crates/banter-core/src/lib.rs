//! # banter-core
//!
//! Connection, session, and room coordination for the banter chat relay.
//!
//! This crate provides the relay's coordination core:
//!
//! - **ConnectionRegistry** - Authoritative map of live connections to
//!   identities and current rooms
//! - **RoomDirectory** - Fixed room set with bounded message history
//! - **Presence** - Online-user snapshots
//! - **MessageRouter** - Validation and dispatch of chat events
//! - **EventGateway** - The single serialization point at the boundary
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Transport  │────▶│   Gateway   │────▶│    Router    │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌──────────────┐
//!                     │  Registry   │     │  Directory   │
//!                     └─────────────┘     └──────────────┘
//! ```
//!
//! The gateway holds the one lock guarding registry and directory state.
//! Every event handler resolves its full recipient set inside that critical
//! section and returns [`Outbound`] batches for the caller to deliver after
//! the lock is released.

pub mod gateway;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod router;

pub use gateway::EventGateway;
pub use registry::{ConnectionId, ConnectionRegistry, RegistryError, User};
pub use rooms::{DirectoryError, RoomDirectory};
pub use router::Outbound;
