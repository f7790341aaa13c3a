//! # banter-protocol
//!
//! Wire event definitions for the banter chat relay.
//!
//! This crate defines the JSON events exchanged between clients and the
//! relay, and the codec that encodes/decodes them.
//!
//! ## Events
//!
//! - `Join` / `Leave` - Room membership requests
//! - `Message` - Public (room) or private (direct) chat text
//! - `OnlineUsers` - Presence snapshot pushed on connect/disconnect
//! - `Status` / `ChatHistory` - Room notices and history replay
//!
//! ## Example
//!
//! ```rust
//! use banter_protocol::{codec, ClientEvent};
//!
//! let event = codec::decode(r#"{"event":"join","room":"General"}"#).unwrap();
//! assert_eq!(event, ClientEvent::Join { room: "General".to_string() });
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode, encode, ProtocolError};
pub use events::{
    ClientEvent, MessageKind, MessagePayload, PrivateMessage, PublicMessage, ServerEvent,
    StatusKind, StatusMessage, Timestamp,
};
