//! Codec for encoding and decoding banter events.
//!
//! Events travel as JSON text frames; the transport provides framing, so the
//! codec only converts between text and typed events.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Outbound event could not be serialized.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound frame was not a valid client event.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode an outbound event as a JSON text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode an inbound JSON text frame into a client event.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON or does not match any
/// known event shape.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}
