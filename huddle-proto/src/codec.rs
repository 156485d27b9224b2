//! Serialization and deserialization for the Huddle wire protocol.
//!
//! Frames are JSON text; one envelope per WebSocket text frame. The relay
//! decodes [`ClientEvent`]s and encodes [`ServerEvent`]s; the mirror pair
//! exists for clients and test harnesses.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::signal::{ClientEvent, ServerEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Decodes a [`ClientEvent`] from a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the text is not a well-formed
/// envelope: unknown event name, missing or mistyped fields, or invalid JSON.
pub fn decode_client(text: &str) -> Result<ClientEvent, CodecError> {
    decode(text)
}

/// Encodes a [`ClientEvent`] into a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be serialized.
pub fn encode_client(event: &ClientEvent) -> Result<String, CodecError> {
    encode(event)
}

/// Decodes a [`ServerEvent`] from a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the text is not a well-formed
/// envelope.
pub fn decode_server(text: &str) -> Result<ServerEvent, CodecError> {
    decode(text)
}

/// Encodes a [`ServerEvent`] into a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the event cannot be serialized.
pub fn encode_server(event: &ServerEvent) -> Result<String, CodecError> {
    encode(event)
}

fn encode<T: Serialize>(event: &T) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}
