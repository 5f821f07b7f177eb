//! coordsock JSON Codec
//!
//! Inbound and outbound payloads share one JSON shape per kind:
//! - [`Message`]: `{"to","from","xval","yval","gestval","xdim","ydim"}`
//! - [`ErrorResponse`]: `{"error"}`
//!
//! Relayed messages are forwarded as the original bytes, so the codec is
//! only used to inspect them, never to re-encode them on the routing path.

use bytes::Bytes;

use crate::error::{ParseError, Result};
use crate::types::{ErrorResponse, Inbound, Message};

/// Parse an inbound payload into a [`Message`].
///
/// Rejects anything that is not JSON for the message schema and any message
/// whose `from` or `to` is absent or empty.
pub fn parse(raw: &[u8]) -> std::result::Result<Message, ParseError> {
    let message: Message = serde_json::from_slice(raw)?;

    if message.from.is_empty() {
        return Err(ParseError::missing_sender());
    }
    if message.to.is_empty() {
        return Err(ParseError::missing_recipient());
    }

    Ok(message)
}

/// Encode a message to its wire form
pub fn encode(message: &Message) -> Result<Bytes> {
    let bytes = serde_json::to_vec(message)?;
    Ok(Bytes::from(bytes))
}

/// Encode an `{"error": ...}` payload
pub fn encode_error(text: &str) -> Result<Bytes> {
    let bytes = serde_json::to_vec(&ErrorResponse::new(text))?;
    Ok(Bytes::from(bytes))
}

/// Classify a payload received by a client.
///
/// Error payloads are recognised by their `error` key; everything else that
/// parses as a message is treated as one.
pub fn decode_inbound(raw: &[u8]) -> Inbound {
    let value: serde_json::Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(_) => return Inbound::Unrecognized(Bytes::copy_from_slice(raw)),
    };

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Inbound::Error(error.to_string());
    }

    match serde_json::from_value::<Message>(value) {
        Ok(message) if !message.from.is_empty() => Inbound::Message(message),
        _ => Inbound::Unrecognized(Bytes::copy_from_slice(raw)),
    }
}
