//! coordsock Core
//!
//! Core types and the wire codec for the coordsock relay.
//!
//! This crate provides:
//! - The coordinate/gesture [`Message`] and the [`ErrorResponse`] payload
//! - JSON encoding/decoding ([`codec`])
//! - Parse-time and routing-time validation errors ([`ParseError`], [`ValidationError`])

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode_inbound, encode, encode_error, parse};
pub use error::{Error, ParseError, Result, ValidationError};
pub use types::{ClientId, ErrorResponse, Inbound, Message};

/// Reserved recipient that fans a message out to every other client
pub const BROADCAST_ADDRESS: &str = "all";

/// Default listen address for the relay
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default WebSocket upgrade path
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Query parameter carrying the client identifier on the upgrade request
pub const CLIENT_ID_PARAM: &str = "id";
