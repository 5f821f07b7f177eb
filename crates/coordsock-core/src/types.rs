//! Wire types and message definitions

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::BROADCAST_ADDRESS;

/// Client identifier chosen by the client at connect time
pub type ClientId = String;

/// A coordinate/gesture event addressed to another client.
///
/// Every field is optional on the wire: missing numbers decode as `0.0` and
/// missing strings as empty, which the codec and [`Message::validate`] then
/// reject where required.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Recipient identifier, or [`BROADCAST_ADDRESS`]
    #[serde(default)]
    pub to: ClientId,
    /// Sender identifier
    #[serde(default)]
    pub from: ClientId,
    #[serde(default)]
    pub xval: f64,
    #[serde(default)]
    pub yval: f64,
    /// Gesture name (e.g. "tap", "swipe")
    #[serde(default)]
    pub gestval: String,
    /// Width of the sender's drawing surface
    #[serde(default)]
    pub xdim: f64,
    /// Height of the sender's drawing surface
    #[serde(default)]
    pub ydim: f64,
}

impl Message {
    pub fn new(from: impl Into<ClientId>, to: impl Into<ClientId>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.xval = x;
        self.yval = y;
        self
    }

    pub fn with_gesture(mut self, gesture: impl Into<String>) -> Self {
        self.gestval = gesture.into();
        self
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.xdim = width;
        self.ydim = height;
        self
    }

    /// Addressed to the reserved broadcast recipient
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDRESS
    }

    pub fn is_self_addressed(&self) -> bool {
        self.to == self.from
    }

    /// Semantic checks run before a single-recipient dispatch.
    ///
    /// Order matters: the first failing rule is the one reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from.is_empty() {
            return Err(ValidationError::MissingSender);
        }
        if self.to.is_empty() {
            return Err(ValidationError::MissingRecipient);
        }
        if self.xval == 0.0 && self.yval == 0.0 {
            return Err(ValidationError::ZeroCoordinates);
        }
        if self.gestval.is_empty() {
            return Err(ValidationError::MissingGesture);
        }
        Ok(())
    }
}

/// Error payload sent back to the originating client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A payload as seen by a client
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A relayed coordinate/gesture message
    Message(Message),
    /// The relay rejected something this client sent
    Error(String),
    /// Anything that is neither of the above
    Unrecognized(Bytes),
}
