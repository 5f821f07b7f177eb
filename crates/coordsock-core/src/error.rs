//! Error types for coordsock

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound payload could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Message failed a routing-time check
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// JSON encoding error
    #[error("encode error: {0}")]
    EncodeError(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::EncodeError(e.to_string())
    }
}

/// Rejections raised while decoding an inbound payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not well-formed JSON for the message schema (type mismatch, truncation)
    #[error("{0}")]
    Malformed(String),

    /// `from` or `to` was absent or empty
    #[error("{role} ({field}) is required")]
    MissingField {
        field: &'static str,
        role: &'static str,
    },
}

impl ParseError {
    pub fn missing_sender() -> Self {
        ParseError::MissingField {
            field: "from",
            role: "sender",
        }
    }

    pub fn missing_recipient() -> Self {
        ParseError::MissingField {
            field: "to",
            role: "recipient",
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Malformed(e.to_string())
    }
}

/// Semantic rejections applied before a message is dispatched.
///
/// The display strings are sent verbatim to the originating client.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("from field is required")]
    MissingSender,

    #[error("to field is required")]
    MissingRecipient,

    /// Both coordinates are exactly zero
    #[error("invalid coordinate values")]
    ZeroCoordinates,

    #[error("gesture value is required")]
    MissingGesture,
}
