//! Router error types
//!
//! The display text of every rejection variant is what the originating
//! client receives in its `{"error": ...}` payload.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    /// Upgrade request carried no usable `id`
    #[error("Client ID required")]
    ClientIdRequired,

    #[error("Client {0} is already connected")]
    IdentifierInUse(String),

    #[error("Relay is full")]
    RegistryFull { max: usize },

    /// Sent to a connection displaced by a newer one with the same identifier
    #[error("Replaced by a newer connection")]
    Replaced,

    #[error("Invalid message format: {0}")]
    Parse(#[from] coordsock_core::ParseError),

    #[error("Sender and recipient cannot be the same")]
    SelfAddressed,

    #[error("Target client {0} does not exist")]
    UnknownRecipient(String),

    #[error("{0}")]
    Validation(#[from] coordsock_core::ValidationError),

    #[error("client {0} not found")]
    ClientNotFound(String),

    /// Recipient vanished or could not take the payload
    #[error("Failed to deliver message to {to}")]
    Dispatch { to: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] coordsock_transport::TransportError),
}
