//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    /// No identifier was given to the builder
    #[error("client id required")]
    MissingId,

    #[error("not connected")]
    NotConnected,

    #[error("timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] coordsock_core::Error),

    /// Connecting failed, or the connection could not take a payload
    #[error("transport error: {0}")]
    Transport(#[from] coordsock_transport::TransportError),
}
