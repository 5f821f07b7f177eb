//! coordsock Transport Layer
//!
//! This crate provides the transport boundary for the relay:
//! - Sender/receiver/server traits the router is written against
//! - WebSocket (default), server and client side

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{
    ConnectRequest, Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer, WebSocketTransport,
};
