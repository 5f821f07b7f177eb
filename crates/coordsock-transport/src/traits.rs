//! Transport trait definitions

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

use crate::error::Result;

/// Events that can occur on a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Connection closed (clean or error)
    Disconnected { reason: Option<String> },
    /// Payload received
    Data(Bytes),
}

/// What the server learned from an inbound upgrade request
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Peer address
    pub remote_addr: SocketAddr,
    /// Request path
    pub path: String,
    /// Value of the `id` query parameter, if one was supplied
    pub client_id: Option<String>,
}

impl ConnectRequest {
    /// The client identifier, if present and non-empty
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Trait for sending payloads
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Queue a payload for delivery.
    ///
    /// Implementations must not block on a slow peer.
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Trait for receiving data
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Client-side transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// The sender type for this transport
    type Sender: TransportSender;
    /// The receiver type for this transport
    type Receiver: TransportReceiver;

    /// Connect to a remote endpoint
    async fn connect(addr: &str) -> Result<(Self::Sender, Self::Receiver)>
    where
        Self: Sized;
}

/// Trait for transport servers (listeners)
#[async_trait]
pub trait TransportServer: Send + Sync {
    /// The sender type for accepted connections
    type Sender: TransportSender;
    /// The receiver type for accepted connections
    type Receiver: TransportReceiver;

    /// Next connection whose upgrade has completed
    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, ConnectRequest)>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Stop listening and release the bound address
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_id: Option<&str>) -> ConnectRequest {
        ConnectRequest {
            remote_addr: "127.0.0.1:9000".parse().unwrap(),
            path: "/ws".to_string(),
            client_id: client_id.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_client_id_is_absent() {
        assert_eq!(request(None).client_id(), None);
        assert_eq!(request(Some("")).client_id(), None);
        assert_eq!(request(Some("A")).client_id(), Some("A"));
    }
}
