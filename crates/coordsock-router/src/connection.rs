//! Registered client connections

use bytes::Bytes;
use coordsock_core::ClientId;
use coordsock_transport::{TransportError, TransportSender};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::notify;

/// A connected client.
///
/// The lifecycle task owns the connection; the registry only holds a shared
/// handle used for dispatch.
pub struct Connection {
    /// Identifier the client registered under
    pub id: ClientId,
    /// Unique per connection, so two connections that used the same
    /// identifier can be told apart
    pub session: String,
    /// Peer address, when the transport knows it
    pub remote_addr: Option<SocketAddr>,
    /// Transport sender for this connection
    sender: Arc<dyn TransportSender>,
    /// Connection time
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(
        id: impl Into<ClientId>,
        sender: Arc<dyn TransportSender>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            id: id.into(),
            session: Uuid::new_v4().to_string(),
            remote_addr,
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Queue a payload on this connection
    pub async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        self.sender.send(data).await
    }

    /// Send an `{"error": ...}` payload, ignoring delivery failures
    pub async fn notify(&self, text: &str) {
        notify::notify(self.sender.as_ref(), text).await;
    }

    /// Close the underlying channel
    pub async fn close(&self) -> Result<(), TransportError> {
        self.sender.close().await
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Same connection, not merely the same identifier
    pub fn is_same(&self, other: &Connection) -> bool {
        self.session == other.session
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("session", &self.session)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}
