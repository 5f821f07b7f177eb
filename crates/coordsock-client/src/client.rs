//! Main client implementation

use bytes::Bytes;
use coordsock_core::{codec, ClientId, Inbound, Message};
use coordsock_transport::{
    TransportEvent, TransportReceiver, TransportSender, WebSocketConfig, WebSocketSender,
    WebSocketTransport,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use url::Url;

use crate::builder::ClientBuilder;
use crate::error::{ClientError, Result};

/// Inbound payloads buffered before the reader task waits
const INBOUND_BUFFER: usize = 256;

/// A relay client registered under one identifier
pub struct Client {
    id: ClientId,
    url: Url,
    sender: WebSocketSender,
    inbound: Mutex<mpsc::Receiver<Inbound>>,
    connected: Arc<RwLock<bool>>,
}

impl Client {
    /// Create a builder
    pub fn builder(base_url: &str) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Connect to `base_url` as `id` (convenience method)
    pub async fn connect(base_url: &str, id: &str) -> Result<Self> {
        ClientBuilder::new(base_url).id(id).connect().await
    }

    pub(crate) async fn open(id: ClientId, url: Url, config: WebSocketConfig) -> Result<Self> {
        let transport = WebSocketTransport::with_config(config);
        let (sender, mut receiver) = transport.open(url.as_str()).await?;

        info!("Connected to {} as {}", url, id);

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let connected = Arc::new(RwLock::new(true));

        let connected_read = connected.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match event {
                    TransportEvent::Data(data) => {
                        if tx.send(codec::decode_inbound(&data)).await.is_err() {
                            break;
                        }
                    }
                    TransportEvent::Disconnected { reason } => {
                        debug!("Disconnected: {:?}", reason);
                        break;
                    }
                    TransportEvent::Connected => {}
                }
            }
            *connected_read.write() = false;
        });

        Ok(Self {
            id,
            url,
            sender,
            inbound: Mutex::new(rx),
            connected,
        })
    }

    /// Identifier this client registered under
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.read() && self.sender.is_connected()
    }

    /// Send a message
    pub async fn send(&self, message: &Message) -> Result<()> {
        let data = codec::encode(message)?;
        self.send_raw(data).await
    }

    /// Send a payload exactly as given
    pub async fn send_raw(&self, data: impl Into<Bytes>) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.sender.send(data.into()).await?;
        Ok(())
    }

    /// Next inbound payload; `None` once the connection is gone and drained
    pub async fn recv(&self) -> Option<Inbound> {
        self.inbound.lock().await.recv().await
    }

    /// Like [`Client::recv`], giving up after `limit`
    pub async fn recv_timeout(&self, limit: Duration) -> Result<Option<Inbound>> {
        tokio::time::timeout(limit, self.recv())
            .await
            .map_err(|_| ClientError::Timeout)
    }

    /// Close connection
    pub async fn close(&self) {
        let _ = self.sender.close().await;
        *self.connected.write() = false;
    }
}
