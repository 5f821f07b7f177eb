//! WebSocket transport implementation
//!
//! Each connection is split into a reader task and a writer task. Outbound
//! payloads go through a bounded queue that is filled without waiting, so a
//! slow peer costs its own queue space and never the caller's time.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    accept_hdr_async_with_config, connect_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request as HsRequest, Response as HsResponse},
        http::StatusCode,
        protocol::{Message as WsMessage, WebSocketConfig as ProtocolConfig},
    },
    WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{
    ConnectRequest, Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

use coordsock_core::{CLIENT_ID_PARAM, DEFAULT_WS_PATH};

/// Inbound events buffered per connection before the reader waits
const EVENT_BUFFER: usize = 100;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Upgrade path accepted by the server; empty accepts any path
    pub path: String,
    /// Maximum inbound message size
    pub max_message_size: usize,
    /// Outbound payloads queued per connection before sends fail
    pub outbound_queue: usize,
    /// Deadline for writing a single frame to the socket
    pub write_timeout: Option<Duration>,
    /// Deadline for completing the upgrade handshake
    pub handshake_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_WS_PATH.to_string(),
            max_message_size: 64 * 1024, // 64KB
            outbound_queue: 100,
            write_timeout: Some(Duration::from_secs(5)),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl WebSocketConfig {
    fn protocol_config(&self) -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);
        config
    }
}

/// WebSocket transport (client side)
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            config: WebSocketConfig::default(),
        }
    }

    pub fn with_config(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Connect using this transport's configuration
    pub async fn open(&self, url: &str) -> Result<(WebSocketSender, WebSocketReceiver)> {
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        Ok(spawn_pumps(ws_stream, &self.config, url.to_string()))
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        WebSocketTransport::new().open(url).await
    }
}

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
    shutdown: Arc<Notify>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        // Payloads are JSON, so this is a text frame unless a peer sent
        // us something that was never UTF-8 to begin with.
        let frame = match String::from_utf8(data.to_vec()) {
            Ok(text) => WsMessage::Text(text),
            Err(e) => WsMessage::Binary(e.into_bytes()),
        };

        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure,
            TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.try_send(WsMessage::Close(None));
        *self.connected.lock() = false;
        self.shutdown.notify_one();
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Split an upgraded stream into a reader task and a writer task.
fn spawn_pumps<S>(
    ws_stream: WebSocketStream<S>,
    config: &WebSocketConfig,
    peer: String,
) -> (WebSocketSender, WebSocketReceiver)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (write, read) = ws_stream.split();

    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(config.outbound_queue.max(1));
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_BUFFER);

    let connected = Arc::new(Mutex::new(true));
    let shutdown = Arc::new(Notify::new());

    // Writer task
    let connected_write = connected.clone();
    let shutdown_write = shutdown.clone();
    let write_timeout = config.write_timeout;
    let writer_peer = peer.clone();
    tokio::spawn(async move {
        let mut write = write;
        while let Some(msg) = send_rx.recv().await {
            let closing = matches!(msg, WsMessage::Close(_));

            let result = match write_timeout {
                Some(limit) => match tokio::time::timeout(limit, write.send(msg)).await {
                    Ok(sent) => sent.map_err(TransportError::from),
                    Err(_) => Err(TransportError::Timeout),
                },
                None => write.send(msg).await.map_err(TransportError::from),
            };

            if let Err(e) = result {
                warn!("WebSocket write error to {}: {}", writer_peer, e);
                break;
            }
            if closing {
                break;
            }
        }
        *connected_write.lock() = false;
        shutdown_write.notify_one();
    });

    // Reader task
    let connected_read = connected.clone();
    let shutdown_read = shutdown.clone();
    tokio::spawn(async move {
        let mut read = read;

        let _ = event_tx.send(TransportEvent::Connected).await;

        loop {
            let next = tokio::select! {
                _ = shutdown_read.notified() => {
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some("connection closed locally".to_string()),
                        })
                        .await;
                    break;
                }
                next = read.next() => next,
            };

            match next {
                Some(Ok(WsMessage::Text(text))) => {
                    if event_tx.send(TransportEvent::Data(Bytes::from(text))).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    if event_tx.send(TransportEvent::Data(Bytes::from(data))).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    debug!("WebSocket {} closed: {:?}", peer, reason);
                    let _ = event_tx
                        .send(TransportEvent::Disconnected { reason })
                        .await;
                    break;
                }
                // Pings are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket read error from {}: {}", peer, e);
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
                None => {
                    let _ = event_tx
                        .send(TransportEvent::Disconnected { reason: None })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    let sender = WebSocketSender {
        tx: send_tx,
        connected,
        shutdown,
    };

    let receiver = WebSocketReceiver { rx: event_rx };

    (sender, receiver)
}

/// Extract the client identifier from a query string
fn client_id_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CLIENT_ID_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Upgraded connections waiting for `accept`
const ACCEPT_BACKLOG: usize = 64;

/// Pause after a failed TCP accept (e.g. out of file descriptors)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type Accepted = (WebSocketSender, WebSocketReceiver, ConnectRequest);

/// WebSocket server
///
/// The listener is driven by a background task started on the first
/// `accept`. Every TCP connection is upgraded in its own task, so a peer
/// that never finishes the handshake only ever holds up itself.
pub struct WebSocketServer {
    local_addr: SocketAddr,
    listener: Mutex<Option<tokio::net::TcpListener>>,
    config: WebSocketConfig,
    incoming: Option<mpsc::Receiver<Accepted>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let local_addr = listener.local_addr()?;

        info!("WebSocket server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            config: WebSocketConfig::default(),
            incoming: None,
            acceptor: Mutex::new(None),
        })
    }

    /// Takes effect for connections accepted after the first `accept`
    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }

    fn start(&mut self) -> Result<mpsc::Receiver<Accepted>> {
        let listener = self.listener.lock().take().ok_or(TransportError::NotConnected)?;
        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        let config = Arc::new(self.config.clone());

        let handle = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("TCP accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };
                if tx.is_closed() {
                    break;
                }

                debug!("Accepted TCP connection from {}", addr);

                let tx = tx.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    match upgrade(stream, addr, &config).await {
                        Ok(accepted) => {
                            let _ = tx.send(accepted).await;
                        }
                        Err(e) => debug!("Handshake with {} failed: {}", addr, e),
                    }
                });
            }
        });

        *self.acceptor.lock() = Some(handle);
        Ok(rx)
    }
}

impl Drop for WebSocketServer {
    fn drop(&mut self) {
        if let Some(handle) = self.acceptor.lock().take() {
            handle.abort();
        }
    }
}

/// Run the upgrade handshake for one TCP connection
async fn upgrade(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    config: &WebSocketConfig,
) -> Result<Accepted> {
    let expected_path = config.path.as_str();
    let mut request_path = String::new();
    let mut client_id = None;

    let handshake = accept_hdr_async_with_config(
        stream,
        |req: &HsRequest, response: HsResponse| {
            let uri = req.uri();
            request_path = uri.path().to_string();

            if !expected_path.is_empty() && uri.path() != expected_path {
                let mut rejection: ErrorResponse =
                    ErrorResponse::new(Some(format!("no endpoint at {}", uri.path())));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                return Err(rejection);
            }

            client_id = uri.query().and_then(client_id_from_query);
            Ok(response)
        },
        Some(config.protocol_config()),
    );

    let ws_stream = tokio::time::timeout(config.handshake_timeout, handshake)
        .await
        .map_err(|_| TransportError::Timeout)??;

    info!("WebSocket client connected from {} ({})", addr, request_path);

    let (sender, receiver) = spawn_pumps(ws_stream, config, addr.to_string());

    let request = ConnectRequest {
        remote_addr: addr,
        path: request_path,
        client_id,
    };

    Ok((sender, receiver, request))
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, ConnectRequest)> {
        if self.incoming.is_none() {
            self.incoming = Some(self.start()?);
        }
        match self.incoming.as_mut() {
            Some(incoming) => incoming.recv().await.ok_or(TransportError::ConnectionClosed),
            None => Err(TransportError::NotConnected),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    /// Stop listening; the port is released once this returns.
    ///
    /// Connections already handed out by `accept` are unaffected.
    async fn close(&self) -> Result<()> {
        self.listener.lock().take();
        let acceptor = self.acceptor.lock().take();
        if let Some(handle) = acceptor {
            handle.abort();
            let _ = handle.await;
        }
        info!("WebSocket server on {} closed", self.local_addr);
        Ok(())
    }
}
