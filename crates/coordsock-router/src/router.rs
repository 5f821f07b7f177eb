//! Router entry point
//!
//! The router is transport-agnostic: it accepts connections from any
//! `TransportServer`, and ships with a WebSocket listener. Each accepted
//! connection gets its own lifecycle task; they share one registry.

use bytes::Bytes;
use coordsock_transport::{
    ConnectRequest, TransportReceiver, TransportSender, TransportServer, WebSocketConfig,
    WebSocketServer,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::lifecycle::LifecycleManager;
use crate::registry::{DuplicatePolicy, Registry};
use crate::routing::RoutingEngine;

pub const DEFAULT_MAX_CLIENTS: usize = 1024;

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Server name, used in logs
    pub name: String,
    /// Maximum registered clients
    pub max_clients: usize,
    /// Handling of a second connection with an identifier already in use
    pub duplicate_policy: DuplicatePolicy,
    /// Apply message validation to broadcasts as well as unicasts
    pub validate_broadcast: bool,
    /// Close connections that send nothing for this long
    pub idle_timeout: Option<Duration>,
    /// Listener settings
    pub websocket: WebSocketConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "coordsock relay".to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
            duplicate_policy: DuplicatePolicy::default(),
            validate_broadcast: false,
            idle_timeout: None,
            websocket: WebSocketConfig::default(),
        }
    }
}

/// coordsock router
#[derive(Clone)]
pub struct Router {
    config: RouterConfig,
    registry: Arc<Registry>,
    engine: Arc<RoutingEngine>,
    /// Flipped to true once by [`Router::stop`]
    shutdown: Arc<watch::Sender<bool>>,
    running: Arc<RwLock<bool>>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let registry = Arc::new(Registry::new(config.max_clients));
        let engine = Arc::new(
            RoutingEngine::new(registry.clone()).with_broadcast_validation(config.validate_broadcast),
        );
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            registry,
            engine,
            shutdown: Arc::new(shutdown),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Serve using any TransportServer implementation.
    ///
    /// Returns after [`Router::stop`] is called, with the listener closed.
    ///
    /// ```no_run
    /// use coordsock_router::Router;
    /// use coordsock_transport::WebSocketServer;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let router = Router::default();
    /// let server = WebSocketServer::bind("0.0.0.0:8080").await?;
    /// router.serve_on(server).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        let mut stop = self.shutdown.subscribe();
        if *stop.borrow() {
            return Ok(());
        }

        info!("{} accepting connections", self.config.name);
        *self.running.write() = true;

        let outcome = loop {
            tokio::select! {
                _ = stop.changed() => break Ok(()),
                accepted = server.accept() => match accepted {
                    Ok((sender, receiver, request)) => {
                        self.accept_connection(Arc::new(sender), receiver, request);
                    }
                    // The listener is gone; nothing more will arrive
                    Err(e) => {
                        error!("Accept error: {}", e);
                        break Err(e.into());
                    }
                },
            }
        };

        *self.running.write() = false;
        if let Err(e) = server.close().await {
            warn!("Failed to close listener: {}", e);
        }
        info!("{} stopped", self.config.name);
        outcome
    }

    /// Bind a WebSocket listener on `addr` and serve on it
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr)
            .await?
            .with_config(self.config.websocket.clone());
        self.serve_on(server).await
    }

    /// Start the lifecycle task for an accepted connection
    pub fn accept_connection<R>(
        &self,
        sender: Arc<dyn TransportSender>,
        receiver: R,
        request: ConnectRequest,
    ) where
        R: TransportReceiver + 'static,
    {
        let lifecycle = LifecycleManager::new(
            self.engine.clone(),
            self.config.duplicate_policy,
            self.config.idle_timeout,
            self.shutdown.subscribe(),
        );
        tokio::spawn(lifecycle.run(sender, receiver, request));
    }

    /// Queue a payload on a registered client
    pub async fn send_message_to_client(&self, id: &str, payload: Bytes) -> Result<()> {
        self.engine.send_message_to_client(id, payload).await
    }

    /// Stop accepting and close every connection
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSender, ScriptedReceiver};
    use coordsock_transport::TransportEvent;

    fn request(id: &str) -> ConnectRequest {
        ConnectRequest {
            remote_addr: "127.0.0.1:40000".parse().unwrap(),
            path: "/ws".to_string(),
            client_id: Some(id.to_string()),
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        while !check() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.max_clients, 1024);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert!(!config.validate_broadcast);
        assert!(config.idle_timeout.is_none());
        assert_eq!(config.websocket.path, "/ws");
    }

    #[tokio::test]
    async fn test_accepted_connection_registers_and_routes() {
        let router = Router::default();

        let a = RecordingSender::new();
        let (a_events, a_rx) = ScriptedReceiver::new();
        router.accept_connection(Arc::new(a.clone()), a_rx, request("A"));

        let b = RecordingSender::new();
        let (_b_events, b_rx) = ScriptedReceiver::new();
        router.accept_connection(Arc::new(b.clone()), b_rx, request("B"));

        wait_until(|| router.client_count() == 2).await;

        let msg = r#"{"to":"B","from":"A","xval":1,"yval":1,"gestval":"tap"}"#;
        a_events
            .send(TransportEvent::Data(Bytes::from(msg)))
            .unwrap();
        wait_until(|| !b.sent().is_empty()).await;
        assert_eq!(b.texts(), vec![msg]);

        drop(a_events);
        wait_until(|| router.client_count() == 1).await;
        assert!(router.registry().contains("B"));
        assert!(a.is_closed());
    }

    #[tokio::test]
    async fn test_send_message_to_client() {
        let router = Router::default();
        let a = RecordingSender::new();
        let (_events, rx) = ScriptedReceiver::new();
        router.accept_connection(Arc::new(a.clone()), rx, request("A"));
        wait_until(|| router.client_count() == 1).await;

        router
            .send_message_to_client("A", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(a.texts(), vec!["{}"]);

        assert!(router
            .send_message_to_client("B", Bytes::from_static(b"{}"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stop_closes_connections() {
        let router = Router::default();
        let a = RecordingSender::new();
        let (_events, rx) = ScriptedReceiver::new();
        router.accept_connection(Arc::new(a.clone()), rx, request("A"));
        wait_until(|| router.client_count() == 1).await;

        router.stop();

        wait_until(|| router.client_count() == 0).await;
        assert!(a.is_closed());
        assert!(!router.is_running());
    }
}
