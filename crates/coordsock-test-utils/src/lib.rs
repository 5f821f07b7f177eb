//! Common test helpers and utilities for coordsock tests
//!
//! - Condition-based waiting (no hardcoded sleeps)
//! - A relay on an ephemeral port that shuts down on drop
//! - Clients that are known to be registered before they are handed out

use coordsock_client::{Client, ClientError};
use coordsock_core::Inbound;
use coordsock_router::{Router, RouterConfig};
use coordsock_transport::{TransportServer, WebSocketServer};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// How long to listen before concluding nothing is coming
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Next payload for `client`, failing the test if none arrives in time
pub async fn expect_inbound(client: &Client) -> Inbound {
    match client.recv_timeout(DEFAULT_TIMEOUT).await {
        Ok(Some(inbound)) => inbound,
        Ok(None) => panic!("{}: connection closed while waiting", client.id()),
        Err(_) => panic!("{}: nothing received within {:?}", client.id(), DEFAULT_TIMEOUT),
    }
}

/// Next payload for `client`, which must be an error notification
pub async fn expect_error(client: &Client) -> String {
    match expect_inbound(client).await {
        Inbound::Error(text) => text,
        other => panic!("{}: expected an error, got {:?}", client.id(), other),
    }
}

/// True if `client` receives nothing during [`QUIET_PERIOD`]
pub async fn stays_quiet(client: &Client) -> bool {
    matches!(
        client.recv_timeout(QUIET_PERIOD).await,
        Err(ClientError::Timeout)
    )
}

// ============================================================================
// Test Relay - RAII wrapper with proper cleanup
// ============================================================================

/// A relay on an ephemeral local port that stops on drop
pub struct TestRelay {
    addr: SocketAddr,
    router: Router,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestRelay {
    /// Start a relay with default configuration
    pub async fn start() -> Self {
        Self::start_with_config(RouterConfig {
            name: "Test Relay".to_string(),
            ..Default::default()
        })
        .await
    }

    /// Start a relay with custom configuration
    pub async fn start_with_config(config: RouterConfig) -> Self {
        let server = WebSocketServer::bind("127.0.0.1:0")
            .await
            .expect("bind test relay")
            .with_config(config.websocket.clone());
        let addr = server.local_addr().expect("test relay address");

        let router = Router::new(config);
        let serving = router.clone();
        let handle = tokio::spawn(async move {
            let _ = serving.serve_on(server).await;
        });

        let running = router.clone();
        let ready = wait_for(
            || {
                let running = running.clone();
                async move { running.is_running() }
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await;
        assert!(ready, "test relay did not start");

        Self {
            addr,
            router,
            handle: Some(handle),
        }
    }

    /// Base URL, without path
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Full endpoint URL for `id`
    pub fn client_url(&self, id: &str) -> String {
        format!("ws://{}/ws?id={}", self.addr, id)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Connect as `id` and wait until the relay has registered it
    pub async fn connect(&self, id: &str) -> Client {
        let client = Client::connect(&self.url(), id)
            .await
            .unwrap_or_else(|e| panic!("connect {}: {}", id, e));
        assert!(
            self.wait_registered(id).await,
            "{} was not registered in time",
            id
        );
        client
    }

    /// Wait until `id` is in the registry
    pub async fn wait_registered(&self, id: &str) -> bool {
        let registry = self.router.registry().clone();
        let id = id.to_string();
        wait_for(
            || {
                let registry = registry.clone();
                let id = id.clone();
                async move { registry.contains(&id) }
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await
    }

    /// Wait until `id` is no longer in the registry
    pub async fn wait_unregistered(&self, id: &str) -> bool {
        let registry = self.router.registry().clone();
        let id = id.to_string();
        wait_for(
            || {
                let registry = registry.clone();
                let id = id.clone();
                async move { !registry.contains(&id) }
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await
    }

    /// Stop the relay and its connections
    pub fn stop(&mut self) {
        self.router.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.stop();
    }
}
