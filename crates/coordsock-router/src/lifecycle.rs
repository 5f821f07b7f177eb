//! Per-connection lifecycle
//!
//! `Connecting → Registered → Serving → Closing → Closed`
//!
//! One lifecycle runs per accepted connection, in its own task. It owns the
//! registration for as long as it is serving and always releases it on the
//! way out, whatever ended the connection.

use coordsock_transport::{ConnectRequest, TransportEvent, TransportReceiver, TransportSender};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::error::Elapsed;
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::error::RouterError;
use crate::notify::notify;
use crate::registry::{DuplicatePolicy, Registration};
use crate::routing::RoutingEngine;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade accepted, identifier not yet checked
    Connecting,
    Registered,
    /// Receiving and routing messages
    Serving,
    Closing,
    Closed,
}

/// Drives a single connection from accept to close
#[derive(Clone)]
pub struct LifecycleManager {
    engine: Arc<RoutingEngine>,
    policy: DuplicatePolicy,
    idle_timeout: Option<Duration>,
    shutdown: watch::Receiver<bool>,
}

impl LifecycleManager {
    pub fn new(
        engine: Arc<RoutingEngine>,
        policy: DuplicatePolicy,
        idle_timeout: Option<Duration>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            policy,
            idle_timeout,
            shutdown,
        }
    }

    /// Run the connection to completion. Always ends in [`ConnectionState::Closed`].
    pub async fn run<R>(
        mut self,
        sender: Arc<dyn TransportSender>,
        mut receiver: R,
        request: ConnectRequest,
    ) -> ConnectionState
    where
        R: TransportReceiver,
    {
        let mut state = ConnectionState::Connecting;
        let peer = request.remote_addr;

        let Some(id) = request.client_id().map(str::to_string) else {
            warn!("Connection from {} rejected: no client id", peer);
            notify(sender.as_ref(), &RouterError::ClientIdRequired.to_string()).await;
            let _ = sender.close().await;
            transition(&mut state, ConnectionState::Closed, "-");
            return state;
        };

        let conn = Arc::new(Connection::new(id.clone(), sender, Some(peer)));

        match self.engine.registry().register(conn.clone(), self.policy) {
            Ok(Registration::Inserted) => {}
            Ok(Registration::Displaced(previous)) => {
                info!("Client {} reconnected from {}, closing previous connection", id, peer);
                previous.notify(&RouterError::Replaced.to_string()).await;
                let _ = previous.close().await;
            }
            Err(e) => {
                warn!("Client {} from {} refused: {}", id, peer, e);
                conn.notify(&e.to_string()).await;
                let _ = conn.close().await;
                transition(&mut state, ConnectionState::Closed, &id);
                return state;
            }
        }
        transition(&mut state, ConnectionState::Registered, &id);
        info!("Client {} connected from {}", id, peer);

        transition(&mut state, ConnectionState::Serving, &id);
        self.serve(&conn, &mut receiver).await;

        transition(&mut state, ConnectionState::Closing, &id);
        if !self.engine.registry().release(&conn) {
            debug!("Client {} already superseded in registry", id);
        }
        let _ = conn.close().await;

        transition(&mut state, ConnectionState::Closed, &id);
        info!(
            "Client {} disconnected after {:?}",
            id,
            conn.connected_at.elapsed()
        );
        state
    }

    /// Receive loop. Returns once the connection should close.
    async fn serve<R>(&mut self, conn: &Connection, receiver: &mut R)
    where
        R: TransportReceiver,
    {
        if *self.shutdown.borrow() {
            return;
        }

        loop {
            let next = tokio::select! {
                _ = self.shutdown.changed() => {
                    debug!("Router stopping, closing {}", conn.id);
                    return;
                }
                next = recv_with_deadline(receiver, self.idle_timeout) => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return,
                Err(_) => {
                    info!("Client {} idle for {:?}, closing", conn.id, self.idle_timeout);
                    return;
                }
            };

            match event {
                TransportEvent::Data(data) => {
                    match self.engine.route(&data).await {
                        Ok(routed) => trace!("{} -> {:?}", conn.id, routed),
                        Err(e) => {
                            debug!("Rejected message from {}: {}", conn.id, e);
                            conn.notify(&e.to_string()).await;
                        }
                    }
                }
                TransportEvent::Disconnected { reason } => {
                    debug!("Client {} closed: {:?}", conn.id, reason);
                    return;
                }
                TransportEvent::Connected => {}
            }
        }
    }
}

async fn recv_with_deadline<R>(
    receiver: &mut R,
    limit: Option<Duration>,
) -> Result<Option<TransportEvent>, Elapsed>
where
    R: TransportReceiver,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, receiver.recv()).await,
        None => Ok(receiver.recv().await),
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState, id: &str) {
    trace!("Connection {}: {:?} -> {:?}", id, state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::{connection, RecordingSender, ScriptedReceiver};
    use bytes::Bytes;

    struct Harness {
        registry: Arc<Registry>,
        engine: Arc<RoutingEngine>,
        shutdown: watch::Sender<bool>,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(Registry::default());
            let engine = Arc::new(RoutingEngine::new(registry.clone()));
            let (shutdown, _) = watch::channel(false);
            Self {
                registry,
                engine,
                shutdown,
            }
        }

        fn manager(&self, policy: DuplicatePolicy, idle: Option<Duration>) -> LifecycleManager {
            LifecycleManager::new(self.engine.clone(), policy, idle, self.shutdown.subscribe())
        }
    }

    fn request(id: Option<&str>) -> ConnectRequest {
        ConnectRequest {
            remote_addr: "127.0.0.1:40000".parse().unwrap(),
            path: "/ws".to_string(),
            client_id: id.map(str::to_string),
        }
    }

    fn data(json: &str) -> TransportEvent {
        TransportEvent::Data(Bytes::from(json.to_string()))
    }

    #[tokio::test]
    async fn test_missing_id_is_refused() {
        let harness = Harness::new();
        let sender = RecordingSender::new();
        let (_events, receiver) = ScriptedReceiver::new();

        let state = harness
            .manager(DuplicatePolicy::Replace, None)
            .run(Arc::new(sender.clone()), receiver, request(Some("")))
            .await;

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(sender.texts(), vec![r#"{"error":"Client ID required"}"#]);
        assert!(sender.is_closed());
        assert!(harness.registry.is_empty());
    }

    #[tokio::test]
    async fn test_serves_until_disconnect() {
        let harness = Harness::new();
        let (peer, peer_sender) = connection("B");
        harness
            .registry
            .register(peer, DuplicatePolicy::Replace)
            .unwrap();

        let sender = RecordingSender::new();
        let (events, receiver) = ScriptedReceiver::new();
        let msg = r#"{"to":"B","from":"A","xval":1,"yval":2,"gestval":"tap"}"#;
        events.send(TransportEvent::Connected).unwrap();
        events.send(data(msg)).unwrap();
        events
            .send(TransportEvent::Disconnected { reason: None })
            .unwrap();

        let state = harness
            .manager(DuplicatePolicy::Replace, None)
            .run(Arc::new(sender.clone()), receiver, request(Some("A")))
            .await;

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(peer_sender.texts(), vec![msg]);
        assert!(sender.texts().is_empty());
        assert!(!harness.registry.contains("A"));
        assert!(harness.registry.contains("B"));
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn test_rejections_keep_serving() {
        let harness = Harness::new();
        let (peer, peer_sender) = connection("B");
        harness
            .registry
            .register(peer, DuplicatePolicy::Replace)
            .unwrap();

        let sender = RecordingSender::new();
        let (events, receiver) = ScriptedReceiver::new();
        events.send(data("{not json")).unwrap();
        events
            .send(data(r#"{"to":"C","from":"A","xval":1,"yval":1,"gestval":"tap"}"#))
            .unwrap();
        events
            .send(data(r#"{"to":"B","from":"A","xval":5,"yval":5,"gestval":"swipe"}"#))
            .unwrap();
        drop(events);

        harness
            .manager(DuplicatePolicy::Replace, None)
            .run(Arc::new(sender.clone()), receiver, request(Some("A")))
            .await;

        let replies = sender.texts();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with(r#"{"error":"Invalid message format: "#));
        assert_eq!(replies[1], r#"{"error":"Target client C does not exist"}"#);
        assert_eq!(peer_sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_closes_previous_connection() {
        let harness = Harness::new();
        let (first, first_sender) = connection("A");
        harness
            .registry
            .register(first.clone(), DuplicatePolicy::Replace)
            .unwrap();

        let sender = RecordingSender::new();
        let (events, receiver) = ScriptedReceiver::new();
        let run = tokio::spawn(harness.manager(DuplicatePolicy::Replace, None).run(
            Arc::new(sender.clone()),
            receiver,
            request(Some("A")),
        ));

        while !first_sender.is_closed() {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            first_sender.texts(),
            vec![r#"{"error":"Replaced by a newer connection"}"#]
        );
        assert!(!harness.registry.lookup("A").unwrap().is_same(&first));

        // The displaced connection's teardown must not evict the newcomer
        assert!(!harness.registry.release(&first));
        assert!(harness.registry.contains("A"));

        drop(events);
        run.await.unwrap();
        assert!(harness.registry.is_empty());
    }

    #[tokio::test]
    async fn test_reject_refuses_newcomer() {
        let harness = Harness::new();
        let (first, first_sender) = connection("A");
        harness
            .registry
            .register(first.clone(), DuplicatePolicy::Reject)
            .unwrap();

        let sender = RecordingSender::new();
        let (_events, receiver) = ScriptedReceiver::new();
        let state = harness
            .manager(DuplicatePolicy::Reject, None)
            .run(Arc::new(sender.clone()), receiver, request(Some("A")))
            .await;

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(
            sender.texts(),
            vec![r#"{"error":"Client A is already connected"}"#]
        );
        assert!(first_sender.texts().is_empty());
        assert!(harness.registry.lookup("A").unwrap().is_same(&first));
    }

    #[tokio::test]
    async fn test_shutdown_ends_connection() {
        let harness = Harness::new();
        let sender = RecordingSender::new();
        let (_events, receiver) = ScriptedReceiver::new();

        let run = tokio::spawn(harness.manager(DuplicatePolicy::Replace, None).run(
            Arc::new(sender.clone()),
            receiver,
            request(Some("A")),
        ));

        while !harness.registry.contains("A") {
            tokio::task::yield_now().await;
        }
        harness.shutdown.send(true).unwrap();

        assert_eq!(run.await.unwrap(), ConnectionState::Closed);
        assert!(harness.registry.is_empty());
        assert!(sender.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let harness = Harness::new();
        let sender = RecordingSender::new();
        let (_events, receiver) = ScriptedReceiver::new();

        let state = harness
            .manager(DuplicatePolicy::Replace, Some(Duration::from_secs(30)))
            .run(Arc::new(sender.clone()), receiver, request(Some("A")))
            .await;

        assert_eq!(state, ConnectionState::Closed);
        assert!(harness.registry.is_empty());
    }
}
