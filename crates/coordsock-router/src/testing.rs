//! In-memory transport doubles for unit tests

use async_trait::async_trait;
use bytes::Bytes;
use coordsock_transport::{Result, TransportError, TransportEvent, TransportReceiver, TransportSender};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::connection::Connection;

/// Records everything sent through it
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<Bytes>>>,
    closed: Arc<Mutex<bool>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with backpressure
    pub fn fail_sends(&self) {
        *self.fail.lock() = true;
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[async_trait]
impl TransportSender for RecordingSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if *self.closed.lock() {
            return Err(TransportError::NotConnected);
        }
        if *self.fail.lock() {
            return Err(TransportError::Backpressure);
        }
        self.sent.lock().push(data);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !*self.closed.lock()
    }

    async fn close(&self) -> Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Receiver fed from a test-held channel
pub struct ScriptedReceiver {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ScriptedReceiver {
    pub fn new() -> (mpsc::UnboundedSender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl TransportReceiver for ScriptedReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// A connection backed by a [`RecordingSender`]
pub fn connection(id: &str) -> (Arc<Connection>, RecordingSender) {
    let sender = RecordingSender::new();
    let conn = Arc::new(Connection::new(id, Arc::new(sender.clone()), None));
    (conn, sender)
}
