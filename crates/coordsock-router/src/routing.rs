//! Message routing
//!
//! Every inbound payload goes through the same pipeline:
//!
//! 1. Parse (malformed or unaddressed payloads stop here)
//! 2. Self-addressed check
//! 3. Broadcast fan-out for `"all"`, or recipient lookup, validation and
//!    dispatch for everything else
//!
//! Payloads are forwarded as the bytes the sender wrote. The registry lock is
//! only held long enough to clone a handle or a snapshot, never across a send.

use bytes::Bytes;
use coordsock_core::codec;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, RouterError};
use crate::registry::Registry;

/// What happened to a payload that passed every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Queued on the single recipient
    Delivered { to: String },
    /// Fanned out to everyone but the sender
    Broadcast { delivered: usize, failed: usize },
}

pub struct RoutingEngine {
    registry: Arc<Registry>,
    validate_broadcast: bool,
}

impl RoutingEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            validate_broadcast: false,
        }
    }

    /// Also run semantic validation on broadcasts
    pub fn with_broadcast_validation(mut self, enabled: bool) -> Self {
        self.validate_broadcast = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Route one inbound payload.
    ///
    /// The error, if any, is the rejection to report back to the sender.
    pub async fn route(&self, raw: &Bytes) -> Result<Routed> {
        let message = codec::parse(raw)?;

        if message.is_self_addressed() {
            return Err(RouterError::SelfAddressed);
        }

        if message.is_broadcast() {
            if self.validate_broadcast {
                message.validate()?;
            }
            return Ok(self.broadcast(&message.from, raw).await);
        }

        if !self.registry.contains(&message.to) {
            return Err(RouterError::UnknownRecipient(message.to));
        }

        message.validate()?;

        match self.send_message_to_client(&message.to, raw.clone()).await {
            Ok(()) => Ok(Routed::Delivered { to: message.to }),
            // Recipient left between the lookup and the send
            Err(RouterError::ClientNotFound(_)) => Err(RouterError::Dispatch {
                to: message.to,
                reason: "recipient disconnected".to_string(),
            }),
            Err(e) => Err(RouterError::Dispatch {
                to: message.to,
                reason: e.to_string(),
            }),
        }
    }

    /// Queue a payload on the connection registered as `id`
    pub async fn send_message_to_client(&self, id: &str, payload: Bytes) -> Result<()> {
        let conn = self
            .registry
            .lookup(id)
            .ok_or_else(|| RouterError::ClientNotFound(id.to_string()))?;

        conn.send(payload).await?;
        Ok(())
    }

    /// Send `payload` to every registered client except `from`.
    ///
    /// Best effort: a failed recipient is logged and skipped.
    pub async fn broadcast(&self, from: &str, payload: &Bytes) -> Routed {
        let recipients = self.registry.snapshot();

        let mut delivered = 0;
        let mut failed = 0;
        for conn in recipients.iter().filter(|c| c.id != from) {
            match conn.send(payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Broadcast from {} to {} failed: {}", from, conn.id, e);
                }
            }
        }

        debug!(
            "Broadcast from {}: {} delivered, {} failed",
            from, delivered, failed
        );
        Routed::Broadcast { delivered, failed }
    }
}
