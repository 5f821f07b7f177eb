//! Relay configuration file
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//! name = "studio relay"
//! path = "/ws"
//! max_clients = 256
//! duplicate_policy = "reject"
//! validate_broadcast = false
//! idle_timeout_secs = 300
//! max_message_size = 65536
//! outbound_queue = 100
//! write_timeout_ms = 5000
//! ```
//!
//! Every key is optional; anything omitted keeps its built-in default.

use anyhow::{Context, Result};
use coordsock_router::{DuplicatePolicy, RouterConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<SocketAddr>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub max_clients: Option<usize>,
    pub duplicate_policy: Option<DuplicatePolicy>,
    pub validate_broadcast: Option<bool>,
    pub idle_timeout_secs: Option<u64>,
    pub max_message_size: Option<usize>,
    pub outbound_queue: Option<usize>,
    /// 0 disables the write deadline
    pub write_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay the values present in the file onto `config`
    pub fn apply(&self, config: &mut RouterConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(path) = &self.path {
            config.websocket.path = path.clone();
        }
        if let Some(max) = self.max_clients {
            config.max_clients = max;
        }
        if let Some(policy) = self.duplicate_policy {
            config.duplicate_policy = policy;
        }
        if let Some(validate) = self.validate_broadcast {
            config.validate_broadcast = validate;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(size) = self.max_message_size {
            config.websocket.max_message_size = size;
        }
        if let Some(queue) = self.outbound_queue {
            config.websocket.outbound_queue = queue;
        }
        if let Some(ms) = self.write_timeout_ms {
            config.websocket.write_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
    }
}
