//! Connection registry
//!
//! Maps client identifiers to their live connection. All mutations happen
//! under one write lock so the duplicate check and the insert are a single
//! step, and [`Registry::snapshot`] always observes a consistent set.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Result, RouterError};

/// What to do when a client registers with an identifier that is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Newcomer wins; the previous connection is handed back to be closed
    #[default]
    Replace,
    /// Newcomer is refused
    Reject,
    /// Newcomer wins; the previous connection is left open but unreachable
    Overwrite,
}

/// Parses the same names the config file uses
impl FromStr for DuplicatePolicy {
    type Err = serde::de::value::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use serde::de::{value::StrDeserializer, IntoDeserializer};

        let name: StrDeserializer<'_, Self::Err> = s.into_deserializer();
        Self::deserialize(name)
    }
}

/// Outcome of a successful registration
#[derive(Debug)]
pub enum Registration {
    Inserted,
    /// The identifier was taken; this is the connection that held it
    Displaced(Arc<Connection>),
}

/// Live connections by client identifier
pub struct Registry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    max_clients: usize,
}

impl Registry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_clients,
        }
    }

    /// Register a connection under its identifier
    pub fn register(&self, conn: Arc<Connection>, policy: DuplicatePolicy) -> Result<Registration> {
        let mut connections = self.connections.write();

        if connections.contains_key(&conn.id) {
            if policy == DuplicatePolicy::Reject {
                return Err(RouterError::IdentifierInUse(conn.id.clone()));
            }
            let id = conn.id.clone();
            let previous = connections.insert(id.clone(), conn);
            debug!("Client {} re-registered ({:?})", id, policy);
            return Ok(match previous {
                Some(previous) if policy == DuplicatePolicy::Replace => {
                    Registration::Displaced(previous)
                }
                _ => Registration::Inserted,
            });
        }

        if connections.len() >= self.max_clients {
            return Err(RouterError::RegistryFull {
                max: self.max_clients,
            });
        }

        debug!("Client {} registered", conn.id);
        connections.insert(conn.id.clone(), conn);
        Ok(Registration::Inserted)
    }

    /// Remove whatever connection holds `id`
    pub fn unregister(&self, id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(id);
        if removed.is_some() {
            debug!("Client {} unregistered", id);
        }
        removed
    }

    /// Remove `conn` only if it still holds its identifier.
    ///
    /// Returns false when a newer connection has since taken the identifier.
    pub fn release(&self, conn: &Connection) -> bool {
        let mut connections = self.connections.write();
        match connections.get(&conn.id) {
            Some(current) if current.is_same(conn) => {
                connections.remove(&conn.id);
                debug!("Client {} released", conn.id);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Every registered connection at one instant
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(crate::router::DEFAULT_MAX_CLIENTS)
    }
}
