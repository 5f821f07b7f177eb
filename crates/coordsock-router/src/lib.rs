//! coordsock Router
//!
//! The router is the central hub of the relay:
//! - Tracks live connections by client identifier
//! - Parses, validates and forwards coordinate/gesture messages
//! - Fans messages addressed to `"all"` out to every other client
//! - Reports rejected messages back to their sender
//!
//! # Example
//!
//! ```no_run
//! use coordsock_router::{Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new(RouterConfig::default());
//!
//!     // Clients connect to ws://host:8080/ws?id=<client id>
//!     router.serve_websocket("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod registry;
pub mod router;
pub mod routing;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::Connection;
pub use error::{Result, RouterError};
pub use lifecycle::{ConnectionState, LifecycleManager};
pub use registry::{DuplicatePolicy, Registration, Registry};
pub use router::{Router, RouterConfig};
pub use routing::{Routed, RoutingEngine};
