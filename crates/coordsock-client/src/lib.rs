//! coordsock Client Library
//!
//! Async client for the coordsock relay.
//!
//! # Example
//!
//! ```no_run
//! use coordsock_client::Client;
//! use coordsock_core::{Inbound, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder("ws://localhost:8080").id("A").connect().await?;
//!
//!     let msg = Message::new("A", "B").with_position(10.0, 20.0).with_gesture("tap");
//!     client.send(&msg).await?;
//!
//!     while let Some(inbound) = client.recv().await {
//!         match inbound {
//!             Inbound::Message(msg) => println!("{} {} at ({}, {})", msg.from, msg.gestval, msg.xval, msg.yval),
//!             Inbound::Error(error) => eprintln!("relay: {}", error),
//!             Inbound::Unrecognized(_) => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod error;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{ClientError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::Client;
    pub use crate::error::{ClientError, Result};
    pub use coordsock_core::{Inbound, Message, BROADCAST_ADDRESS};
}
