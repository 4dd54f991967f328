//! # LATCH Core
//!
//! Authenticated, framed, bidirectional local IPC between a server and
//! one or more clients on the same host.
//!
//! Traffic rides OS-native local transports (Unix domain sockets on
//! POSIX, named pipes on Windows), encrypted and mutually authenticated
//! with a pre-shared-key TLS handshake, with a small length-prefixed
//! typed message protocol on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                Server / Client endpoints                 │
//! │   (accept loop, reconnect driver, reader/writer tasks)  │
//! ├─────────────────────────────────────────────────────────┤
//! │                  Frames + handshake                      │
//! │   (length-prefixed typed messages, version/size record) │
//! ├─────────────────────────────────────────────────────────┤
//! │          TLS-PSK session (latch-tls)                     │
//! ├─────────────────────────────────────────────────────────┤
//! │   Unix socket / named pipe (latch-transport)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use latch_core::{Client, ClientConfig, PskConfig, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let psk = PskConfig::fixed("hello", b"world".to_vec());
//!
//!     let server = Server::start("demo", ServerConfig::with_psk(psk.clone()))?;
//!     let client = Client::start("demo", ClientConfig::with_psk(psk))?;
//!
//!     // Wait until the dial + handshake completed, then talk.
//!     loop {
//!         let message = client.read().await?;
//!         if message.status == latch_core::Status::Connected {
//!             break;
//!         }
//!     }
//!     client.write(5, b"ping").await?;
//!
//!     loop {
//!         let message = server.read().await?;
//!         if message.msg_type > 0 {
//!             println!("received type {}: {:?}", message.msg_type, message.data);
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Messages
//!
//! Everything an endpoint has to say arrives through `read()` as a
//! [`Message`]: application payloads carry the peer's positive type,
//! while negative types report status transitions ([`message::STATUS_UPDATE`])
//! and connection events ([`message::EVENT`]). Type `0` is reserved for
//! internal control frames and never reaches the application.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
mod handshake;
pub mod message;
pub mod server;
pub mod status;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use connection::Connection;
pub use error::{Error, FrameError};
pub use message::Message;
pub use server::Server;
pub use status::Status;

// The PSK callback pair is part of the public configuration surface.
pub use latch_tls::{PskConfig, PskError};

/// Protocol version carried in the handshake record.
pub const PROTOCOL_VERSION: u8 = 2;

/// Built-in maximum application payload size (3 MiB), used when the
/// server config leaves `max_msg_size` unset or below the floor.
pub const DEFAULT_MAX_MSG_SIZE: usize = 3 * 1024 * 1024;

/// Smallest configurable maximum payload size.
pub const MIN_MAX_MSG_SIZE: usize = 1024;
