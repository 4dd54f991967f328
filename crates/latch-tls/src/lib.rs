//! # LATCH TLS
//!
//! TLS-PSK stream wrapper for the LATCH protocol.
//!
//! Every LATCH connection is encrypted and mutually authenticated with a
//! pre-shared key before a single protocol byte flows. This crate turns a
//! raw local stream into that authenticated session:
//!
//! - [`PskConfig`] carries the application's two callbacks: one naming the
//!   identity a client presents, one resolving an identity to its key.
//! - [`wrap_client`] / [`wrap_server`] run the TLS handshake over any
//!   `AsyncRead + AsyncWrite` stream and yield the encrypted stream.
//!
//! The wrapper is a pure adapter: it never retries, never logs, and leaves
//! certificate validation disabled — the shared key is the authenticator.
//! Only ECDHE-PSK cipher suites are offered, over TLS 1.0–1.2.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod psk;
mod stream;

pub use error::{PskError, TlsError};
pub use psk::PskConfig;
pub use stream::{wrap_client, wrap_server, TlsStream};
