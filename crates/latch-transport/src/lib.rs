//! # LATCH Transport
//!
//! Platform-local stream transport for the LATCH protocol.
//!
//! This crate provides the raw, unauthenticated byte streams the protocol
//! core runs over:
//! - Unix domain sockets on POSIX targets
//! - Named pipes on Windows
//!
//! Both backends expose the same surface, selected at compile time:
//! [`listen`] binds an endpoint and yields a [`Listener`], [`dial`] connects
//! to one, and [`is_retryable`] classifies dial errors that simply mean the
//! server is not up yet.
//!
//! Encryption and authentication live one layer up (`latch-tls`); this crate
//! never inspects the bytes it carries.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod path;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use path::pipe_path;
pub use path::socket_path;

#[cfg(unix)]
pub use crate::unix::{dial, is_retryable, listen, ClientStream, Listener, ServerStream};
#[cfg(windows)]
pub use crate::windows::{dial, is_retryable, listen, ClientStream, Listener, ServerStream};

/// Options applied when binding a local endpoint.
///
/// Each field is honored only on the platform it belongs to; the other
/// backend ignores it.
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
    /// POSIX: process umask override applied for the duration of the bind,
    /// restored immediately afterwards. `None` leaves the umask untouched.
    pub unmask: Option<u32>,

    /// Windows: SDDL string converted to a security descriptor for the
    /// named pipe. `None` uses the pipe's default ACL.
    pub security_descriptor: Option<String>,
}
