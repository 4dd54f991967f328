//! Endpoint and connection status.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Lifecycle status of an endpoint or connection.
///
/// The same enumeration serves the server, its per-peer connections, and
/// the client; each state machine only visits the subset that applies to
/// it. The display string is part of the public error contract: writing on
/// an endpoint that is not `Connected` fails with the status string as the
/// error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Initial state before any listen or dial.
    NotConnected,
    /// Server: bound and accepting peers.
    Listening,
    /// Dial or accept in progress, handshake not yet complete.
    Connecting,
    /// Steady state: frames flow in both directions.
    Connected,
    /// Client: lost the stream, dialing again.
    ReConnecting,
    /// Terminal state; no further frames.
    Closed,
    /// Local close requested, teardown in progress.
    Closing,
    /// Unrecoverable failure.
    Error,
    /// Client: gave up dialing after the configured timeout.
    Timeout,
}

impl Status {
    /// Canonical human-readable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotConnected => "Not Connected",
            Status::Listening => "Listening",
            Status::Connecting => "Connecting",
            Status::Connected => "Connected",
            Status::ReConnecting => "Re-connecting",
            Status::Closed => "Closed",
            Status::Closing => "Closing",
            Status::Error => "Error",
            Status::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared endpoint status: single writer (the endpoint state machine),
/// any number of readers, short lock-free-in-spirit critical sections.
#[derive(Clone, Debug)]
pub(crate) struct SharedStatus(Arc<Mutex<Status>>);

impl SharedStatus {
    pub(crate) fn new(status: Status) -> Self {
        Self(Arc::new(Mutex::new(status)))
    }

    pub(crate) fn get(&self) -> Status {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set(&self, status: Status) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }
}
