//! The message model surfaced to applications.

use crate::connection::Connection;
use crate::error::Error;
use crate::status::Status;

/// Synthetic message type: a status transition on the endpoint or one of
/// its connections. Carries no data.
pub const STATUS_UPDATE: i32 = -1;

/// Synthetic message type: a connection event or failure. Carries a
/// connection handle (server side) and, for failures, an error that
/// [`crate::Server::read`] / [`crate::Client::read`] surface instead of
/// the message.
pub const EVENT: i32 = -2;

/// One unit delivered on an endpoint's inbound channel.
///
/// Positive `msg_type` values are application-defined payloads exactly as
/// the peer wrote them. Type `0` never appears (reserved for control
/// frames, discarded by the decoder). Negative types are synthetic markers
/// produced locally — see [`STATUS_UPDATE`] and [`EVENT`] — and never
/// travel on the wire.
#[derive(Debug)]
pub struct Message {
    /// Application message type, or a synthetic marker when negative.
    pub msg_type: i32,

    /// Payload bytes; empty for synthetic messages.
    pub data: Vec<u8>,

    /// Endpoint or connection status when the message was produced.
    pub status: Status,

    /// The peer connection this message belongs to (server side only).
    pub connection: Option<Connection>,

    /// Failure carried by an [`EVENT`] message; surfacing it is the read
    /// path's job, so it stays crate-private.
    pub(crate) err: Option<Error>,
}

impl Message {
    /// An application payload received from the peer.
    pub(crate) fn data(msg_type: i32, data: Vec<u8>, status: Status) -> Self {
        Self {
            msg_type,
            data,
            status,
            connection: None,
            err: None,
        }
    }

    /// A status-transition notification.
    pub(crate) fn status_update(status: Status) -> Self {
        Self {
            msg_type: STATUS_UPDATE,
            data: Vec::new(),
            status,
            connection: None,
            err: None,
        }
    }

    /// A connection event (no failure attached).
    pub(crate) fn event(status: Status, connection: Connection) -> Self {
        Self {
            msg_type: EVENT,
            data: Vec::new(),
            status,
            connection: Some(connection),
            err: None,
        }
    }

    /// A failure to be surfaced by the next read.
    pub(crate) fn error(err: Error) -> Self {
        Self {
            msg_type: EVENT,
            data: Vec::new(),
            status: Status::NotConnected,
            connection: None,
            err: Some(err),
        }
    }

    /// Whether this message was produced locally rather than received
    /// from the peer.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.msg_type < 0
    }
}
