//! Error types for the LATCH protocol core.
//!
//! Several display strings below are load-bearing: applications (and the
//! test suite) match on them verbatim, so they are kept exactly as the
//! protocol has always produced them — including the historical
//! "recieve" spelling.

use std::io;

use thiserror::Error;

use crate::status::Status;

/// Errors surfaced through the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// The endpoint name is empty.
    #[error("ipcName cannot be an empty string")]
    EmptyName,

    /// No PSK configuration was supplied; the protocol cannot run
    /// unauthenticated.
    #[error("config is required")]
    ConfigRequired,

    /// Message type 0 is reserved for internal control frames.
    #[error("Message type 0 is reserved")]
    ReservedMessageType,

    /// The payload exceeds the negotiated maximum message size.
    #[error("Message exceeds maximum message length")]
    MessageTooLong,

    /// A write was attempted while the endpoint was not connected; the
    /// message is the current status string.
    #[error("{0}")]
    NotReady(Status),

    /// The inbound channel has been closed; no further messages will
    /// arrive.
    #[error("the recieve channel has been closed")]
    ChannelClosed,

    /// The dial loop exceeded the configured timeout.
    #[error("Timed out trying to connect")]
    ConnectTimeout,

    /// A reconnect attempt exceeded the configured timeout; terminal.
    #[error("Timed out trying to re-connect")]
    ReconnectTimeout,

    /// The local endpoint closed the connection.
    #[error("Client has closed the Connection")]
    ClientClosed,

    /// Handshake: the peer rejected our protocol version.
    #[error("client has a different version number")]
    ClientVersion,

    /// Handshake: the server advertised a different protocol version.
    #[error("server has sent a different version number: {0}")]
    ServerVersion(u8),

    /// Handshake: the reply byte was neither accept nor reject.
    #[error("other error - handshake failed")]
    HandshakeFailed,

    /// Handshake: the record could not be sent.
    #[error("unable to send handshake: {0}")]
    HandshakeSend(#[source] io::Error),

    /// Handshake: the reply byte never arrived.
    #[error("failed to recieve handshake reply")]
    HandshakeReply,

    /// Handshake: the record never arrived.
    #[error("failed to recieve handshake message: {0}")]
    HandshakeRecv(#[source] io::Error),

    /// Wire-level framing failure.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// TLS session setup failure.
    #[error(transparent)]
    Tls(#[from] latch_tls::TlsError),

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Frame-level errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length prefix is smaller than the type field it must contain.
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// The length prefix exceeds the negotiated maximum.
    #[error("frame exceeds negotiated maximum: {got} > {limit}")]
    Oversize {
        /// Declared payload length.
        got: usize,
        /// Largest acceptable payload length.
        limit: usize,
    },

    /// The stream failed or ended mid-frame.
    #[error(transparent)]
    Io(#[from] io::Error),
}
