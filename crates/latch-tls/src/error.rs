//! Error types for the TLS-PSK wrapper.

use thiserror::Error;

/// Errors produced while configuring or running the TLS session.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Building the TLS context failed (bad cipher list, library error).
    #[error("TLS configuration failed: {0}")]
    Config(#[from] openssl::error::ErrorStack),

    /// The TLS handshake itself failed (key mismatch, peer hangup).
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
}

/// Errors returned by an application's key-resolution callback.
#[derive(Debug, Error)]
pub enum PskError {
    /// The presented identity is not known to this endpoint.
    #[error("unknown PSK identity: {0}")]
    UnknownIdentity(String),

    /// Any other application-defined resolution failure.
    #[error("{0}")]
    Other(String),
}
