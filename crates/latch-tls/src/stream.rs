//! TLS session setup over a raw stream.

use std::pin::Pin;

use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslVerifyMode, SslVersion};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_openssl::SslStream;
use zeroize::Zeroizing;

use crate::error::TlsError;
use crate::psk::PskConfig;

/// An encrypted, PSK-authenticated stream over `S`.
pub type TlsStream<S> = SslStream<S>;

/// The only suites offered: ECDHE-PSK with ChaCha20-Poly1305 or AES-CBC.
const CIPHER_LIST: &str = "ECDHE-PSK-CHACHA20-POLY1305:\
                           ECDHE-PSK-AES256-CBC-SHA384:\
                           ECDHE-PSK-AES256-CBC-SHA:\
                           ECDHE-PSK-AES128-CBC-SHA";

fn base_context() -> Result<SslContextBuilder, TlsError> {
    let mut builder = SslContext::builder(SslMethod::tls())?;
    // OpenSSL 3 refuses TLS < 1.2 and the CBC suites at the default
    // security level.
    builder.set_security_level(0);
    builder.set_min_proto_version(Some(SslVersion::TLS1))?;
    builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
    builder.set_cipher_list(CIPHER_LIST)?;
    builder.set_verify(SslVerifyMode::NONE);
    Ok(builder)
}

/// Wrap `stream` as the client side of a TLS-PSK session.
///
/// Presents `psk.identity()` and proves possession of the matching key.
///
/// # Errors
///
/// Returns [`TlsError::Config`] if the context cannot be built and
/// [`TlsError::Handshake`] if the handshake fails (which includes a key
/// mismatch on either side).
pub async fn wrap_client<S>(stream: S, psk: &PskConfig) -> Result<TlsStream<S>, TlsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut builder = base_context()?;
    let config = psk.clone();
    builder.set_psk_client_callback(move |_ssl, _hint, identity_buf, key_buf| {
        let identity = config.identity();
        let key = match config.key_for(&identity) {
            Ok(key) => Zeroizing::new(key),
            Err(_) => return Ok(0),
        };
        let id = identity.as_bytes();
        // The identity buffer expects a NUL-terminated C string.
        if id.len() + 1 > identity_buf.len() || key.len() > key_buf.len() {
            return Ok(0);
        }
        identity_buf[..id.len()].copy_from_slice(id);
        identity_buf[id.len()] = 0;
        key_buf[..key.len()].copy_from_slice(&key);
        Ok(key.len())
    });

    let mut stream = new_stream(builder, stream)?;
    Pin::new(&mut stream)
        .connect()
        .await
        .map_err(|e| TlsError::Handshake(e.to_string()))?;
    Ok(stream)
}

/// Wrap `stream` as the server side of a TLS-PSK session.
///
/// Resolves the identity the peer presents through `psk.key_for`; an
/// unresolvable identity fails the handshake.
///
/// # Errors
///
/// Returns [`TlsError::Config`] if the context cannot be built and
/// [`TlsError::Handshake`] if the handshake fails.
pub async fn wrap_server<S>(stream: S, psk: &PskConfig) -> Result<TlsStream<S>, TlsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut builder = base_context()?;
    let config = psk.clone();
    builder.set_psk_server_callback(move |_ssl, identity, key_buf| {
        let identity = identity
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or_default();
        let key = match config.key_for(identity) {
            Ok(key) => Zeroizing::new(key),
            Err(_) => return Ok(0),
        };
        if key.len() > key_buf.len() {
            return Ok(0);
        }
        key_buf[..key.len()].copy_from_slice(&key);
        Ok(key.len())
    });

    let mut stream = new_stream(builder, stream)?;
    Pin::new(&mut stream)
        .accept()
        .await
        .map_err(|e| TlsError::Handshake(e.to_string()))?;
    Ok(stream)
}

fn new_stream<S>(builder: SslContextBuilder, stream: S) -> Result<TlsStream<S>, TlsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let context = builder.build();
    let ssl = Ssl::new(&context)?;
    Ok(SslStream::new(ssl, stream)?)
}
