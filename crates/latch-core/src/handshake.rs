//! Application-layer handshake, run once per TLS-protected connection.
//!
//! The server speaks first with an 8-byte record:
//!
//! ```text
//! byte 0      protocol version
//! bytes 1..4  reserved, zero
//! bytes 4..8  max message size, big-endian u32
//! ```
//!
//! The client replies with a single byte: `0` to accept, `1` to reject the
//! version. The client adopts the advertised maximum message size as its
//! own; both peers then enforce the same bound.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::PROTOCOL_VERSION;

const RECORD_SIZE: usize = 8;

/// Reply byte: version accepted.
const ACCEPT: u8 = 0;

/// Reply byte: version rejected.
const REJECT: u8 = 1;

/// Run the server side: advertise version and maximum message size, wait
/// for the verdict.
pub(crate) async fn server_handshake<S>(stream: &mut S, max_msg_size: usize) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut record = [0u8; RECORD_SIZE];
    record[0] = PROTOCOL_VERSION;
    record[4..].copy_from_slice(&(max_msg_size as u32).to_be_bytes());

    stream.write_all(&record).await.map_err(Error::HandshakeSend)?;
    stream.flush().await.map_err(Error::HandshakeSend)?;

    let mut reply = [0u8; 1];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|_| Error::HandshakeReply)?;

    match reply[0] {
        ACCEPT => Ok(()),
        REJECT => Err(Error::ClientVersion),
        _ => Err(Error::HandshakeFailed),
    }
}

/// Run the client side: check the advertised version and adopt the
/// advertised maximum message size.
///
/// Returns the maximum message size to enforce for this connection.
pub(crate) async fn client_handshake<S>(stream: &mut S) -> Result<usize, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut record = [0u8; RECORD_SIZE];
    stream
        .read_exact(&mut record)
        .await
        .map_err(Error::HandshakeRecv)?;

    if record[0] != PROTOCOL_VERSION {
        // Best-effort rejection; the server fails its read either way.
        let _ = stream.write_all(&[REJECT]).await;
        let _ = stream.flush().await;
        return Err(Error::ServerVersion(record[0]));
    }

    let max_msg_size =
        u32::from_be_bytes([record[4], record[5], record[6], record[7]]) as usize;

    stream.write_all(&[ACCEPT]).await.map_err(Error::HandshakeSend)?;
    stream.flush().await.map_err(Error::HandshakeSend)?;

    Ok(max_msg_size)
}
