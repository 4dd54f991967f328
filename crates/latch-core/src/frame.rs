//! Frame encoding and decoding for the LATCH wire protocol.
//!
//! Every message travels as one frame:
//!
//! ```text
//! ┌────────────────┬────────────────┬─────────────────────┐
//! │ total_len: u32 │ msg_type: i32  │ body                │
//! │ (big-endian)   │ (big-endian)   │ (total_len-4 bytes) │
//! └────────────────┴────────────────┴─────────────────────┘
//! ```
//!
//! `total_len` counts the type field plus the body. Frames with
//! `msg_type == 0` are control frames and are discarded by the decoder
//! without surfacing. All multi-byte fields are big-endian.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Size of the length prefix.
pub const LEN_SIZE: usize = 4;

/// Size of the message type field inside the payload.
pub const TYPE_SIZE: usize = 4;

/// Encode one frame.
#[must_use]
pub fn encode(msg_type: i32, body: &[u8]) -> Vec<u8> {
    let total = (TYPE_SIZE + body.len()) as u32;
    let mut buf = Vec::with_capacity(LEN_SIZE + TYPE_SIZE + body.len());
    buf.extend_from_slice(&total.to_be_bytes());
    buf.extend_from_slice(&msg_type.to_be_bytes());
    buf.extend_from_slice(body);
    buf
}

/// Encode and flush one frame as a single buffered write.
///
/// # Errors
///
/// Any write error is fatal to the connection; the caller tears the
/// stream down.
pub async fn write_frame<W>(writer: &mut W, msg_type: i32, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(msg_type, body)).await?;
    writer.flush().await
}

/// Read frames until a non-control frame arrives and return it.
///
/// Both the length prefix and the payload are read with read-exact
/// semantics; a short read is a stream error, never a misaligned frame.
///
/// # Errors
///
/// - [`FrameError::TooShort`] if the length prefix cannot hold the type
///   field.
/// - [`FrameError::Oversize`] if the declared payload exceeds
///   `max_body + 4`; a peer that violates the negotiated bound is treated
///   as a dead stream.
/// - [`FrameError::Io`] on any read failure, including EOF.
pub async fn read_frame<R>(reader: &mut R, max_body: usize) -> Result<(i32, Vec<u8>), FrameError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut len = [0u8; LEN_SIZE];
        reader.read_exact(&mut len).await?;
        let total = u32::from_be_bytes(len) as usize;

        if total < TYPE_SIZE {
            return Err(FrameError::TooShort(total));
        }
        let limit = max_body.saturating_add(TYPE_SIZE);
        if total > limit {
            return Err(FrameError::Oversize { got: total, limit });
        }

        let mut payload = vec![0u8; total];
        reader.read_exact(&mut payload).await?;

        let msg_type = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if msg_type == 0 {
            // Control frame: consume and keep reading.
            continue;
        }

        let body = payload.split_off(TYPE_SIZE);
        return Ok((msg_type, body));
    }
}
