//! Server-side connection handles and their worker tasks.
//!
//! Each accepted peer is serviced by two tasks that share nothing but the
//! connection's guarded state and its outbound channel:
//!
//! - the **reader** decodes frames and fans them into the server's single
//!   inbound channel; any stream error drives the connection to `Closed`
//!   and closes the outbound channel (exactly once).
//! - the **writer** drains the outbound channel onto the stream and exits
//!   when the channel closes. Write errors are swallowed; the reader
//!   observes the dead stream and owns the shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::debug;

use crate::error::Error;
use crate::frame;
use crate::message::Message;
use crate::status::{SharedStatus, Status};

/// An accepted server-side stream after TLS wrapping.
pub(crate) type ServerTlsStream = latch_tls::TlsStream<latch_transport::ServerStream>;

/// One queued outbound message: type and payload.
pub(crate) type OutboundFrame = (i32, Vec<u8>);

/// State guarded by the connection lock.
///
/// The lock is held across the outbound enqueue so writes from multiple
/// tasks serialize and the channel sees a single producer.
#[derive(Debug)]
struct Shared {
    status: Status,
    /// `Some` only while the connection is `Connected`. Dropping the
    /// sender closes the channel, which is the writer's exit signal.
    outbound: Option<mpsc::Sender<OutboundFrame>>,
}

#[derive(Debug)]
struct ConnectionInner {
    max_msg_size: usize,
    shared: Mutex<Shared>,
    /// Wakes the reader when the application closes the connection; the
    /// reader then runs its ordinary stream-failure path.
    close: Notify,
}

/// Handle to one accepted peer connection.
///
/// Handles are cheap to clone; the server delivers one with each
/// connection event so the application can write back to, or close, that
/// specific peer.
#[derive(Clone, Debug)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub(crate) fn new(max_msg_size: usize) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                max_msg_size,
                shared: Mutex::new(Shared {
                    status: Status::Connecting,
                    outbound: None,
                }),
                close: Notify::new(),
            }),
        }
    }

    /// Queue a message for this peer.
    ///
    /// # Errors
    ///
    /// - [`Error::ReservedMessageType`] for `msg_type == 0`.
    /// - [`Error::MessageTooLong`] when the payload exceeds the
    ///   advertised maximum.
    /// - [`Error::NotReady`] (rendering the current status) when the
    ///   connection is not `Connected`.
    pub async fn write(&self, msg_type: i32, data: &[u8]) -> Result<(), Error> {
        if msg_type == 0 {
            return Err(Error::ReservedMessageType);
        }
        if data.len() > self.inner.max_msg_size {
            return Err(Error::MessageTooLong);
        }

        let shared = self.inner.shared.lock().await;
        if shared.status != Status::Connected {
            return Err(Error::NotReady(shared.status));
        }
        match &shared.outbound {
            Some(sender) => sender
                .send((msg_type, data.to_vec()))
                .await
                .map_err(|_| Error::NotReady(Status::Closed)),
            None => Err(Error::NotReady(Status::Closed)),
        }
    }

    /// Close this peer connection.
    ///
    /// The first close moves the connection to `Closing` and signals the
    /// reader, which observes the dead stream and completes the
    /// transition to `Closed`. Closing an already-`Closed` connection
    /// only releases the outbound channel; the call is idempotent.
    pub async fn close(&self) {
        let mut shared = self.inner.shared.lock().await;
        if shared.status == Status::Closed {
            shared.outbound = None;
        } else {
            shared.status = Status::Closing;
            self.inner.close.notify_one();
        }
    }

    pub(crate) async fn mark_connected(&self, outbound: mpsc::Sender<OutboundFrame>) {
        let mut shared = self.inner.shared.lock().await;
        shared.status = Status::Connected;
        shared.outbound = Some(outbound);
    }

    #[cfg(test)]
    pub(crate) async fn status(&self) -> Status {
        self.inner.shared.lock().await.status
    }
}

/// Reader worker: frames in, inbound channel out.
///
/// Exits on stream failure or a local close signal; either way it marks
/// the connection `Closed`, drops the outbound sender and publishes the
/// status transition (unless the whole server is already closed).
pub(crate) async fn run_reader(
    connection: Connection,
    mut read_half: ReadHalf<ServerTlsStream>,
    inbound: mpsc::Sender<Message>,
    server_status: SharedStatus,
) {
    loop {
        tokio::select! {
            result = frame::read_frame(&mut read_half, connection.inner.max_msg_size) => {
                match result {
                    Ok((msg_type, body)) => {
                        if server_status.get() == Status::Closed {
                            continue;
                        }
                        let mut message = Message::data(msg_type, body, Status::Connected);
                        message.connection = Some(connection.clone());
                        if inbound.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "connection stream ended");
                        break;
                    }
                }
            }
            () = connection.inner.close.notified() => break,
        }
    }

    // Drop the stream's read side and close the outbound channel exactly
    // once; the writer drains, exits and drops the write side.
    drop(read_half);
    {
        let mut shared = connection.inner.shared.lock().await;
        shared.status = Status::Closed;
        shared.outbound = None;
    }

    if server_status.get() != Status::Closed {
        let mut message = Message::status_update(Status::Closed);
        message.connection = Some(connection.clone());
        let _ = inbound.send(message).await;
    }
}

/// Writer worker: outbound channel in, frames out.
pub(crate) async fn run_writer(
    mut outbound: mpsc::Receiver<OutboundFrame>,
    mut write_half: WriteHalf<ServerTlsStream>,
    pacing: Duration,
) {
    while let Some((msg_type, body)) = outbound.recv().await {
        if let Err(e) = frame::write_frame(&mut write_half, msg_type, &body).await {
            // The reader sees the same dead stream and drives shutdown.
            debug!(error = %e, "connection write failed");
        }
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_rejects_reserved_type() {
        let connection = Connection::new(1024);
        assert!(matches!(
            connection.write(0, &[1]).await.unwrap_err(),
            Error::ReservedMessageType
        ));
    }

    #[tokio::test]
    async fn write_rejects_oversize_payload() {
        let connection = Connection::new(8);
        assert!(matches!(
            connection.write(1, &[0u8; 9]).await.unwrap_err(),
            Error::MessageTooLong
        ));
    }

    #[tokio::test]
    async fn write_before_connected_reports_status() {
        let connection = Connection::new(1024);
        let err = connection.write(1, b"x").await.unwrap_err();
        assert_eq!(err.to_string(), "Connecting");
    }

    #[tokio::test]
    async fn write_enqueues_when_connected() {
        let connection = Connection::new(1024);
        let (tx, mut rx) = mpsc::channel(1);
        connection.mark_connected(tx).await;

        connection.write(9, b"data").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), (9, b"data".to_vec()));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let connection = Connection::new(1024);
        let (tx, _rx) = mpsc::channel(1);
        connection.mark_connected(tx).await;

        connection.close().await;
        assert_eq!(connection.status().await, Status::Closing);
        connection.close().await;
        assert_eq!(connection.status().await, Status::Closing);
    }
}
