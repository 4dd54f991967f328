//! Client endpoint: dial loop, reconnect driver and steady-state workers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use latch_tls::PskConfig;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{check_name, ClientConfig};
use crate::connection::OutboundFrame;
use crate::error::Error;
use crate::frame;
use crate::handshake;
use crate::message::Message;
use crate::status::{SharedStatus, Status};
use crate::DEFAULT_MAX_MSG_SIZE;

/// A dialed client-side stream after TLS wrapping.
type ClientTlsStream = latch_tls::TlsStream<latch_transport::ClientStream>;

#[derive(Debug)]
struct ClientInner {
    name: String,
    socket_directory: Option<PathBuf>,
    timeout: Option<Duration>,
    retry_timer: Duration,
    psk: PskConfig,
    status: SharedStatus,
    /// Adopted from the server's handshake record.
    max_msg_size: AtomicUsize,
    inbound_rx: Mutex<mpsc::Receiver<Message>>,
    inbound_tx: mpsc::Sender<Message>,
    /// Dropped (exactly once) when a read surfaces a fatal error; that
    /// closes the outbound channel and stops the writer.
    outbound_tx: StdMutex<Option<mpsc::Sender<OutboundFrame>>>,
    /// The current stream's write side. Reconnects swap it; the writer
    /// always writes through whatever is installed here.
    write_half: Mutex<Option<WriteHalf<ClientTlsStream>>>,
    /// Wakes the reader when the application closes the client.
    close: Notify,
}

/// A client IPC endpoint connected to one server.
///
/// Created with [`Client::start`]. The client dials until the server
/// appears (bounded by the configured timeout), and automatically
/// reconnects if the stream dies later.
#[derive(Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Start a client connecting to the endpoint `name`.
    ///
    /// Dialing happens on a background task; progress and failures are
    /// delivered through [`Client::read`]. Must be called within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyName`] for an empty `name`.
    /// - [`Error::ConfigRequired`] when `config.psk_config` is absent.
    pub fn start(name: &str, config: ClientConfig) -> Result<Self, Error> {
        check_name(name)?;
        let psk = config.psk_config.clone().ok_or(Error::ConfigRequired)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);

        let inner = Arc::new(ClientInner {
            name: name.to_string(),
            socket_directory: config.socket_directory.clone(),
            timeout: config.effective_timeout(),
            retry_timer: config.effective_retry_timer(),
            psk,
            status: SharedStatus::new(Status::NotConnected),
            max_msg_size: AtomicUsize::new(DEFAULT_MAX_MSG_SIZE),
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx,
            outbound_tx: StdMutex::new(Some(outbound_tx)),
            write_half: Mutex::new(None),
            close: Notify::new(),
        });

        tokio::spawn(run_client(inner.clone(), outbound_rx));

        Ok(Self { inner })
    }

    /// Wait for the next message from the server.
    ///
    /// A dequeued failure (dial error, timeout, local close) is terminal:
    /// both channels are closed and the error returned; afterwards every
    /// read yields [`Error::ChannelClosed`].
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] once the inbound channel is closed.
    /// - The carried error when the dequeued message reports a failure.
    pub async fn read(&self) -> Result<Message, Error> {
        let mut rx = self.inner.inbound_rx.lock().await;
        match rx.recv().await {
            None => Err(Error::ChannelClosed),
            Some(mut message) => match message.err.take() {
                Some(err) => {
                    rx.close();
                    *self
                        .inner
                        .outbound_tx
                        .lock()
                        .unwrap_or_else(|e| e.into_inner()) = None;
                    Err(err)
                }
                None => Ok(message),
            },
        }
    }

    /// Queue a message for the server.
    ///
    /// # Errors
    ///
    /// - [`Error::ReservedMessageType`] for `msg_type == 0`.
    /// - [`Error::NotReady`] (rendering the current status) when not
    ///   connected.
    /// - [`Error::MessageTooLong`] when the payload exceeds the maximum
    ///   adopted at handshake.
    pub async fn write(&self, msg_type: i32, data: &[u8]) -> Result<(), Error> {
        if msg_type == 0 {
            return Err(Error::ReservedMessageType);
        }
        let status = self.inner.status.get();
        if status != Status::Connected {
            return Err(Error::NotReady(status));
        }
        if data.len() > self.inner.max_msg_size.load(Ordering::Relaxed) {
            return Err(Error::MessageTooLong);
        }

        let sender = self
            .inner
            .outbound_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match sender {
            Some(sender) => sender
                .send((msg_type, data.to_vec()))
                .await
                .map_err(|_| Error::NotReady(Status::Closed)),
            None => Err(Error::NotReady(Status::Closed)),
        }
    }

    /// Current client status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    /// Close the connection.
    ///
    /// Moves the client to `Closing` and signals the reader, which
    /// completes the transition to `Closed` without reconnecting.
    pub fn close(&self) {
        self.inner.status.set(Status::Closing);
        self.inner.close.notify_one();
    }
}

async fn run_client(inner: Arc<ClientInner>, outbound_rx: mpsc::Receiver<OutboundFrame>) {
    inner.status.set(Status::Connecting);
    debug!(name = %inner.name, "connecting");
    let _ = inner
        .inbound_tx
        .send(Message::status_update(Status::Connecting))
        .await;

    let read_half = match create_connection(&inner).await {
        Ok(read_half) => read_half,
        Err(e) => {
            let _ = inner.inbound_tx.send(Message::error(e)).await;
            return;
        }
    };

    tokio::spawn(run_writer(inner.clone(), outbound_rx));
    run_reader(inner, read_half).await;
}

/// Dial, wrap with TLS, handshake, announce `Connected`.
///
/// Returns the read side of the new stream; the write side is installed
/// for the (long-lived) writer task.
async fn create_connection(
    inner: &Arc<ClientInner>,
) -> Result<ReadHalf<ClientTlsStream>, Error> {
    let stream = dial_loop(inner).await?;
    let mut tls = latch_tls::wrap_client(stream, &inner.psk).await?;

    let max_msg_size = handshake::client_handshake(&mut tls).await?;
    inner.max_msg_size.store(max_msg_size, Ordering::Relaxed);

    let (read_half, write_half) = tokio::io::split(tls);
    *inner.write_half.lock().await = Some(write_half);

    inner.status.set(Status::Connected);
    info!(name = %inner.name, max_msg_size, "connected");
    let _ = inner
        .inbound_tx
        .send(Message::status_update(Status::Connected))
        .await;

    Ok(read_half)
}

/// Dial until the endpoint accepts, the timeout elapses or the client is
/// closed locally.
async fn dial_loop(inner: &Arc<ClientInner>) -> Result<latch_transport::ClientStream, Error> {
    let start = Instant::now();
    loop {
        if let Some(timeout) = inner.timeout {
            if start.elapsed() > timeout {
                inner.status.set(Status::Closed);
                return Err(Error::ConnectTimeout);
            }
        }
        if matches!(inner.status.get(), Status::Closing | Status::Closed) {
            return Err(Error::ClientClosed);
        }

        match latch_transport::dial(inner.socket_directory.as_deref(), &inner.name).await {
            Ok(stream) => return Ok(stream),
            Err(e) if latch_transport::is_retryable(&e) => {
                debug!(name = %inner.name, error = %e, "dial retry");
            }
            #[cfg(unix)]
            Err(e) => {
                let _ = inner.inbound_tx.send(Message::error(e.into())).await;
            }
            #[cfg(windows)]
            Err(e) => return Err(e.into()),
        }

        tokio::time::sleep(inner.retry_timer).await;
    }
}

/// Reader worker; also drives reconnects, so it owns the client's whole
/// post-connect lifecycle.
async fn run_reader(inner: Arc<ClientInner>, mut read_half: ReadHalf<ClientTlsStream>) {
    loop {
        let closed_locally = loop {
            tokio::select! {
                result = frame::read_frame(
                    &mut read_half,
                    inner.max_msg_size.load(Ordering::Relaxed),
                ) => {
                    match result {
                        Ok((msg_type, body)) => {
                            let message = Message::data(msg_type, body, inner.status.get());
                            let _ = inner.inbound_tx.send(message).await;
                        }
                        Err(e) => {
                            debug!(error = %e, "stream ended");
                            break false;
                        }
                    }
                }
                () = inner.close.notified() => break true,
            }
        };

        let status = inner.status.get();
        if closed_locally || status == Status::Closing || status == Status::Closed {
            finish_close(&inner).await;
            return;
        }

        // The stream died out from under us: reconnect.
        inner.status.set(Status::ReConnecting);
        warn!(name = %inner.name, "re-connecting");
        let _ = inner
            .inbound_tx
            .send(Message::status_update(Status::ReConnecting))
            .await;
        *inner.write_half.lock().await = None;

        match create_connection(&inner).await {
            Ok(new_read_half) => read_half = new_read_half,
            Err(Error::ConnectTimeout) => {
                inner.status.set(Status::Timeout);
                let _ = inner
                    .inbound_tx
                    .send(Message::status_update(Status::Timeout))
                    .await;
                let _ = inner
                    .inbound_tx
                    .send(Message::error(Error::ReconnectTimeout))
                    .await;
                return;
            }
            Err(Error::ClientClosed) => {
                finish_close(&inner).await;
                return;
            }
            Err(e) => {
                debug!(error = %e, "re-connect failed");
                return;
            }
        }
    }
}

/// Complete a locally-initiated close: announce `Closed`, then the
/// terminal error the next read surfaces.
async fn finish_close(inner: &Arc<ClientInner>) {
    inner.status.set(Status::Closed);
    *inner.write_half.lock().await = None;
    info!(name = %inner.name, "closed");
    let _ = inner
        .inbound_tx
        .send(Message::status_update(Status::Closed))
        .await;
    let _ = inner
        .inbound_tx
        .send(Message::error(Error::ClientClosed))
        .await;
}

/// Writer worker: lives across reconnects, writing through whichever
/// write half is currently installed.
async fn run_writer(inner: Arc<ClientInner>, mut outbound: mpsc::Receiver<OutboundFrame>) {
    while let Some((msg_type, body)) = outbound.recv().await {
        let mut guard = inner.write_half.lock().await;
        if let Some(write_half) = guard.as_mut() {
            if let Err(e) = frame::write_frame(write_half, msg_type, &body).await {
                // The reader sees the same dead stream and drives the
                // shutdown or reconnect.
                debug!(error = %e, "client write failed");
            }
        }
    }
    *inner.write_half.lock().await = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psk() -> PskConfig {
        PskConfig::fixed("unit", b"test-key".to_vec())
    }

    #[tokio::test]
    async fn start_rejects_empty_name() {
        let err = Client::start("", ClientConfig::with_psk(psk())).unwrap_err();
        assert_eq!(err.to_string(), "ipcName cannot be an empty string");
    }

    #[tokio::test]
    async fn start_requires_psk() {
        let err = Client::start("needs-psk", ClientConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "config is required");
    }

    #[tokio::test]
    async fn write_before_connected_reports_status() {
        let client = Client::start("not-up", ClientConfig::with_psk(psk())).unwrap();
        let err = client.write(1, b"x").await.unwrap_err();
        // The dial loop is still running; status is one of the two
        // pre-connection states depending on task scheduling.
        assert!(err.to_string() == "Not Connected" || err.to_string() == "Connecting");
    }
}
