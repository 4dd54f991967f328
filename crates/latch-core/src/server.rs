//! Server endpoint: accept loop and fan-in of connection messages.

use std::sync::Arc;

use latch_tls::PskConfig;
use latch_transport::ListenOptions;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::{check_name, ServerConfig};
use crate::connection::{self, Connection};
use crate::error::Error;
use crate::handshake;
use crate::message::Message;
use crate::status::{SharedStatus, Status};

#[derive(Debug)]
struct ServerInner {
    name: String,
    status: SharedStatus,
    max_msg_size: usize,
    /// Fan-in of all connection readers plus the accept loop.
    inbound_rx: Mutex<mpsc::Receiver<Message>>,
    inbound_tx: mpsc::Sender<Message>,
    /// Flipped exactly once by [`Server::close`]; stops the accept loop
    /// and turns every subsequent read into the closed-channel sentinel.
    shutdown: watch::Sender<bool>,
}

/// A listening IPC server endpoint.
///
/// Created with [`Server::start`]. All accepted connections deliver into
/// one inbound channel consumed through [`Server::read`]; per-peer writes
/// go through the [`Connection`] handles carried by connection events.
#[derive(Debug)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Start a server listening on the endpoint `name`.
    ///
    /// Binding happens on a background task; a bind failure is delivered
    /// as an error through [`Server::read`], matching every other
    /// post-start failure. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyName`] for an empty `name`.
    /// - [`Error::ConfigRequired`] when `config.psk_config` is absent.
    pub fn start(name: &str, config: ServerConfig) -> Result<Self, Error> {
        check_name(name)?;
        let psk = config.psk_config.clone().ok_or(Error::ConfigRequired)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (shutdown, _) = watch::channel(false);

        let inner = Arc::new(ServerInner {
            name: name.to_string(),
            status: SharedStatus::new(Status::NotConnected),
            max_msg_size: config.effective_max_msg_size(),
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx,
            shutdown,
        });

        tokio::spawn(run_server(inner.clone(), config, psk));

        Ok(Self { inner })
    }

    /// Wait for the next message from any connection.
    ///
    /// Synthetic messages (negative types) report status transitions and
    /// connection events; see [`crate::message`].
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] once [`Server::close`] has run.
    /// - The carried error when the dequeued message reports a failure
    ///   (bind error, handshake rejection).
    pub async fn read(&self) -> Result<Message, Error> {
        let mut shutdown = self.inner.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(Error::ChannelClosed);
        }

        let mut rx = self.inner.inbound_rx.lock().await;
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(mut message) => match message.err.take() {
                    Some(err) => Err(err),
                    None => Ok(message),
                },
                None => Err(Error::ChannelClosed),
            },
            _ = shutdown.changed() => Err(Error::ChannelClosed),
        }
    }

    /// Current server status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    /// Stop accepting and close the inbound channel.
    ///
    /// Active connections are not torn down here; each one dies when its
    /// own stream errors (typically because its client goes away) or when
    /// its handle is closed.
    pub fn close(&self) {
        self.inner.status.set(Status::Closed);
        // send_replace: the flag must flip even when nothing is currently
        // subscribed (e.g. the bind failed and the accept loop never ran).
        self.inner.shutdown.send_replace(true);
        info!(name = %self.inner.name, "server closed");
    }
}

async fn run_server(inner: Arc<ServerInner>, config: ServerConfig, psk: PskConfig) {
    let options = ListenOptions {
        unmask: config.unmask,
        security_descriptor: config.security_descriptor.clone(),
    };

    let listener = match latch_transport::listen(
        config.socket_directory.as_deref(),
        &inner.name,
        &options,
    ) {
        Ok(listener) => listener,
        Err(e) => {
            let _ = inner.inbound_tx.send(Message::error(e.into())).await;
            return;
        }
    };

    inner.status.set(Status::Listening);
    info!(name = %inner.name, "server listening");

    // The accept loop must already be running while this notification
    // waits for the application to read it.
    tokio::spawn(accept_loop(inner.clone(), listener, psk, config));
    let _ = inner
        .inbound_tx
        .send(Message::status_update(Status::Listening))
        .await;
}

async fn accept_loop(
    inner: Arc<ServerInner>,
    mut listener: latch_transport::Listener,
    psk: PskConfig,
    config: ServerConfig,
) {
    let mut shutdown = inner.shutdown.subscribe();

    loop {
        if *shutdown.borrow() {
            break;
        }
        let stream = tokio::select! {
            result = listener.accept() => match result {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        };

        let connection = Connection::new(inner.max_msg_size);
        publish(&inner, Message::event(Status::Connecting, connection.clone())).await;

        let mut tls = match latch_tls::wrap_server(stream, &psk).await {
            Ok(tls) => tls,
            Err(e) => {
                warn!(error = %e, "TLS accept failed");
                publish(&inner, Message::error(e.into())).await;
                continue;
            }
        };

        if let Err(e) = handshake::server_handshake(&mut tls, inner.max_msg_size).await {
            warn!(error = %e, "handshake failed");
            publish(&inner, Message::error(e)).await;
            continue;
        }

        let (read_half, write_half) = tokio::io::split(tls);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        connection.mark_connected(outbound_tx).await;
        debug!(name = %inner.name, "connection established");

        publish(&inner, Message::event(Status::Connected, connection.clone())).await;

        tokio::spawn(connection::run_reader(
            connection,
            read_half,
            inner.inbound_tx.clone(),
            inner.status.clone(),
        ));
        tokio::spawn(connection::run_writer(
            outbound_rx,
            write_half,
            config.write_pacing,
        ));
    }
}

async fn publish(inner: &ServerInner, message: Message) {
    if inner.status.get() != Status::Closed {
        let _ = inner.inbound_tx.send(message).await;
    }
}
