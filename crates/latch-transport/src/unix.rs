//! Unix domain socket backend.

use std::io;
use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::path::socket_path;
use crate::ListenOptions;

/// Stream type handed to the server for each accepted peer.
pub type ServerStream = UnixStream;

/// Stream type returned to a dialing client.
pub type ClientStream = UnixStream;

/// A bound Unix socket endpoint.
pub struct Listener {
    inner: UnixListener,
}

/// Bind a Unix socket at `<dir or /tmp/>/<name>.sock`.
///
/// Any stale socket file left at the path by a previous process is removed
/// before binding. When `options.unmask` is set, the process umask is
/// overridden for the duration of the bind and restored afterwards.
///
/// # Errors
///
/// Returns the underlying I/O error if the stale file cannot be removed or
/// the bind is refused.
pub fn listen(dir: Option<&Path>, name: &str, options: &ListenOptions) -> io::Result<Listener> {
    let path = socket_path(dir, name);

    match std::fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let inner = match options.unmask {
        Some(mask) => {
            // The umask is process-wide; restore it before surfacing any
            // bind error.
            let old = unsafe { libc::umask(mask as libc::mode_t) };
            let bound = UnixListener::bind(&path);
            unsafe { libc::umask(old) };
            bound?
        }
        None => UnixListener::bind(&path)?,
    };

    debug!(path = %path.display(), "listening");
    Ok(Listener { inner })
}

impl Listener {
    /// Wait for the next peer connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying accept error; the listener itself stays
    /// usable only for transient errors.
    pub async fn accept(&mut self) -> io::Result<ServerStream> {
        let (stream, _) = self.inner.accept().await?;
        Ok(stream)
    }
}

/// Connect to the Unix socket at `<dir or /tmp/>/<name>.sock`.
///
/// # Errors
///
/// Returns the underlying connect error. Use [`is_retryable`] to decide
/// whether the failure means the server simply is not up yet.
pub async fn dial(dir: Option<&Path>, name: &str) -> io::Result<ClientStream> {
    UnixStream::connect(socket_path(dir, name)).await
}

/// Whether a dial error is transient: the socket file does not exist yet,
/// or nothing is accepting on it.
#[must_use]
pub fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
