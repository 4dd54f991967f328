//! Endpoint configuration.

use std::path::PathBuf;
use std::time::Duration;

use latch_tls::PskConfig;

use crate::error::Error;
use crate::{DEFAULT_MAX_MSG_SIZE, MIN_MAX_MSG_SIZE};

/// Floor for the client retry interval.
const MIN_RETRY_TIMER: Duration = Duration::from_secs(1);

/// Default pacing delay between frames on a server connection's writer.
const DEFAULT_WRITE_PACING: Duration = Duration::from_millis(2);

/// Configuration for [`crate::Server::start`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory for the socket file (POSIX) or pipe namespace (Windows);
    /// `None` uses the platform default (`/tmp/`, `\\.\pipe\`).
    pub socket_directory: Option<PathBuf>,

    /// Reserved; the accept path currently never times out.
    pub timeout: Option<Duration>,

    /// Maximum application payload size advertised to clients. Values
    /// below 1024 (including the default `0`) fall back to the built-in
    /// default.
    pub max_msg_size: usize,

    /// POSIX: umask override applied while binding the socket, so the
    /// socket file mode can be opened up to other users.
    pub unmask: Option<u32>,

    /// Windows: SDDL string applied to the named pipe.
    pub security_descriptor: Option<String>,

    /// Delay between consecutive frames on each connection's writer.
    /// `Duration::ZERO` disables pacing.
    pub write_pacing: Duration,

    /// The PSK callback pair. Required: without it `start` fails.
    pub psk_config: Option<PskConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_directory: None,
            timeout: None,
            max_msg_size: 0,
            unmask: None,
            security_descriptor: None,
            write_pacing: DEFAULT_WRITE_PACING,
            psk_config: None,
        }
    }
}

impl ServerConfig {
    /// Default configuration with the given PSK callbacks.
    #[must_use]
    pub fn with_psk(psk_config: PskConfig) -> Self {
        Self {
            psk_config: Some(psk_config),
            ..Self::default()
        }
    }

    pub(crate) fn effective_max_msg_size(&self) -> usize {
        if self.max_msg_size < MIN_MAX_MSG_SIZE {
            DEFAULT_MAX_MSG_SIZE
        } else {
            self.max_msg_size
        }
    }
}

/// Configuration for [`crate::Client::start`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory for the socket file (POSIX) or pipe namespace (Windows);
    /// `None` uses the platform default.
    pub socket_directory: Option<PathBuf>,

    /// Wall-clock budget for a connect or reconnect dial loop. `None` (or
    /// a zero duration) retries forever.
    pub timeout: Option<Duration>,

    /// Interval between dial attempts; clamped to at least one second.
    pub retry_timer: Duration,

    /// The PSK callback pair. Required: without it `start` fails.
    pub psk_config: Option<PskConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_directory: None,
            timeout: None,
            retry_timer: MIN_RETRY_TIMER,
            psk_config: None,
        }
    }
}

impl ClientConfig {
    /// Default configuration with the given PSK callbacks.
    #[must_use]
    pub fn with_psk(psk_config: PskConfig) -> Self {
        Self {
            psk_config: Some(psk_config),
            ..Self::default()
        }
    }

    pub(crate) fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }

    pub(crate) fn effective_retry_timer(&self) -> Duration {
        self.retry_timer.max(MIN_RETRY_TIMER)
    }
}

/// Validate an endpoint name.
pub(crate) fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(())
}
