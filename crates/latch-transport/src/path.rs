//! Endpoint path construction.
//!
//! An endpoint name combines with a platform directory prefix to produce
//! the filesystem path (POSIX) or pipe name (Windows) the transport binds
//! or dials.

use std::path::{Path, PathBuf};

/// Default socket directory on POSIX targets.
pub const DEFAULT_SOCKET_DIR: &str = "/tmp/";

/// Default pipe namespace on Windows.
pub const DEFAULT_PIPE_DIR: &str = r"\\.\pipe\";

/// Build the Unix socket path for `name`: `<dir or /tmp/>/<name>.sock`.
#[must_use]
pub fn socket_path(dir: Option<&Path>, name: &str) -> PathBuf {
    let base = dir.unwrap_or_else(|| Path::new(DEFAULT_SOCKET_DIR));
    base.join(format!("{name}.sock"))
}

/// Build the named pipe path for `name`: `<dir or \\.\pipe\>\<name>`.
#[must_use]
pub fn pipe_path(dir: Option<&Path>, name: &str) -> String {
    let mut base = match dir {
        Some(d) => d.to_string_lossy().into_owned(),
        None => return format!("{DEFAULT_PIPE_DIR}{name}"),
    };
    if !base.ends_with('\\') {
        base.push('\\');
    }
    base.push_str(name);
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_default_dir() {
        assert_eq!(
            socket_path(None, "latchd"),
            PathBuf::from("/tmp/latchd.sock")
        );
    }

    #[test]
    fn socket_path_custom_dir() {
        assert_eq!(
            socket_path(Some(Path::new("/run/latch")), "svc"),
            PathBuf::from("/run/latch/svc.sock")
        );
    }

    #[test]
    fn socket_path_trailing_separator() {
        assert_eq!(
            socket_path(Some(Path::new("/run/latch/")), "svc"),
            PathBuf::from("/run/latch/svc.sock")
        );
    }

    #[test]
    fn pipe_path_default_namespace() {
        assert_eq!(pipe_path(None, "latchd"), r"\\.\pipe\latchd");
    }

    #[test]
    fn pipe_path_appends_separator() {
        assert_eq!(
            pipe_path(Some(Path::new(r"\\.\pipe\latch")), "svc"),
            r"\\.\pipe\latch\svc"
        );
        assert_eq!(
            pipe_path(Some(Path::new(r"\\.\pipe\latch\")), "svc"),
            r"\\.\pipe\latch\svc"
        );
    }
}
