//! Windows named pipe backend.
//!
//! Named pipes have no listener object: every accepted peer consumes one
//! pipe instance. [`Listener`] keeps the next instance pre-created so a
//! connecting client always finds the pipe present, which mirrors the
//! accept semantics of the Unix backend.

use std::ffi::c_void;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use tokio::net::windows::named_pipe::{
    ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
};
use tracing::debug;

use crate::path::pipe_path;
use crate::ListenOptions;

/// Stream type handed to the server for each accepted peer.
pub type ServerStream = NamedPipeServer;

/// Stream type returned to a dialing client.
pub type ClientStream = NamedPipeClient;

/// `ERROR_PIPE_BUSY`: all pipe instances are busy; the client should retry.
const PIPE_BUSY: i32 = windows_sys::Win32::Foundation::ERROR_PIPE_BUSY as i32;

/// A bound named pipe endpoint.
pub struct Listener {
    path: String,
    security_descriptor: Option<String>,
    next: Option<NamedPipeServer>,
}

/// Create the named pipe `<dir or \\.\pipe\>\<name>` and prepare it for
/// accepting clients.
///
/// When `options.security_descriptor` is set, the SDDL string is converted
/// to a security descriptor and applied to every pipe instance.
///
/// # Errors
///
/// Returns the underlying error if the pipe cannot be created (for example
/// when another process already owns the name) or the SDDL string is
/// invalid.
pub fn listen(dir: Option<&Path>, name: &str, options: &ListenOptions) -> io::Result<Listener> {
    let path = pipe_path(dir, name);
    let first = create_instance(&path, options.security_descriptor.as_deref(), true)?;

    debug!(%path, "listening");
    Ok(Listener {
        path,
        security_descriptor: options.security_descriptor.clone(),
        next: Some(first),
    })
}

impl Listener {
    /// Wait for the next peer connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying connect error for the current pipe instance.
    pub async fn accept(&mut self) -> io::Result<ServerStream> {
        let server = match self.next.take() {
            Some(instance) => instance,
            None => create_instance(&self.path, self.security_descriptor.as_deref(), false)?,
        };
        server.connect().await?;

        // Pre-create the next instance so later dials never observe a
        // missing pipe. A failure here surfaces on the next accept.
        self.next = create_instance(&self.path, self.security_descriptor.as_deref(), false).ok();

        Ok(server)
    }
}

fn create_instance(
    path: &str,
    sddl: Option<&str>,
    first: bool,
) -> io::Result<NamedPipeServer> {
    let mut options = ServerOptions::new();
    options.first_pipe_instance(first);

    match sddl {
        None => options.create(path),
        Some(sddl) => {
            let descriptor = SecurityDescriptor::from_sddl(sddl)?;
            let mut attributes = windows_sys::Win32::Security::SECURITY_ATTRIBUTES {
                nLength: std::mem::size_of::<windows_sys::Win32::Security::SECURITY_ATTRIBUTES>()
                    as u32,
                lpSecurityDescriptor: descriptor.raw,
                bInheritHandle: 0,
            };
            unsafe {
                options.create_with_security_attributes_raw(
                    path,
                    &mut attributes as *mut _ as *mut c_void,
                )
            }
        }
    }
}

/// Connect to the named pipe `<dir or \\.\pipe\>\<name>`.
///
/// # Errors
///
/// Returns the underlying open error. Use [`is_retryable`] to decide
/// whether the failure means the server simply is not up yet.
pub async fn dial(dir: Option<&Path>, name: &str) -> io::Result<ClientStream> {
    ClientOptions::new().open(pipe_path(dir, name))
}

/// Whether a dial error is transient: the pipe does not exist yet, or all
/// of its instances are busy.
#[must_use]
pub fn is_retryable(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(PIPE_BUSY)
}

/// Owned security descriptor converted from an SDDL string.
///
/// The descriptor memory is allocated by the OS and released on drop.
struct SecurityDescriptor {
    raw: *mut c_void,
}

impl SecurityDescriptor {
    fn from_sddl(sddl: &str) -> io::Result<Self> {
        use windows_sys::Win32::Security::Authorization::{
            ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
        };

        let wide: Vec<u16> = std::ffi::OsStr::new(sddl)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let mut raw: *mut c_void = std::ptr::null_mut();

        let ok = unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                wide.as_ptr(),
                SDDL_REVISION_1 as u32,
                &mut raw,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { raw })
    }
}

impl Drop for SecurityDescriptor {
    fn drop(&mut self) {
        unsafe {
            windows_sys::Win32::System::Memory::LocalFree(self.raw as _);
        }
    }
}
