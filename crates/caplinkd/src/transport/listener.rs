//! Listener implementation for the daemon request socket.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use caplink_config::SocketEndpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);

/// Listener bound to the daemon's request endpoint.
///
/// The accept loop is strictly sequential: each accepted connection is
/// authenticated, read, parsed, and dispatched inline before the next
/// accept. Handlers hand long-running work off to the result channel, so a
/// single request never holds the loop for long.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: UnixListener,
}

impl SocketListener {
    /// Binds the listener to the given endpoint.
    ///
    /// A stale filesystem socket left behind by a dead daemon is removed; a
    /// live one fails the bind. Bind failure is fatal to the component.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the endpoint cannot be bound.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Filesystem { path } => bind_filesystem(path.as_std_path())?,
            SocketEndpoint::Abstract { name } => bind_abstract(name)?,
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Starts the accept loop on its dedicated background thread.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the listener cannot be switched to
    /// non-blocking mode (required for cooperative shutdown).
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_socket_file(&self.endpoint);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, shutdown_flag, handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Requests cooperative shutdown of the accept loop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the listener thread to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => Ok(()),
                Err(_) => Err(ListenerError::ThreadPanic),
            }
        } else {
            Ok(())
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "request listener active"
    );
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                // Handled inline: no other connection is accepted until this
                // request has been read and dispatched.
                handler.handle(stream);
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(source) => {
                error!(
                    target: LISTENER_TARGET,
                    error = %source,
                    "accept failed; listener terminating"
                );
                break;
            }
        }
    }

    cleanup_socket_file(&listener.endpoint);
    info!(target: LISTENER_TARGET, "request listener stopped");
}

fn accept_connection(listener: &UnixListener) -> Result<Option<UnixStream>, io::Error> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_filesystem(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| ListenerError::Metadata {
            path: path.display().to_string(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::NotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::InUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::StaleCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::Probe {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        endpoint: path.display().to_string(),
        source,
    })
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> Result<UnixListener, ListenerError> {
    use std::os::linux::net::SocketAddrExt;

    let address = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes()).map_err(
        |source| ListenerError::AbstractName {
            name: name.to_string(),
            source,
        },
    )?;
    UnixListener::bind_addr(&address).map_err(|source| ListenerError::Bind {
        endpoint: format!("abstract://{name}"),
        source,
    })
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> Result<UnixListener, ListenerError> {
    Err(ListenerError::AbstractUnsupported)
}

fn cleanup_socket_file(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.filesystem_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove socket file"
        );
    }
}
