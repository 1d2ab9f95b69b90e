//! Socket plumbing for the client.
//!
//! The client opens three kinds of connections: the request connection to
//! the daemon's listen endpoint (length-prefixed frame out, ack byte or
//! error line back), a listening socket for the result the daemon
//! connects back to, and optionally a listening socket serving handler
//! input. The first read on a result connection uses an ancillary buffer
//! so a passed file descriptor is caught together with its `@` sentinel.

use std::fs;
use std::io::{self, IoSliceMut, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use nix::sys::socket::{ControlMessageOwned, MsgFlags, recvmsg};
use socket2::{Domain, SockAddr, Socket, Type};

use caplink_config::SocketEndpoint;

use super::ClientError;

/// Timeout for connecting to the daemon's listen endpoint.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request the 16-bit length frame can carry.
pub const MAX_REQUEST_BYTES: usize = u16::MAX as usize;

/// Sentinel announcing a descriptor handoff on a result connection.
pub const FD_SENTINEL: u8 = b'@';

/// Connects to the daemon's listen endpoint.
///
/// # Errors
///
/// Returns a [`ClientError`] when the endpoint is unreachable.
pub fn connect(endpoint: &SocketEndpoint) -> Result<UnixStream, ClientError> {
    match endpoint {
        SocketEndpoint::Filesystem { path } => {
            connect_filesystem(path.as_str()).map_err(|source| ClientError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })
        }
        SocketEndpoint::Abstract { name } => connect_abstract(name).map_err(|source| {
            ClientError::Connect {
                endpoint: endpoint.to_string(),
                source,
            }
        }),
    }
}

fn connect_filesystem(path: &str) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    Ok(UnixStream::from(OwnedFd::from(socket)))
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;

    let address = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    UnixStream::connect_addr(&address)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract namespace sockets are unsupported on this platform",
    ))
}

/// Frames and sends one request line.
///
/// # Errors
///
/// Returns [`ClientError::RequestTooLong`] for oversized requests, or the
/// underlying I/O error.
pub fn send_request(stream: &mut UnixStream, line: &str) -> Result<(), ClientError> {
    let bytes = line.as_bytes();
    let length = u16::try_from(bytes.len()).map_err(|_| ClientError::RequestTooLong {
        size: bytes.len(),
        max: MAX_REQUEST_BYTES,
    })?;
    stream.write_all(&length.to_be_bytes())?;
    stream.write_all(bytes)?;
    stream.flush()?;
    Ok(())
}

/// Waits for the daemon's reply on the request connection.
///
/// # Errors
///
/// Returns [`ClientError::Rejected`] with the daemon's error line,
/// [`ClientError::NoAck`] when the connection closes silently, or the
/// underlying I/O error.
pub fn await_ack(stream: &mut UnixStream) -> Result<(), ClientError> {
    let mut first = [0_u8; 1];
    match stream.read(&mut first)? {
        0 => Err(ClientError::NoAck),
        _ if first[0] == 0x00 => Ok(()),
        _ => {
            let mut rest = Vec::new();
            stream.read_to_end(&mut rest)?;
            let mut message = Vec::with_capacity(rest.len() + 1);
            message.push(first[0]);
            message.extend_from_slice(&rest);
            Err(ClientError::Rejected {
                message: String::from_utf8_lossy(&message).trim_end().to_string(),
            })
        }
    }
}

static SOCKET_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A per-invocation listening socket the daemon connects back to.
pub struct ResultListener {
    listener: UnixListener,
    path: Utf8PathBuf,
}

impl ResultListener {
    /// Binds a uniquely named socket under `dir` (which must be one of
    /// the daemon's trusted directories).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ResultSocket`] when the socket cannot be
    /// created.
    pub fn bind(dir: &Utf8Path, label: &str) -> Result<Self, ClientError> {
        let sequence = SOCKET_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "caplink-{label}-{}-{sequence}.sock",
            std::process::id()
        );
        let path = dir.join(name);
        fs::create_dir_all(dir.as_std_path()).map_err(|source| ClientError::ResultSocket {
            dir: dir.to_string(),
            source,
        })?;
        let listener =
            UnixListener::bind(path.as_std_path()).map_err(|source| ClientError::ResultSocket {
                dir: dir.to_string(),
                source,
            })?;
        Ok(Self { listener, path })
    }

    /// The address value to place in the request parameters.
    #[must_use]
    pub fn address(&self) -> &str {
        self.path.as_str()
    }

    /// Accepts the daemon's connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying accept error.
    pub fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _) = self.listener.accept()?;
        Ok(stream)
    }
}

impl Drop for ResultListener {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.as_std_path());
    }
}

/// Payload read from one result connection.
pub struct ReceivedResult {
    /// Every data byte the connection carried (including the sentinel
    /// when a descriptor was passed).
    pub data: Vec<u8>,
    /// Descriptor received as ancillary data, if any.
    pub descriptor: Option<OwnedFd>,
}

/// Reads a whole result connection.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn read_result(connection: &UnixStream) -> io::Result<ReceivedResult> {
    let mut buffer = vec![0_u8; 8 * 1024];
    let (first, descriptor) = recv_with_ancillary(connection, &mut buffer)?;
    let mut data = buffer[..first].to_vec();
    Read::read_to_end(&mut &*connection, &mut data)?;
    Ok(ReceivedResult { data, descriptor })
}

/// One receive with room for an SCM_RIGHTS control message.
fn recv_with_ancillary(
    connection: &UnixStream,
    buffer: &mut [u8],
) -> io::Result<(usize, Option<OwnedFd>)> {
    let mut descriptor = None;
    let bytes = {
        let mut iov = [IoSliceMut::new(buffer)];
        let mut cmsg_buffer = nix::cmsg_space!([RawFd; 1]);
        let message = recvmsg::<()>(
            connection.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_buffer),
            MsgFlags::empty(),
        )
        .map_err(io::Error::from)?;
        for control in message.cmsgs() {
            if let ControlMessageOwned::ScmRights(fds) = control {
                descriptor = fds
                    .first()
                    .map(|&raw| unsafe { OwnedFd::from_raw_fd(raw) });
            }
        }
        message.bytes
    };
    Ok((bytes, descriptor))
}
