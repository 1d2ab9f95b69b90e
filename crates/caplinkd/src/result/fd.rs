//! Ancillary file-descriptor handoff on the output connection.
//!
//! A handler may pass at most one open descriptor to the caller. The
//! descriptor travels as SCM_RIGHTS ancillary data in the same message as
//! the `@` sentinel byte, so the caller observes both together on its
//! first read. The OS-specific send is behind [`AncillaryTransport`] so a
//! test double can stand in for real descriptors.

use std::io::{self, IoSlice, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use nix::sys::socket::{ControlMessage, MsgFlags, sendmsg};
use tracing::warn;

use super::RESULT_TARGET;
use super::errors::ResultError;

/// Sentinel the caller watches for alongside the ancillary payload.
pub const FD_SENTINEL: &[u8] = b"@";

/// Sends one descriptor plus sentinel bytes in a single message.
pub trait AncillaryTransport: Send + Sync + 'static {
    /// Sends `fd` as ancillary data attached to `sentinel`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the message cannot be sent in full.
    fn send_with_sentinel(
        &self,
        stream: &UnixStream,
        fd: BorrowedFd<'_>,
        sentinel: &[u8],
    ) -> io::Result<()>;
}

/// Production transport using SCM_RIGHTS control messages.
#[derive(Debug, Default)]
pub struct ScmRightsTransport;

impl AncillaryTransport for ScmRightsTransport {
    fn send_with_sentinel(
        &self,
        stream: &UnixStream,
        fd: BorrowedFd<'_>,
        sentinel: &[u8],
    ) -> io::Result<()> {
        let iov = [IoSlice::new(sentinel)];
        let fds = [fd.as_raw_fd()];
        let control = [ControlMessage::ScmRights(&fds)];
        let sent = sendmsg::<()>(
            stream.as_raw_fd(),
            &iov,
            &control,
            MsgFlags::empty(),
            None,
        )
        .map_err(io::Error::from)?;
        if sent != sentinel.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "short ancillary send",
            ));
        }
        Ok(())
    }
}

/// Write channel handed to descriptor-passing handlers.
///
/// Implements [`Write`] unbuffered over the output connection so plain
/// text and the sentinel can never be observed out of order.
pub struct FdChannel<'a> {
    stream: &'a UnixStream,
    transport: Arc<dyn AncillaryTransport>,
    sent: Option<OwnedFd>,
}

impl<'a> FdChannel<'a> {
    pub(super) fn new(stream: &'a UnixStream, transport: Arc<dyn AncillaryTransport>) -> Self {
        Self {
            stream,
            transport,
            sent: None,
        }
    }

    /// Sends `fd` together with the `@` sentinel.
    ///
    /// Only one handoff per invocation is supported. A second call is a
    /// protocol violation: it is rejected and logged, and the first
    /// handoff remains valid for the reader.
    ///
    /// # Errors
    ///
    /// Returns [`ResultError::DescriptorAlreadySent`] on a repeated send,
    /// or an I/O error when the ancillary message fails.
    pub fn send_descriptor(&mut self, fd: OwnedFd) -> Result<(), ResultError> {
        if self.sent.is_some() {
            warn!(
                target: RESULT_TARGET,
                "file descriptor already sent on this result channel"
            );
            return Err(ResultError::DescriptorAlreadySent);
        }
        self.transport
            .send_with_sentinel(self.stream, fd.as_fd(), FD_SENTINEL)?;
        // The descriptor stays open until delivery completes; it is
        // released when the channel is dropped.
        self.sent = Some(fd);
        Ok(())
    }
}

impl Write for FdChannel<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(&mut &*self.stream, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut &*self.stream)
    }
}
