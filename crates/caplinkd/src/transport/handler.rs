//! Per-connection request handling.
//!
//! Each accepted connection carries exactly one request/ack cycle: a
//! 2-byte big-endian length, that many bytes of UTF-8 command text, and a
//! single `0x00` acknowledgement byte back on success or one error line
//! back on parse failure. Nothing else is exchanged; the eventual result
//! travels over a separate connection the handler opens later.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dispatch::CapabilityDispatcher;
use crate::grammar;

use super::{LISTENER_TARGET, PeerAuthenticator};

/// Acknowledgement byte confirming the request was accepted for processing.
const REQUEST_ACK: u8 = 0x00;

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: UnixStream);
}

/// Production handler: authenticates the peer, reads the framed command
/// line, parses it, and routes the typed request to the dispatcher.
pub struct RequestConnectionHandler {
    authenticator: Box<dyn PeerAuthenticator>,
    dispatcher: Arc<CapabilityDispatcher>,
}

impl RequestConnectionHandler {
    /// Creates a handler with the given peer authenticator and dispatcher.
    pub fn new(
        authenticator: Box<dyn PeerAuthenticator>,
        dispatcher: Arc<CapabilityDispatcher>,
    ) -> Self {
        Self {
            authenticator,
            dispatcher,
        }
    }

    fn serve(&self, mut stream: UnixStream) {
        if !self.authenticator.authenticate(&stream) {
            // Silent drop: a foreign peer gets a closed connection, not a
            // protocol error it could fingerprint.
            return;
        }

        let command = match read_request_frame(&mut stream) {
            Ok(command) => command,
            Err(error) => {
                warn!(target: LISTENER_TARGET, %error, "failed to read request frame");
                return;
            }
        };

        match grammar::parse(&command) {
            Ok(request) => {
                debug!(
                    target: LISTENER_TARGET,
                    method = request.method().unwrap_or("<none>"),
                    "request parsed"
                );
                self.dispatcher.dispatch(request);
                if let Err(error) = write_ack(&mut stream) {
                    warn!(target: LISTENER_TARGET, %error, "failed to write request ack");
                }
            }
            Err(error) => {
                info!(target: LISTENER_TARGET, %error, "rejecting malformed request");
                if let Err(io_error) = write_error_line(&mut stream, &error.to_string()) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %io_error,
                        "failed to report parse error to caller"
                    );
                }
            }
        }
    }
}

impl ConnectionHandler for RequestConnectionHandler {
    fn handle(&self, stream: UnixStream) {
        self.serve(stream);
    }
}

/// Reads the length-prefixed request frame.
///
/// The length is an unsigned 16-bit big-endian value; the payload is
/// decoded lossily so a stray invalid byte degrades to a replacement
/// character instead of killing the connection.
fn read_request_frame(stream: &mut UnixStream) -> io::Result<String> {
    let mut length_buffer = [0_u8; 2];
    stream.read_exact(&mut length_buffer)?;
    let length = usize::from(u16::from_be_bytes(length_buffer));
    let mut payload = vec![0_u8; length];
    stream.read_exact(&mut payload)?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

fn write_ack(stream: &mut UnixStream) -> io::Result<()> {
    stream.write_all(&[REQUEST_ACK])?;
    stream.flush()
}

fn write_error_line(stream: &mut UnixStream, message: &str) -> io::Result<()> {
    stream.write_all(message.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()
}
