//! Peer authentication for accepted request connections.
//!
//! Only processes running as the daemon's own effective user may talk to
//! it. The check runs before any bytes are read: a foreign peer is dropped
//! silently, so it observes a closed connection rather than a protocol
//! error it could fingerprint.

use std::os::unix::net::UnixStream;

use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
use nix::unistd::Uid;
use tracing::debug;

use super::LISTENER_TARGET;

/// Decides whether an accepted connection may proceed to the parser.
pub trait PeerAuthenticator: Send + Sync + 'static {
    /// Returns true when the connecting peer is allowed to issue requests.
    fn authenticate(&self, stream: &UnixStream) -> bool;
}

/// Production authenticator: the peer's effective uid (via `SO_PEERCRED`)
/// must equal the daemon's own.
#[derive(Debug, Default)]
pub struct SameUserAuthenticator;

impl PeerAuthenticator for SameUserAuthenticator {
    fn authenticate(&self, stream: &UnixStream) -> bool {
        match getsockopt(stream, PeerCredentials) {
            Ok(credentials) => {
                let own_uid = Uid::effective().as_raw();
                let peer_uid = credentials.uid();
                if peer_uid == own_uid {
                    true
                } else {
                    debug!(
                        target: LISTENER_TARGET,
                        peer_uid,
                        "dropping connection from foreign user"
                    );
                    false
                }
            }
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    %error,
                    "failed to read peer credentials; dropping connection"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_process_connection_is_authenticated() {
        let (left, _right) = UnixStream::pair().expect("socket pair");
        assert!(SameUserAuthenticator.authenticate(&left));
    }
}
