//! Socket listener for the daemon's request endpoint.
//!
//! The transport module binds the well-known local endpoint, accepts
//! request connections one at a time in a background thread, authenticates
//! each peer, and hands the framed command line to the connection handler.

mod auth;
mod errors;
mod handler;
mod listener;

pub use auth::{PeerAuthenticator, SameUserAuthenticator};
pub use errors::ListenerError;
pub use handler::{ConnectionHandler, RequestConnectionHandler};
pub use listener::{ListenerHandle, SocketListener};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
