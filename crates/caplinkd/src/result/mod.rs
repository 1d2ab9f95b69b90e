//! Result-channel protocol.
//!
//! Every capability handler delivers its output through the shared
//! [`ResultReturner`]: a fresh outbound connection to the caller's
//! `socket_output` address carrying one of four payload modes (plain text,
//! streaming structured data, raw binary, or a single file-descriptor
//! handoff), plus an optional inbound connection draining caller-supplied
//! input from `socket_input`. Delivery is decoupled from the request
//! connection; the caller reads its ack on one socket and the result on
//! another it listens on itself.

mod address;
mod errors;
mod fd;
mod json;
mod returner;

pub use errors::ResultError;
pub use fd::{AncillaryTransport, FD_SENTINEL, FdChannel, ScmRightsTransport};
pub use json::JsonWriter;
pub use returner::{ResultPayload, ResultReturner, RunMode};

pub(crate) const RESULT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::result");
