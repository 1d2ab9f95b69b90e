//! Error type for result-channel delivery.

use std::io;

use thiserror::Error;

use caplink_config::{SocketParseError, TrustError};

/// Errors surfaced while delivering a result back to the caller.
///
/// All of these stay inside the result channel: they are logged, raised as
/// a best-effort failure notification, and never crash the daemon.
#[derive(Debug, Error)]
pub enum ResultError {
    /// The request carried no `socket_output` parameter.
    #[error("request carries no 'socket_output' parameter")]
    MissingOutputAddress,

    /// The request carried no `socket_input` parameter but the handler
    /// needs caller input.
    #[error("request carries no 'socket_input' parameter")]
    MissingInputAddress,

    /// A caller-supplied socket address failed to parse.
    #[error("invalid {label} socket address '{address}': {source}")]
    InvalidAddress {
        label: &'static str,
        address: String,
        #[source]
        source: SocketParseError,
    },

    /// A filesystem socket address fell outside the trusted directories.
    #[error("{label} socket address '{address}' refused: {source}")]
    UntrustedAddress {
        label: &'static str,
        address: String,
        #[source]
        source: TrustError,
    },

    /// Abstract-namespace sockets are unavailable on this platform.
    #[error("abstract socket '{name}' is unsupported on this platform")]
    AbstractUnsupported { name: String },

    /// Connecting to a caller socket failed.
    #[error("failed to connect to {label} socket '{address}': {source}")]
    Connect {
        label: &'static str,
        address: String,
        #[source]
        source: io::Error,
    },

    /// A second descriptor handoff was attempted on one result channel.
    #[error("a file descriptor was already sent on this result channel")]
    DescriptorAlreadySent,

    /// The handler drove the structured writer into an invalid state.
    #[error("malformed structured result: {message}")]
    Structure { message: String },

    /// Serializing a structured scalar failed.
    #[error("failed to serialize structured result: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O failed on an open result connection.
    #[error("I/O failure on result channel: {0}")]
    Io(#[from] io::Error),
}

impl ResultError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }
}
