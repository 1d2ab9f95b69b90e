//! Error type for the client binary.

use std::io;

use thiserror::Error;

use caplink_config::ConfigError;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        #[source]
        source: ConfigError,
    },
    /// A command-line parameter value failed to parse.
    #[error("invalid {option} parameter '{value}': {message}")]
    InvalidParameter {
        option: &'static str,
        value: String,
        message: String,
    },
    /// The serialized request does not fit the 16-bit length frame.
    #[error("request of {size} bytes exceeds the {max}-byte frame limit")]
    RequestTooLong { size: usize, max: usize },
    /// No trusted directory is configured to host result sockets.
    #[error("no trusted directory available for result sockets")]
    NoResultDirectory,
    /// A result-listening socket could not be created.
    #[error("failed to prepare result socket under '{dir}': {source}")]
    ResultSocket {
        dir: String,
        #[source]
        source: io::Error,
    },
    /// Connecting to the daemon failed.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Abstract-namespace sockets are unavailable on this platform.
    #[error("abstract socket endpoints are unsupported on this platform")]
    AbstractUnsupported,
    /// The daemon reported a request error instead of the ack byte.
    #[error("daemon rejected the request: {message}")]
    Rejected { message: String },
    /// The daemon closed the request connection without a reply.
    #[error("daemon closed the connection without acknowledging the request")]
    NoAck,
    /// Plain I/O failure.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}
