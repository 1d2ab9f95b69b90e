//! Error types for socket listener operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
///
/// All of these are fatal to the listener component: it does not retry or
/// restart itself.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind listener at {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid abstract socket name '{name}': {source}")]
    AbstractName {
        name: String,
        #[source]
        source: io::Error,
    },
    #[cfg(not(target_os = "linux"))]
    #[error("abstract namespace sockets are unsupported on this platform")]
    AbstractUnsupported,
    #[error("existing socket {path} is already in use")]
    InUse { path: String },
    #[error("socket path {path} is not a socket")]
    NotSocket { path: String },
    #[error("failed to read metadata for socket {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to probe existing socket {path}: {source}")]
    Probe {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale socket {path}: {source}")]
    StaleCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}
