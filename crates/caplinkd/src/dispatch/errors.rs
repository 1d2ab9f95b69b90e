//! Error type for capability handler failures.

use std::io;

use thiserror::Error;

use caplink_config::TrustError;

use crate::result::ResultError;

/// Errors a capability handler may surface to the dispatcher.
///
/// These never propagate past the dispatch boundary: they are logged,
/// reported through the failure notifier, and answered with an empty
/// result connection so the caller does not block.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The request lacked or mangled a parameter the handler needs.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A caller-supplied path failed the trusted-directory check.
    #[error(transparent)]
    Untrusted(#[from] TrustError),

    /// Result delivery failed before it could be handed off.
    #[error(transparent)]
    Result(#[from] ResultError),

    /// Handler-local I/O failed.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}

impl CapabilityError {
    /// Creates an invalid-arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}
