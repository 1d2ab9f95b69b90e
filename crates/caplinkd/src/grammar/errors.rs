//! Error type for request grammar parsing.

use thiserror::Error;

/// First unrecoverable error found while scanning a request command line.
///
/// Every variant is fatal to the request: the listener writes the display
/// form back on the request connection and abandons dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// `--ez` value was neither a boolean literal nor an integer.
    #[error("invalid boolean argument: {token}")]
    InvalidBoolean { token: String },
    /// `--ei` value did not fit a 32-bit signed integer.
    #[error("invalid integer argument: {token}")]
    InvalidInteger { token: String },
    /// `--ef` value failed to parse as a float.
    #[error("invalid float argument: {token}")]
    InvalidFloat { token: String },
    /// An `--eia` element did not fit a 32-bit signed integer.
    #[error("invalid integer array argument: {token}")]
    InvalidIntArray { token: String },
    /// An `--ela` element did not fit a 64-bit signed integer.
    #[error("invalid long array argument: {token}")]
    InvalidLongArray { token: String },
    /// `--e`-prefixed flag with a type letter the grammar does not know.
    #[error("unsupported argument type: {token}")]
    UnsupportedType { token: String },
    /// Non-whitespace text survived every extraction pass.
    #[error("unsupported options: {residual}")]
    UnsupportedOptions { residual: String },
}

impl GrammarError {
    pub(crate) fn invalid_boolean(token: impl Into<String>) -> Self {
        Self::InvalidBoolean {
            token: token.into(),
        }
    }

    pub(crate) fn invalid_integer(token: impl Into<String>) -> Self {
        Self::InvalidInteger {
            token: token.into(),
        }
    }

    pub(crate) fn invalid_float(token: impl Into<String>) -> Self {
        Self::InvalidFloat {
            token: token.into(),
        }
    }

    pub(crate) fn invalid_int_array(token: impl Into<String>) -> Self {
        Self::InvalidIntArray {
            token: token.into(),
        }
    }

    pub(crate) fn invalid_long_array(token: impl Into<String>) -> Self {
        Self::InvalidLongArray {
            token: token.into(),
        }
    }

    pub(crate) fn unsupported_type(token: impl Into<String>) -> Self {
        Self::UnsupportedType {
            token: token.into(),
        }
    }

    pub(crate) fn unsupported_options(residual: impl Into<String>) -> Self {
        Self::UnsupportedOptions {
            residual: residual.into(),
        }
    }
}
