//! Shared configuration for the caplink daemon and client.
//!
//! The crate owns the pieces both binaries must agree on: the socket
//! endpoint model (filesystem versus abstract namespace), the
//! trusted-directory allow-list applied to caller-supplied paths, logging
//! options, and the environment-driven [`Config`] loader.

mod defaults;
mod logging;
mod socket;
mod trust;

use std::env;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, default_listen_endpoint, default_log_filter, default_log_filter_string,
    default_log_format, default_runtime_directory, default_trusted_roots,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};
pub use trust::{TrustError, TrustedDirectories};

/// Environment variable naming the daemon listen endpoint.
pub const LISTEN_ENV_VAR: &str = "CAPLINKD_LISTEN";
/// Environment variable holding colon-separated trusted directories.
pub const TRUSTED_DIRS_ENV_VAR: &str = "CAPLINKD_TRUSTED_DIRS";
/// Environment variable overriding the log filter expression.
pub const LOG_FILTER_ENV_VAR: &str = "CAPLINKD_LOG_FILTER";
/// Environment variable overriding the log output format.
pub const LOG_FORMAT_ENV_VAR: &str = "CAPLINKD_LOG_FORMAT";

/// Runtime configuration shared by the daemon and client binaries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    /// Endpoint the daemon listens on for request connections.
    #[serde(default = "default_listen_endpoint")]
    pub listen: SocketEndpoint,
    /// Roots under which caller-supplied filesystem paths must live.
    #[serde(default = "default_trusted_roots")]
    pub trusted_dirs: Vec<Utf8PathBuf>,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            trusted_dirs: default_trusted_roots(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from `CAPLINKD_*` environment variables, with
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable is present but invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = env_var(LISTEN_ENV_VAR) {
            config.listen =
                SocketEndpoint::from_raw(&raw).map_err(|source| ConfigError::InvalidListen {
                    value: raw,
                    source,
                })?;
        }
        if let Some(raw) = env_var(TRUSTED_DIRS_ENV_VAR) {
            config.trusted_dirs = parse_trusted_dirs(&raw)?;
        }
        if let Some(raw) = env_var(LOG_FILTER_ENV_VAR) {
            config.log_filter = raw;
        }
        if let Some(raw) = env_var(LOG_FORMAT_ENV_VAR) {
            config.log_format =
                LogFormat::from_str(&raw).map_err(|source| ConfigError::InvalidLogFormat {
                    value: raw,
                    source,
                })?;
        }

        Ok(config)
    }

    /// The trusted-directory allow-list derived from this configuration.
    #[must_use]
    pub fn trusted(&self) -> TrustedDirectories {
        TrustedDirectories::new(self.trusted_dirs.clone())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_trusted_dirs(raw: &str) -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let mut roots = Vec::new();
    for entry in raw.split(':').filter(|entry| !entry.is_empty()) {
        let path = Utf8PathBuf::from(entry);
        if !path.is_absolute() {
            return Err(ConfigError::RelativeTrustedDir {
                value: entry.to_string(),
            });
        }
        roots.push(path);
    }
    if roots.is_empty() {
        return Err(ConfigError::EmptyTrustedDirs);
    }
    Ok(roots)
}

/// Errors surfaced while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The listen endpoint variable held an invalid value.
    #[error("invalid CAPLINKD_LISTEN value '{value}': {source}")]
    InvalidListen {
        value: String,
        #[source]
        source: SocketParseError,
    },
    /// The log format variable held an unrecognised value.
    #[error("invalid CAPLINKD_LOG_FORMAT value '{value}': {source}")]
    InvalidLogFormat {
        value: String,
        #[source]
        source: LogFormatParseError,
    },
    /// A trusted directory entry was relative.
    #[error("trusted directory '{value}' is not absolute")]
    RelativeTrustedDir { value: String },
    /// The trusted directory list parsed to nothing.
    #[error("trusted directory list is empty")]
    EmptyTrustedDirs,
}
