//! Process entry: configuration, telemetry, signals, shutdown.

use std::io;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use caplink_config::{Config, ConfigError};

use crate::bootstrap::{BootstrapError, Daemon};
use crate::capabilities;
use crate::dispatch::AllowAllGate;
use crate::telemetry::{self, TelemetryError};
use crate::transport::ListenerError;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        #[source]
        source: ConfigError,
    },
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The daemon failed to boot.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Signal handling could not be registered.
    #[error("failed to register signal handler: {source}")]
    Signals {
        #[source]
        source: io::Error,
    },
    /// The listener thread ended abnormally.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Runs the daemon until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns a [`LaunchError`] when startup fails or the listener thread
/// ends abnormally.
pub fn run() -> Result<(), LaunchError> {
    let config = Config::load().map_err(|source| LaunchError::Config { source })?;
    telemetry::initialise(&config)?;

    let registry = capabilities::default_registry(Arc::new(AllowAllGate));
    let daemon = Daemon::bootstrap(&config, registry)?;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).map_err(|source| LaunchError::Signals { source })?;
    if let Some(signal) = signals.forever().next() {
        info!(target: PROCESS_TARGET, signal, "shutdown signal received");
    }

    daemon.shutdown();
    daemon.join()?;
    Ok(())
}
