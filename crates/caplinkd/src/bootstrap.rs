//! Daemon wiring: registry, dispatcher, and listener lifecycle.
//!
//! A [`Daemon`] owns one listener on one endpoint. The binary creates
//! exactly one; tests construct independent instances on their own
//! endpoints, which is why nothing here lives in ambient global state.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use caplink_config::{Config, SocketPreparationError};

use crate::dispatch::{CapabilityContext, CapabilityDispatcher, CapabilityRegistry};
use crate::notify::{FailureNotifier, LogNotifier};
use crate::result::ResultReturner;
use crate::transport::{
    ListenerError, ListenerHandle, PeerAuthenticator, RequestConnectionHandler,
    SameUserAuthenticator, SocketListener,
};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Errors surfaced while bringing the daemon up.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Preparing the listen socket's directory failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        #[source]
        source: SocketPreparationError,
    },
    /// The listener could not be bound or started.
    #[error("failed to start listener: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
}

/// A running daemon instance.
pub struct Daemon {
    listener: ListenerHandle,
}

impl Daemon {
    /// Boots a daemon with the production authenticator and notifier.
    ///
    /// # Errors
    ///
    /// Returns a [`BootstrapError`] when the listen endpoint cannot be
    /// prepared or bound.
    pub fn bootstrap(config: &Config, registry: CapabilityRegistry) -> Result<Self, BootstrapError> {
        Self::bootstrap_with(
            config,
            registry,
            Arc::new(LogNotifier),
            Box::new(SameUserAuthenticator),
        )
    }

    /// Boots a daemon with injected collaborators; the seam tests use to
    /// substitute authenticators and notifiers.
    ///
    /// # Errors
    ///
    /// Returns a [`BootstrapError`] when the listen endpoint cannot be
    /// prepared or bound.
    pub fn bootstrap_with(
        config: &Config,
        registry: CapabilityRegistry,
        notifier: Arc<dyn FailureNotifier>,
        authenticator: Box<dyn PeerAuthenticator>,
    ) -> Result<Self, BootstrapError> {
        config
            .listen
            .prepare_filesystem()
            .map_err(|source| BootstrapError::Socket { source })?;

        let trusted = config.trusted();
        let returner = Arc::new(ResultReturner::new(trusted.clone(), notifier));
        let context = CapabilityContext::new(returner, trusted);
        let dispatcher = Arc::new(CapabilityDispatcher::new(registry, context));
        let handler = Arc::new(RequestConnectionHandler::new(authenticator, dispatcher));

        let listener = SocketListener::bind(&config.listen)
            .map_err(|source| BootstrapError::Listener { source })?;
        let handle = listener
            .start(handler)
            .map_err(|source| BootstrapError::Listener { source })?;

        info!(
            target: BOOTSTRAP_TARGET,
            endpoint = %config.listen,
            "daemon ready"
        );
        Ok(Self { listener: handle })
    }

    /// Requests cooperative shutdown of the listener.
    pub fn shutdown(&self) {
        self.listener.shutdown();
    }

    /// Waits for the listener thread to exit.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the listener thread panicked.
    pub fn join(self) -> Result<(), ListenerError> {
        self.listener.join()
    }
}
