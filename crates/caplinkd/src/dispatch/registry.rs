//! Name-keyed capability registry and the dispatcher built on it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use caplink_config::TrustedDirectories;

use crate::grammar::Request;
use crate::result::{ResultReturner, RunMode};

use super::DISPATCH_TARGET;
use super::errors::CapabilityError;

/// A unit of logic bound to one method name.
///
/// Handlers run on the listener thread and must return promptly: anything
/// long-running is handed to the result channel, which moves the work to
/// its own delivery thread.
pub trait CapabilityHandler: Send + Sync + 'static {
    /// Handles one invocation.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] when the invocation cannot proceed;
    /// the dispatcher converts it into a logged failure plus an empty
    /// result connection.
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError>;
}

/// Shared collaborators handed to every handler invocation.
pub struct CapabilityContext {
    returner: Arc<ResultReturner>,
    trusted: TrustedDirectories,
}

impl CapabilityContext {
    /// Creates a context around the shared result returner.
    pub fn new(returner: Arc<ResultReturner>, trusted: TrustedDirectories) -> Self {
        Self { returner, trusted }
    }

    /// The shared result-channel helper.
    #[must_use]
    pub fn returner(&self) -> &ResultReturner {
        &self.returner
    }

    /// Allow-list applied to caller-supplied filesystem paths.
    #[must_use]
    pub fn trusted(&self) -> &TrustedDirectories {
        &self.trusted
    }
}

/// Static name → handler mapping built at process start.
#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: HashMap<&'static str, Box<dyn CapabilityHandler>>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its method name, replacing any previous
    /// registration for that name.
    pub fn register(&mut self, method: &'static str, handler: impl CapabilityHandler) {
        self.handlers.insert(method, Box::new(handler));
    }

    /// Registered method names, for diagnostics.
    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    fn get(&self, method: &str) -> Option<&dyn CapabilityHandler> {
        self.handlers.get(method).map(Box::as_ref)
    }
}

/// Routes a parsed request to exactly one registered handler.
pub struct CapabilityDispatcher {
    registry: CapabilityRegistry,
    context: CapabilityContext,
}

impl CapabilityDispatcher {
    /// Creates a dispatcher over a finished registry.
    pub fn new(registry: CapabilityRegistry, context: CapabilityContext) -> Self {
        Self { registry, context }
    }

    /// Dispatches one request.
    ///
    /// Routing failures are logged and dropped: the caller already received
    /// its request ack, and nothing further is owed on that connection.
    /// Handler failures are caught here so a misbehaving capability can
    /// never take down the listener.
    pub fn dispatch(&self, request: Request) {
        let Some(method) = request.method() else {
            error!(
                target: DISPATCH_TARGET,
                "request is missing the 'api_method' parameter"
            );
            return;
        };
        let Some(handler) = self.registry.get(method) else {
            error!(
                target: DISPATCH_TARGET,
                method,
                "unrecognized capability method"
            );
            return;
        };

        debug!(target: DISPATCH_TARGET, method, "dispatching request");
        if let Err(failure) = handler.handle(&self.context, &request) {
            error!(
                target: DISPATCH_TARGET,
                method,
                error = %failure,
                "capability handler failed"
            );
            self.context
                .returner()
                .notify_failure(method, &failure.to_string());
            // Open and close the result connection so the caller is not
            // left blocking on a result that will never come.
            if request.output_address().is_some() {
                self.context
                    .returner()
                    .note_done(&request, RunMode::Background);
            }
        }
    }
}
