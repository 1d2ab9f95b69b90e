//! Permission gating as a handler decorator.
//!
//! Sensitive capabilities are wrapped in [`Gated`] rather than checked
//! inline in the dispatch path. When the gate reports a missing
//! permission, the wrapper redirects to the gate's request flow and skips
//! the handler; the caller is expected to retry once permission has been
//! granted.

use std::sync::Arc;

use tracing::info;

use crate::grammar::Request;

use super::DISPATCH_TARGET;
use super::errors::CapabilityError;
use super::registry::{CapabilityContext, CapabilityHandler};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Granted,
    Denied,
}

/// External collaborator deciding whether a capability may run.
pub trait PermissionGate: Send + Sync + 'static {
    /// Checks whether `capability` currently holds `permission`.
    fn check(&self, capability: &str, permission: &str) -> PermissionDecision;

    /// Starts the out-of-band flow that asks the user to grant
    /// `permission`. Best effort; the current invocation is not resumed.
    fn request_permission(&self, capability: &str, permission: &str);
}

/// Gate that grants everything; the default for embedders without a
/// permission system.
#[derive(Debug, Default)]
pub struct AllowAllGate;

impl PermissionGate for AllowAllGate {
    fn check(&self, _capability: &str, _permission: &str) -> PermissionDecision {
        PermissionDecision::Granted
    }

    fn request_permission(&self, _capability: &str, _permission: &str) {}
}

/// Decorator that consults a [`PermissionGate`] before its inner handler.
pub struct Gated<H> {
    permission: &'static str,
    gate: Arc<dyn PermissionGate>,
    inner: H,
}

impl<H: CapabilityHandler> Gated<H> {
    /// Wraps `inner` so it only runs while `permission` is granted.
    pub fn new(permission: &'static str, gate: Arc<dyn PermissionGate>, inner: H) -> Self {
        Self {
            permission,
            gate,
            inner,
        }
    }
}

impl<H: CapabilityHandler> CapabilityHandler for Gated<H> {
    fn handle(&self, ctx: &CapabilityContext, request: &Request) -> Result<(), CapabilityError> {
        let capability = request.method().unwrap_or_default();
        if self.gate.check(capability, self.permission) == PermissionDecision::Denied {
            info!(
                target: DISPATCH_TARGET,
                capability,
                permission = self.permission,
                "permission missing; redirecting to request flow"
            );
            self.gate.request_permission(capability, self.permission);
            return Ok(());
        }
        self.inner.handle(ctx, request)
    }
}
