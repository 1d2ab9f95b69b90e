//! Capability dispatch for parsed requests.
//!
//! The dispatcher owns a name-keyed registry of capability handlers built
//! once at bootstrap. Routing is by the request's `api_method` parameter;
//! unknown or missing methods are logged and dropped (the caller already
//! received its request ack, and no result connection is owed). Permission
//! gating wraps individual handlers as a decorator rather than living in
//! the dispatch path.

mod errors;
mod gate;
mod registry;

pub use errors::CapabilityError;
pub use gate::{AllowAllGate, Gated, PermissionDecision, PermissionGate};
pub use registry::{
    CapabilityContext, CapabilityDispatcher, CapabilityHandler, CapabilityRegistry,
};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
