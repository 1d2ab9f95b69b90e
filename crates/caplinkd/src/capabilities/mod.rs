//! Built-in capability handlers.
//!
//! The interesting capabilities of a deployment are registered by the
//! embedder; this module ships the handlers a bare daemon provides on any
//! Linux host, chosen so every result mode of the channel protocol is
//! exercised: structured output (`SystemInfo`), text and caller input
//! (`Clipboard`, `Echo`), raw binary (`StorageRead`), and descriptor
//! handoff (`StorageOpen`).

mod clipboard;
mod echo;
mod storage;
mod system_info;

use std::sync::Arc;

pub use clipboard::ClipboardHandler;
pub use echo::EchoHandler;
pub use storage::{StorageOpenHandler, StorageReadHandler};
pub use system_info::SystemInfoHandler;

use crate::dispatch::{CapabilityRegistry, Gated, PermissionGate};

/// Permission name guarding the storage capabilities.
pub const STORAGE_PERMISSION: &str = "storage";

/// Builds the default registry, wiring the storage capabilities through
/// the given permission gate.
#[must_use]
pub fn default_registry(gate: Arc<dyn PermissionGate>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register("SystemInfo", SystemInfoHandler);
    registry.register("Clipboard", ClipboardHandler::default());
    registry.register("Echo", EchoHandler);
    registry.register(
        "StorageRead",
        Gated::new(STORAGE_PERMISSION, Arc::clone(&gate), StorageReadHandler),
    );
    registry.register(
        "StorageOpen",
        Gated::new(STORAGE_PERMISSION, gate, StorageOpenHandler),
    );
    registry
}
