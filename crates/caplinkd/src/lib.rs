//! The caplink daemon.
//!
//! `caplinkd` lets an external command-line process invoke host-capability
//! handlers inside this long-lived companion process, entirely over local
//! Unix-domain sockets. The crate is organised around the four pieces of
//! that substrate:
//!
//! - [`grammar`] turns a command-line-shaped request string into a typed
//!   [`grammar::Request`];
//! - [`transport`] owns the well-known listen endpoint, authenticates each
//!   peer by effective uid, and runs the strictly sequential accept loop;
//! - [`dispatch`] routes a request by method name to one registered
//!   [`dispatch::CapabilityHandler`], with permission gating as a handler
//!   decorator;
//! - [`result`] streams each handler's output back to the caller over a
//!   fresh connection in one of four payload modes, including an ancillary
//!   file-descriptor handoff.
//!
//! [`capabilities`] ships the built-in handler set, and [`Daemon`] wires
//! everything together with an explicit, test-friendly lifecycle.

pub mod capabilities;
pub mod dispatch;
pub mod grammar;
pub mod result;
pub mod transport;

mod bootstrap;
mod notify;
mod process;
mod telemetry;

pub use bootstrap::{BootstrapError, Daemon};
pub use notify::{FailureNotifier, LogNotifier};
pub use process::{LaunchError, run};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
