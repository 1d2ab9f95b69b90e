//! Best-effort user-facing failure notifications.
//!
//! Result-delivery and handler failures are surfaced to the user out of
//! band, in addition to the log line. On a headless host "out of band" is
//! still the log stream, so the default notifier reports at error level;
//! embedders with a desktop session can inject their own implementation.

use tracing::error;

pub(crate) const NOTIFY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::notify");

/// Raises best-effort, user-visible failure notifications.
///
/// Implementations must never fail and never block for long; callers
/// invoke this on error paths that have already gone wrong once.
pub trait FailureNotifier: Send + Sync + 'static {
    /// Notifies the user that `capability` failed with `summary`.
    fn notify(&self, capability: &str, summary: &str);
}

/// Default notifier: an error-level log record.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl FailureNotifier for LogNotifier {
    fn notify(&self, capability: &str, summary: &str) {
        error!(
            target: NOTIFY_TARGET,
            capability,
            "capability failed: {summary}"
        );
    }
}
