use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::socket::SocketEndpoint;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::default()
}

/// Directory holding the listen socket and per-invocation result sockets.
///
/// Prefers the user runtime directory (`$XDG_RUNTIME_DIR/caplink`); when
/// unavailable, falls back to a uid-scoped directory under the system
/// temporary directory so concurrent users never share socket paths.
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("caplink");
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

/// Computes the default listen endpoint for the daemon.
#[must_use]
pub fn default_listen_endpoint() -> SocketEndpoint {
    SocketEndpoint::filesystem(default_runtime_directory().join("caplinkd.sock"))
}

/// Default trusted roots for caller-supplied filesystem paths.
#[must_use]
pub fn default_trusted_roots() -> Vec<Utf8PathBuf> {
    vec![default_runtime_directory()]
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    "shared".to_string()
}
