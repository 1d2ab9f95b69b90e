//! Resolution of caller-supplied result socket addresses.
//!
//! Addresses arrive as plain strings inside the request. A leading path
//! separator selects the filesystem namespace, which must resolve under
//! the trusted-directory allow-list; anything else names an abstract
//! socket. Resolution fails closed: no connection is attempted for an
//! address that cannot be vetted.

use std::os::unix::net::UnixStream;

use caplink_config::{SocketEndpoint, TrustedDirectories};

use super::errors::ResultError;

pub(super) fn connect_result_socket(
    label: &'static str,
    raw: &str,
    trusted: &TrustedDirectories,
) -> Result<UnixStream, ResultError> {
    let endpoint = SocketEndpoint::from_raw(raw).map_err(|source| ResultError::InvalidAddress {
        label,
        address: raw.to_string(),
        source,
    })?;
    match &endpoint {
        SocketEndpoint::Filesystem { path } => {
            trusted
                .permit(path.as_path())
                .map_err(|source| ResultError::UntrustedAddress {
                    label,
                    address: raw.to_string(),
                    source,
                })?;
            UnixStream::connect(path.as_std_path()).map_err(|source| ResultError::Connect {
                label,
                address: raw.to_string(),
                source,
            })
        }
        SocketEndpoint::Abstract { name } => connect_abstract(label, name),
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(label: &'static str, name: &str) -> Result<UnixStream, ResultError> {
    use std::os::linux::net::SocketAddrExt;

    let address = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes()).map_err(
        |source| ResultError::Connect {
            label,
            address: name.to_string(),
            source,
        },
    )?;
    UnixStream::connect_addr(&address).map_err(|source| ResultError::Connect {
        label,
        address: name.to_string(),
        source,
    })
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_label: &'static str, name: &str) -> Result<UnixStream, ResultError> {
    Err(ResultError::AbstractUnsupported {
        name: name.to_string(),
    })
}
