use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A local socket endpoint in one of the two Unix-domain namespaces.
///
/// Callers supply endpoints as plain strings; the namespace is chosen by
/// whether the value begins with a path separator. `/run/user/…/out.sock`
/// is a filesystem endpoint, anything else names an abstract-namespace
/// socket.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "namespace", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Socket bound to a filesystem path.
    Filesystem { path: Utf8PathBuf },
    /// Socket in the Linux abstract namespace.
    Abstract { name: String },
}

impl SocketEndpoint {
    /// Builds a filesystem-namespace endpoint.
    #[must_use]
    pub fn filesystem(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Filesystem { path: path.into() }
    }

    /// Builds an abstract-namespace endpoint.
    #[must_use]
    pub fn abstract_namespace(name: impl Into<String>) -> Self {
        Self::Abstract { name: name.into() }
    }

    /// Classifies a caller-supplied address string.
    ///
    /// # Errors
    ///
    /// Returns `SocketParseError::Empty` when the address is empty.
    pub fn from_raw(raw: &str) -> Result<Self, SocketParseError> {
        if raw.is_empty() {
            return Err(SocketParseError::Empty);
        }
        if raw.starts_with('/') {
            Ok(Self::filesystem(raw))
        } else {
            Ok(Self::abstract_namespace(raw))
        }
    }

    /// Returns the filesystem path when the endpoint lives on disk.
    #[must_use]
    pub fn filesystem_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Filesystem { path } => Some(path.as_ref()),
            Self::Abstract { .. } => None,
        }
    }

    /// Returns the endpoint in the plain form callers put on the wire.
    #[must_use]
    pub fn raw_value(&self) -> &str {
        match self {
            Self::Filesystem { path } => path.as_str(),
            Self::Abstract { name } => name.as_str(),
        }
    }

    /// Ensures a filesystem endpoint's parent directory exists with
    /// restrictive permissions. Abstract endpoints need no preparation.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.filesystem_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent() else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem { path } => write!(formatter, "unix://{path}"),
            Self::Abstract { name } => write!(formatter, "abstract://{name}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::from_raw(input)
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// The address string was empty.
    #[error("empty socket address")]
    Empty,
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Parent directory is missing when creating a filesystem socket path.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_leading_slash_as_filesystem() {
        let endpoint = SocketEndpoint::from_raw("/tmp/caplink/out.sock").expect("parse");
        assert!(matches!(endpoint, SocketEndpoint::Filesystem { .. }));
        assert_eq!(endpoint.raw_value(), "/tmp/caplink/out.sock");
    }

    #[test]
    fn classifies_bare_name_as_abstract() {
        let endpoint = SocketEndpoint::from_raw("caplink/result-7").expect("parse");
        assert!(matches!(endpoint, SocketEndpoint::Abstract { .. }));
        assert_eq!(endpoint.raw_value(), "caplink/result-7");
    }

    #[test]
    fn rejects_empty_address() {
        let result = SocketEndpoint::from_raw("");
        assert!(matches!(result, Err(SocketParseError::Empty)));
    }

    #[test]
    fn display_filesystem_endpoint() {
        let endpoint = SocketEndpoint::filesystem("/tmp/caplinkd.sock");
        assert_eq!(endpoint.to_string(), "unix:///tmp/caplinkd.sock");
    }

    #[test]
    fn prepare_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested/caplinkd.sock");
        let utf8 = Utf8PathBuf::from_path_buf(path).expect("utf8 path");
        let endpoint = SocketEndpoint::filesystem(utf8.clone());
        endpoint.prepare_filesystem().expect("prepare");
        assert!(utf8.parent().expect("parent").as_std_path().is_dir());
    }
}
