//! Trusted-directory allow-list for caller-supplied filesystem paths.
//!
//! Result sockets and storage capabilities accept filesystem paths from the
//! requesting process. Those paths are only honoured when they resolve under
//! one of a small set of trusted roots; anything else fails closed before
//! any I/O happens.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allow-list of directories under which caller-supplied paths must live.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TrustedDirectories {
    roots: Vec<Utf8PathBuf>,
}

impl TrustedDirectories {
    /// Builds an allow-list from the given roots.
    #[must_use]
    pub fn new(roots: Vec<Utf8PathBuf>) -> Self {
        Self { roots }
    }

    /// Builds an allow-list with a single root.
    #[must_use]
    pub fn single(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// The configured roots, in precedence order.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// The first configured root, used as the default location for
    /// caller-created artefacts.
    #[must_use]
    pub fn primary(&self) -> Option<&Utf8Path> {
        self.roots.first().map(Utf8PathBuf::as_path)
    }

    /// Checks that `path` is an absolute, traversal-free path under one of
    /// the trusted roots.
    ///
    /// The check is lexical: `.` and `..` components are rejected outright
    /// rather than resolved, so a path cannot escape a root through
    /// traversal regardless of what exists on disk.
    ///
    /// # Errors
    ///
    /// Returns a [`TrustError`] describing why the path was refused.
    pub fn permit(&self, path: &Utf8Path) -> Result<(), TrustError> {
        if !path.is_absolute() {
            return Err(TrustError::NotAbsolute {
                path: path.to_path_buf(),
            });
        }
        if path
            .components()
            .any(|component| matches!(component, Utf8Component::CurDir | Utf8Component::ParentDir))
        {
            return Err(TrustError::Traversal {
                path: path.to_path_buf(),
            });
        }
        if self.roots.iter().any(|root| path.starts_with(root)) {
            Ok(())
        } else {
            Err(TrustError::Untrusted {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Reasons a caller-supplied path was refused.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Path was relative.
    #[error("path '{path}' is not absolute")]
    NotAbsolute { path: Utf8PathBuf },
    /// Path contained `.` or `..` components.
    #[error("path '{path}' contains traversal components")]
    Traversal { path: Utf8PathBuf },
    /// Path does not live under any trusted root.
    #[error("path '{path}' is not under any trusted directory")]
    Untrusted { path: Utf8PathBuf },
}
