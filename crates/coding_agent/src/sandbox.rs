//! Path confinement for every filesystem-touching tool.
//!
//! A [`Sandbox`] owns one canonical root. Requested paths are joined onto it,
//! normalized, and canonicalized as far as they exist before the containment
//! check, so `..` segments, absolute overrides, and symlinks pointing outside
//! the root are all rejected the same way.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::tools::ToolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Canonicalizes `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|error| ToolError::io("resolve working directory", root, error))?;

        if !canonical.is_dir() {
            return Err(ToolError::NotADirectory {
                path: root.display().to_string(),
            });
        }

        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an already-canonical path is the root or nested under it.
    pub fn contains(&self, canonical_path: &Path) -> bool {
        canonical_path.starts_with(&self.root)
    }

    /// Maps a caller-supplied path onto an absolute path inside the root.
    ///
    /// `None` and all-whitespace input resolve to the root itself; any other
    /// path is used verbatim, surrounding whitespace included. The target does
    /// not need to exist; the longest existing prefix is canonicalized and the
    /// remaining components are re-appended.
    pub fn resolve(&self, requested: Option<&str>) -> Result<PathBuf, ToolError> {
        let requested = requested.unwrap_or_default();
        if requested.trim().is_empty() {
            return Ok(self.root.clone());
        }

        let joined = normalize_lexically(&self.root.join(requested));
        let resolved = canonicalize_existing_prefix(&joined)
            .map_err(|error| ToolError::io("resolve", &joined, error))?;

        if self.contains(&resolved) {
            Ok(resolved)
        } else {
            tracing::warn!(requested, resolved = %resolved.display(), "sandbox violation");
            Err(ToolError::SandboxViolation {
                path: requested.to_string(),
            })
        }
    }
}

/// Folds `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    for ancestor in path.ancestors() {
        // `symlink_metadata` so a dangling link counts as existing and fails
        // canonicalization instead of being written through.
        if fs::symlink_metadata(ancestor).is_err() {
            continue;
        }

        let canonical = ancestor.canonicalize()?;
        let tail = path.strip_prefix(ancestor).map_err(io::Error::other)?;
        return Ok(if tail.as_os_str().is_empty() {
            canonical
        } else {
            canonical.join(tail)
        });
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor for {}", path.display()),
    ))
}
