// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// A watch root together with its canonical form (when it differs).
#[derive(Debug, Clone)]
pub struct WatchRoot {
    root: PathBuf,
    canonical: Option<PathBuf>,
}

impl WatchRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let canonical = root.canonicalize().ok().filter(|c| *c != root);
        Self { root, canonical }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Convert `path` into a string relative to this root, with forward
    /// slashes.
    ///
    /// - First we try a direct `strip_prefix(root)`.
    /// - If that fails (e.g. symlinked prefixes such as `/var` vs
    ///   `/private/var`), we try the canonical root.
    ///
    /// Returns `None` when the path lies outside the root. The root itself
    /// maps to `"."`.
    pub fn relative_str(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok().or_else(|| {
            self.canonical
                .as_deref()
                .and_then(|canon| path.strip_prefix(canon).ok())
        })?;

        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return None;
        }

        let s = rel.to_string_lossy().replace('\\', "/");
        if s.is_empty() {
            Some(".".to_string())
        } else {
            Some(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_root_are_relativised() {
        let root = WatchRoot::new("/does/not/exist");
        assert_eq!(
            root.relative_str(Path::new("/does/not/exist/src/a.rs")),
            Some("src/a.rs".to_string())
        );
        assert_eq!(root.relative_str(Path::new("/does/not/exist")), Some(".".to_string()));
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let root = WatchRoot::new("/does/not/exist");
        assert_eq!(root.relative_str(Path::new("/does/not/other/a.rs")), None);
        assert_eq!(root.relative_str(Path::new("/does/not/exist/../x")), None);
    }

    #[test]
    fn canonical_root_is_accepted() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let canonical = dir.path().canonicalize()?;
        let root = WatchRoot::new(dir.path());
        assert_eq!(
            root.relative_str(&canonical.join("x.txt")),
            Some("x.txt".to_string())
        );
        Ok(())
    }
}
