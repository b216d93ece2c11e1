// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

use crate::fileset::relative_to;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a direct prefix strip first, then retries with both paths
/// canonicalized (macOS reports `/private/var/...` for `/var/...`).
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Some(rel) = relative_to(root, path) {
        return Some(rel);
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = canonicalize_lossy(path);
    relative_to(&root_canon, &path_canon)
}

/// True if `path` is `dir` or lies below it.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir) || canonicalize_lossy(path).starts_with(canonicalize_lossy(dir))
}

/// Canonicalize `path`, or its parent when the path itself no longer
/// exists (a removed file).
fn canonicalize_lossy(path: &Path) -> PathBuf {
    if let Ok(canon) = path.canonicalize() {
        return canon;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
