//! Listing of the local destination tree.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{DropboxError, Result};

/// Every file and directory under `root` (not `root` itself), depth first.
/// A missing root lists as empty.
pub fn list_local_paths(root: &Path) -> Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        paths.push(entry.path().to_string_lossy().into_owned());
    }
    Ok(paths)
}

pub(crate) fn walk_error(root: &Path, err: walkdir::Error) -> DropboxError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    DropboxError::local_io(path, source)
}
