//! Set difference between a remote listing and a local one.

use std::collections::HashSet;
use std::path::Path;

use crate::paths::{local_to_relative, strip_remote_root};

/// Root-relative remote paths that have no local counterpart.
///
/// Remote paths lose their `remote_root` prefix (matched the same way a
/// download matches it, ignoring ASCII case) and local paths their
/// `local_root` prefix; the result is sorted for stable reporting. Paths
/// outside their root are compared as-is.
pub fn diff<R, L>(
    remote_root: &str,
    local_root: &Path,
    remote_paths: R,
    local_paths: L,
) -> Vec<String>
where
    R: IntoIterator,
    R::Item: AsRef<str>,
    L: IntoIterator,
    L::Item: AsRef<Path>,
{
    let local: HashSet<String> = local_paths
        .into_iter()
        .map(|p| local_to_relative(local_root, p.as_ref()))
        .collect();

    let mut missing: Vec<String> = remote_paths
        .into_iter()
        .map(|p| {
            let p = p.as_ref();
            strip_remote_root(remote_root, p).unwrap_or(p).to_string()
        })
        .filter(|relative| !local.contains(relative))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    missing.sort();
    missing
}
