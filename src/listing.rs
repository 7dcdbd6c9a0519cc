//! Listing reports built on the remote and local listers.

use std::path::Path;

use crate::client::DropboxClient;
use crate::config::{Config, Exclusions};
use crate::diff::diff;
use crate::error::Result;
use crate::local::list_local_paths;
use crate::models::Metadata;
use crate::paths::is_same_remote_path;

/// Remote paths under `path`, sorted lexicographically. Folders are included
/// only when `include_dirs` is set; `path` itself never is.
pub async fn list_remote_paths(
    client: &DropboxClient,
    path: &str,
    include_dirs: bool,
    exclusions: &Exclusions,
) -> Result<Vec<String>> {
    let entries = client.list_entries(path).await?;
    let mut paths: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Metadata::File(file) => Some(file.path),
            Metadata::Folder(folder)
                if include_dirs && !is_same_remote_path(path, &folder.path) =>
            {
                Some(folder.path)
            }
            _ => None,
        })
        .filter(|p| !exclusions.is_excluded(p))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Root-relative remote paths (files and folders) with no counterpart under
/// `local_root`.
pub async fn missing_locally(
    client: &DropboxClient,
    remote_root: &str,
    local_root: &Path,
    exclusions: &Exclusions,
) -> Result<Vec<String>> {
    let remote = list_remote_paths(client, remote_root, true, exclusions).await?;
    let local = list_local_paths(local_root)?;
    Ok(diff(remote_root, local_root, remote, local))
}

/// [`missing_locally`] over the configured remote root, destination and
/// exclusions.
pub async fn missing_locally_from_config(
    client: &DropboxClient,
    config: &Config,
) -> Result<Vec<String>> {
    missing_locally(
        client,
        config.remote_root()?,
        config.dest_root()?,
        &config.exclusions()?,
    )
    .await
}
