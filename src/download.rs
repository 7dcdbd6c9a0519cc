//! Mirror a remote folder into a local directory through a staging tree.
//!
//! Everything is downloaded into a fresh temporary directory first and only
//! moved to the destination once every file has arrived, so the destination
//! never holds a half-written tree. The staging directory is removed on
//! every exit path when its guard drops.
//!
//! The staged tree is then brought next to the destination, into a second
//! temporary directory on the destination's filesystem, so that the final
//! step is made of renames only.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::client::{files_in, folders_in, DropboxClient};
use crate::config::{Config, Exclusions};
use crate::error::{DropboxError, Result};
use crate::local::walk_error;
use crate::models::RemoteFile;
use crate::paths::{relative_local_path, strip_remote_root};

/// Prefix of staging directories.
const STAGING_PREFIX: &str = "dropdl-";

/// Prefix of the directory created beside the destination for the final move.
const LANDING_PREFIX: &str = ".dropdl-";

/// What a completed download produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub files: usize,
    pub folders: usize,
    pub bytes: u64,
}

/// Downloads a remote tree into a local destination.
pub struct Downloader<'a> {
    client: &'a DropboxClient,
    exclusions: Exclusions,
    staging_parent: Option<PathBuf>,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a DropboxClient) -> Self {
        Self {
            client,
            exclusions: Exclusions::none(),
            staging_parent: None,
        }
    }

    /// A downloader with the exclusions of `config`.
    pub fn from_config(client: &'a DropboxClient, config: &Config) -> Result<Self> {
        Ok(Self::new(client).with_exclusions(config.exclusions()?))
    }

    /// Skip remote entries whose path matches any of these patterns.
    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Create staging directories under `parent` instead of the system
    /// temporary directory.
    pub fn with_staging_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(parent.into());
        self
    }

    /// Download everything under `remote_root` and move it to `dest_root`.
    pub async fn download_tree(
        &self,
        remote_root: &str,
        dest_root: &Path,
    ) -> Result<DownloadSummary> {
        let staging = self.create_staging()?;
        info!(staging = %staging.path().display(), "downloading to temporary directory");

        let tree = staging.path().join("tree");
        fs::create_dir(&tree).map_err(|e| DropboxError::local_io(&tree, e))?;

        let entries = self.client.list_entries(remote_root).await?;
        let folders = folders_in(entries.clone(), remote_root);
        let files = files_in(entries);

        let mut summary = DownloadSummary {
            folders: self.create_folders(&tree, remote_root, &folders)?,
            ..Default::default()
        };

        for file in &files {
            if self.exclusions.is_excluded(&file.path) {
                debug!(path = %file.path, "skipping excluded file");
                continue;
            }
            summary.bytes += self.download_file(&tree, remote_root, file).await?;
            summary.files += 1;
        }

        info!(dest = %dest_root.display(), "moving files to destination");
        move_into_place(&tree, dest_root)?;

        let staging_path = staging.path().to_path_buf();
        info!(staging = %staging_path.display(), "removing temporary directory");
        if let Err(e) = staging.close() {
            warn!(
                staging = %staging_path.display(),
                error = %e,
                "failed to remove temporary directory"
            );
        }

        Ok(summary)
    }

    fn create_staging(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        match &self.staging_parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|e| DropboxError::local_io(parent, e)),
            None => builder
                .tempdir()
                .map_err(|e| DropboxError::local_io(std::env::temp_dir(), e)),
        }
    }

    /// Recreate the remote folder hierarchy under `tree`, shallowest first.
    fn create_folders(
        &self,
        tree: &Path,
        remote_root: &str,
        folders: &[String],
    ) -> Result<usize> {
        let mut relative = Vec::with_capacity(folders.len());
        for folder in folders {
            if self.exclusions.is_excluded(folder) {
                debug!(path = %folder, "skipping excluded folder");
                continue;
            }
            let rel = relative_local_path(strip_remote_root(remote_root, folder)?)?;
            relative.push(rel);
        }
        relative.sort_by_key(|p| p.components().count());

        for rel in &relative {
            let dir = tree.join(rel);
            fs::create_dir_all(&dir).map_err(|e| DropboxError::local_io(&dir, e))?;
        }
        Ok(relative.len())
    }

    async fn download_file(
        &self,
        tree: &Path,
        remote_root: &str,
        file: &RemoteFile,
    ) -> Result<u64> {
        let relative = strip_remote_root(remote_root, &file.path)?;
        if relative.is_empty() {
            return Err(DropboxError::InvalidRemotePath {
                root: remote_root.to_string(),
                path: file.path.clone(),
            });
        }
        let local = tree.join(relative_local_path(relative)?);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| DropboxError::local_io(parent, e))?;
        }

        let bytes = self.client.download_to_file(&file.path, &local).await?;

        let modified = FileTime::from_unix_time(
            file.modified_at.unix_timestamp(),
            file.modified_at.nanosecond(),
        );
        filetime::set_file_times(&local, modified, modified)
            .map_err(|e| DropboxError::local_io(&local, e))?;

        info!(remote = %file.path, local = %local.display(), bytes, "downloaded");
        Ok(bytes)
    }
}

/// Download `remote_root` into `dest_root` with no exclusions, staging in
/// the system temporary directory.
pub async fn download_tree(
    client: &DropboxClient,
    remote_root: &str,
    dest_root: &Path,
) -> Result<DownloadSummary> {
    Downloader::new(client).download_tree(remote_root, dest_root).await
}

/// Download the configured remote root into the configured destination,
/// honouring the configured exclusions.
pub async fn download_from_config(
    client: &DropboxClient,
    config: &Config,
) -> Result<DownloadSummary> {
    let remote_root = config.remote_root()?;
    let dest_root = config.dest_root()?;
    Downloader::from_config(client, config)?
        .download_tree(remote_root, dest_root)
        .await
}

/// Move the staged tree to `dest`.
///
/// The tree is first moved (or, across filesystems, copied) into a landing
/// directory beside `dest`; a failed copy only ever leaves debris there, and
/// the landing directory is removed when its guard drops. From the landing
/// directory a missing destination is created with one rename. An existing
/// destination directory is merged into with per-entry renames, provided no
/// staged entry would overwrite something already there.
fn move_into_place(staged: &Path, dest: &Path) -> Result<()> {
    let existing = match fs::symlink_metadata(dest) {
        Ok(_) if dest.is_dir() => true,
        Ok(_) => {
            return Err(DropboxError::DestinationConflict {
                path: dest.to_path_buf(),
            })
        }
        Err(_) => false,
    };
    if existing {
        check_conflicts(staged, dest)?;
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| DropboxError::local_io(parent, e))?;
    let landing = tempfile::Builder::new()
        .prefix(LANDING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| DropboxError::local_io(parent, e))?;

    let tree = landing.path().join("tree");
    if let Err(e) = fs::rename(staged, &tree) {
        debug!(error = %e, "rename failed, copying staged tree");
        copy_tree(staged, &tree)?;
    }

    if existing {
        merge_tree(&tree, dest)?;
    } else {
        fs::rename(&tree, dest).map_err(|e| DropboxError::local_io(dest, e))?;
    }

    let landing_path = landing.path().to_path_buf();
    if let Err(e) = landing.close() {
        warn!(
            landing = %landing_path.display(),
            error = %e,
            "failed to remove landing directory"
        );
    }
    Ok(())
}

/// Rename every entry of `src` into the existing directory `dest`.
fn merge_tree(src: &Path, dest: &Path) -> Result<()> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        entries.push((entry.path().to_path_buf(), entry.file_type().is_dir()));
    }

    for (path, is_dir) in entries {
        let Ok(rel) = path.strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);
        if is_dir {
            fs::create_dir_all(&target).map_err(|e| DropboxError::local_io(&target, e))?;
        } else {
            fs::rename(&path, &target).map_err(|e| DropboxError::local_io(&target, e))?;
        }
    }
    Ok(())
}

fn check_conflicts(staged: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(staged).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(staged, e))?;
        let Ok(rel) = entry.path().strip_prefix(staged) else {
            continue;
        };
        let target = dest.join(rel);
        let conflict = match fs::symlink_metadata(&target) {
            Ok(meta) => !(entry.file_type().is_dir() && meta.is_dir()),
            Err(_) => false,
        };
        if conflict {
            return Err(DropboxError::DestinationConflict { path: target });
        }
    }
    Ok(())
}

/// Copy `src` into `dest` recursively, carrying file timestamps over.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| DropboxError::local_io(&target, e))?;
            continue;
        }

        fs::copy(entry.path(), &target).map_err(|e| DropboxError::local_io(&target, e))?;
        let meta = entry
            .metadata()
            .map_err(|e| walk_error(entry.path(), e))?;
        filetime::set_file_times(
            &target,
            FileTime::from_last_access_time(&meta),
            FileTime::from_last_modification_time(&meta),
        )
        .map_err(|e| DropboxError::local_io(&target, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"b").unwrap();
        dir
    }

    fn entry_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_move_into_missing_destination() {
        let staged = staged_tree();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("nested").join("dest");

        move_into_place(staged.path(), &dest).unwrap();

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(dest.join("sub").join("b.txt")).unwrap(), b"b");
        assert_eq!(entry_names(&out.path().join("nested")), vec!["dest"]);
    }

    #[test]
    fn test_merge_into_existing_destination() {
        let staged = staged_tree();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("dest");
        fs::create_dir_all(dest.join("sub")).unwrap();
        fs::write(dest.join("keep.txt"), b"k").unwrap();

        move_into_place(staged.path(), &dest).unwrap();

        assert!(dest.join("keep.txt").exists());
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(dest.join("sub").join("b.txt")).unwrap(), b"b");
        assert_eq!(entry_names(out.path()), vec!["dest"]);
    }

    #[test]
    fn test_conflicting_destination_is_left_untouched() {
        let staged = staged_tree();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("dest");
        fs::create_dir_all(dest.join("sub")).unwrap();
        fs::write(dest.join("sub").join("b.txt"), b"old").unwrap();

        let err = move_into_place(staged.path(), &dest).unwrap_err();

        assert!(matches!(err, DropboxError::DestinationConflict { .. }));
        assert!(!dest.join("a.txt").exists());
        assert_eq!(fs::read(dest.join("sub").join("b.txt")).unwrap(), b"old");
        assert_eq!(entry_names(out.path()), vec!["dest"]);
    }

    #[test]
    fn test_destination_that_is_a_file_conflicts() {
        let staged = staged_tree();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("dest");
        fs::write(&dest, b"file").unwrap();

        let err = move_into_place(staged.path(), &dest).unwrap_err();

        assert!(matches!(err, DropboxError::DestinationConflict { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"file");
        assert_eq!(entry_names(out.path()), vec!["dest"]);
    }

    #[test]
    fn test_copy_tree_keeps_mtime() {
        let staged = staged_tree();
        let mtime = FileTime::from_unix_time(1_653_004_800, 0);
        filetime::set_file_mtime(staged.path().join("a.txt"), mtime).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let target = dest.path().join("copy");

        copy_tree(staged.path(), &target).unwrap();

        let meta = fs::metadata(target.join("a.txt")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
    }
}
