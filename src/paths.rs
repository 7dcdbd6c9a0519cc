//! Remote/local path conversions.
//!
//! Remote paths are always `/`-separated. Local paths use the host separator,
//! so relative remote paths are rebuilt component by component.

use std::path::{Component, Path, PathBuf};

use crate::error::{DropboxError, Result};

/// Drop a trailing slash, keeping `/` itself intact.
pub fn normalize_root(root: &str) -> &str {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Whether `path` names the same remote folder as `root`.
pub fn is_same_remote_path(root: &str, path: &str) -> bool {
    normalize_root(root).eq_ignore_ascii_case(normalize_root(path))
}

/// Strip `root` from `path`, returning the root-relative part (`""` for the
/// root itself, otherwise starting with `/`).
///
/// Dropbox paths are case-insensitive, so an exact prefix match is tried
/// first and an ASCII case-insensitive one second.
pub fn strip_remote_root<'a>(root: &str, path: &'a str) -> Result<&'a str> {
    let root = normalize_root(root);
    if root == "/" {
        return match path {
            "/" => Ok(""),
            _ if path.starts_with('/') => Ok(path),
            _ => Err(invalid(root, path)),
        };
    }

    let rest = match path.strip_prefix(root) {
        Some(rest) => rest,
        None => match path.get(..root.len()) {
            Some(head) if head.eq_ignore_ascii_case(root) => &path[root.len()..],
            _ => return Err(invalid(root, path)),
        },
    };

    if rest.is_empty() || rest.starts_with('/') {
        Ok(rest)
    } else {
        Err(invalid(root, path))
    }
}

/// Turn a `/`-separated relative remote path into a native relative path.
/// Empty segments are skipped; `.` and `..` are rejected.
pub fn relative_local_path(relative: &str) -> Result<PathBuf> {
    let mut local = PathBuf::new();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(invalid(".", relative));
        }
        local.push(segment);
    }
    Ok(local)
}

/// Express a local path relative to `root` in remote form (`/a/b`).
/// Paths outside `root` are returned unchanged.
pub fn local_to_relative(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rest) => {
            let mut out = String::new();
            for component in rest.components() {
                if let Component::Normal(part) = component {
                    out.push('/');
                    out.push_str(&part.to_string_lossy());
                }
            }
            out
        }
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn invalid(root: &str, path: &str) -> DropboxError {
    DropboxError::InvalidRemotePath {
        root: root.to_string(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_remote_root_exact() {
        assert_eq!(strip_remote_root("/Apps/root", "/Apps/root/a.txt").unwrap(), "/a.txt");
        assert_eq!(strip_remote_root("/Apps/root/", "/Apps/root/sub/b").unwrap(), "/sub/b");
        assert_eq!(strip_remote_root("/Apps/root", "/Apps/root").unwrap(), "");
    }

    #[test]
    fn test_strip_remote_root_ignores_case() {
        assert_eq!(strip_remote_root("/apps/root", "/Apps/Root/a.txt").unwrap(), "/a.txt");
    }

    #[test]
    fn test_strip_remote_root_rejects_sibling_prefix() {
        assert!(strip_remote_root("/Apps/root", "/Apps/rootless/a.txt").is_err());
        assert!(strip_remote_root("/Apps/root", "/Other/a.txt").is_err());
    }

    #[test]
    fn test_strip_remote_root_at_dropbox_root() {
        assert_eq!(strip_remote_root("/", "/a.txt").unwrap(), "/a.txt");
        assert_eq!(strip_remote_root("/", "/").unwrap(), "");
    }

    #[test]
    fn test_relative_local_path() {
        let path = relative_local_path("/sub/b.txt").unwrap();
        assert_eq!(path, Path::new("sub").join("b.txt"));
        assert_eq!(relative_local_path("").unwrap(), PathBuf::new());
        assert!(relative_local_path("/sub/../../etc").is_err());
    }

    #[test]
    fn test_local_to_relative() {
        let root = Path::new("/dest");
        assert_eq!(local_to_relative(root, &root.join("sub").join("b.txt")), "/sub/b.txt");
        assert_eq!(local_to_relative(root, Path::new("/elsewhere/x")), "/elsewhere/x");
    }

    #[test]
    fn test_is_same_remote_path() {
        assert!(is_same_remote_path("/Apps/root", "/apps/root/"));
        assert!(!is_same_remote_path("/Apps/root", "/Apps/root/sub"));
    }
}
