//! Runtime configuration shared by the authenticator, listers and downloader.

use std::path::{Path, PathBuf};

use regex::RegexSet;

use crate::error::{DropboxError, Result};

/// Dropbox RPC host.
pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com";

/// Dropbox content (upload/download) host.
pub const DROPBOX_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Page the user opens to grant access.
pub const DROPBOX_AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Base URLs of the Dropbox API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub content: String,
    pub authorize: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: DROPBOX_API_BASE.to_string(),
            content: DROPBOX_CONTENT_BASE.to_string(),
            authorize: DROPBOX_AUTHORIZE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at a single base URL, e.g. a local mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api: base.to_string(),
            content: base.to_string(),
            authorize: format!("{}/oauth2/authorize", base),
        }
    }
}

/// Everything a command needs to know, gathered once at startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub remote_root: Option<String>,
    pub dest_root: Option<PathBuf>,
    pub exclusions: Vec<String>,
    pub endpoints: Endpoints,
}

impl Config {
    /// Compile the exclusion patterns.
    pub fn exclusions(&self) -> Result<Exclusions> {
        Exclusions::new(&self.exclusions)
    }

    /// Remote folder to mirror.
    pub fn remote_root(&self) -> Result<&str> {
        self.remote_root
            .as_deref()
            .ok_or(DropboxError::MissingSetting("remote_root"))
    }

    /// Local directory the remote folder is mirrored into.
    pub fn dest_root(&self) -> Result<&Path> {
        self.dest_root
            .as_deref()
            .ok_or(DropboxError::MissingSetting("dest_root"))
    }
}

/// Compiled set of regular expressions matched against remote display paths.
#[derive(Debug, Clone)]
pub struct Exclusions {
    set: RegexSet,
}

impl Exclusions {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = RegexSet::new(patterns)?;
        Ok(Self { set })
    }

    /// An exclusion set that matches nothing.
    pub fn none() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}

impl Default for Exclusions {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_match_anywhere_in_path() {
        let exclusions = Exclusions::new([
            ".*/Personal/.*",
            "_remotely-save-metadata-on-remote.json",
        ])
        .unwrap();

        assert!(exclusions.is_excluded("/Apps/vault/Personal/diary.md"));
        assert!(exclusions.is_excluded("/Apps/vault/_remotely-save-metadata-on-remote.json"));
        assert!(!exclusions.is_excluded("/Apps/vault/notes/todo.md"));
    }

    #[test]
    fn test_empty_exclusions_match_nothing() {
        let exclusions = Exclusions::none();
        assert!(!exclusions.is_excluded("/anything"));
        assert!(!exclusions.is_excluded(""));
    }

    #[test]
    fn test_invalid_exclusion_is_rejected() {
        let config = Config {
            exclusions: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(config.exclusions().is_err());
    }

    #[test]
    fn test_roots_are_read_from_config() {
        let config = Config {
            remote_root: Some("/Apps/root".to_string()),
            dest_root: Some(PathBuf::from("content")),
            ..Default::default()
        };
        assert_eq!(config.remote_root().unwrap(), "/Apps/root");
        assert_eq!(config.dest_root().unwrap(), Path::new("content"));
    }

    #[test]
    fn test_unset_roots_are_reported() {
        let config = Config::default();
        assert!(matches!(
            config.remote_root(),
            Err(DropboxError::MissingSetting("remote_root"))
        ));
        assert!(matches!(
            config.dest_root(),
            Err(DropboxError::MissingSetting("dest_root"))
        ));
    }

    #[test]
    fn test_endpoints_with_base() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:1234/");
        assert_eq!(endpoints.api, "http://127.0.0.1:1234");
        assert_eq!(endpoints.content, "http://127.0.0.1:1234");
        assert_eq!(endpoints.authorize, "http://127.0.0.1:1234/oauth2/authorize");
    }
}
