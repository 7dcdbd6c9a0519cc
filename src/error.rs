//! Error types for the dropdl crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to Dropbox or mirroring a tree locally.
#[derive(Error, Debug)]
pub enum DropboxError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Token exchange failed ({status}): {message}")]
    TokenExchangeError { status: u16, message: String },

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to list {path}: {message}")]
    RemoteListError { path: String, message: String },

    #[error("Failed to download {path}: {message}")]
    DownloadError { path: String, message: String },

    #[error("Local I/O error at {}: {source}", path.display())]
    LocalIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote path {path} is not under {root}")]
    InvalidRemotePath { root: String, path: String },

    #[error("Invalid exclusion pattern: {0}")]
    InvalidExclusion(#[from] regex::Error),

    #[error("Destination already contains {}", path.display())]
    DestinationConflict { path: PathBuf },
}

impl DropboxError {
    /// Wrap an I/O error with the local path it happened on.
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DropboxError::LocalIoError {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for DropboxError.
pub type Result<T> = std::result::Result<T, DropboxError>;
