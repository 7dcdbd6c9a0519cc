//! dropdl - Mirror a Dropbox folder into a local directory.
//!
//! This library provides functionality to:
//! - Authorize a Dropbox app through the OAuth2 code flow
//! - List files and folders under a remote path (following pagination)
//! - Compare a remote tree with a local one
//! - Download a remote tree through a staging directory, keeping file
//!   modification times
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use dropdl::{download_tree, DropboxClient, TokenPair};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DropboxClient::new(TokenPair {
//!         access_token: std::env::var("DROPBOX_ACCESS_TOKEN")?,
//!         refresh_token: None,
//!     });
//!
//!     let summary = download_tree(&client, "/Apps/notes", Path::new("notes")).await?;
//!     println!("{} files", summary.files);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod diff;
pub mod download;
pub mod error;
pub mod listing;
pub mod local;
pub mod models;
pub mod paths;
pub mod prompt;

// Re-exports for convenience
pub use auth::{resolve_client, Authenticator};
pub use client::DropboxClient;
pub use config::{Config, Endpoints, Exclusions};
pub use diff::diff;
pub use download::{download_from_config, download_tree, DownloadSummary, Downloader};
pub use error::{DropboxError, Result};
pub use listing::{list_remote_paths, missing_locally, missing_locally_from_config};
pub use local::list_local_paths;
pub use models::{Metadata, RemoteFile, RemoteFolder, TokenPair};
