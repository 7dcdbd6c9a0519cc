//! Dropbox API client for listing and downloading files.

use std::path::Path;

use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::Endpoints;
use crate::error::{DropboxError, Result};
use crate::models::{
    ApiErrorResponse, DownloadArg, ListFolderArg, ListFolderContinueArg, ListFolderResult,
    Metadata, RemoteFile, TokenPair,
};
use crate::paths::{is_same_remote_path, normalize_root};

/// Header carrying the JSON argument of content-host endpoints.
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Client authenticated with a Dropbox access token.
pub struct DropboxClient {
    tokens: TokenPair,
    endpoints: Endpoints,
    http: Client,
}

impl DropboxClient {
    /// Create a new DropboxClient against the public Dropbox endpoints.
    pub fn new(tokens: TokenPair) -> Self {
        Self::with_endpoints(tokens, Endpoints::default())
    }

    pub fn with_endpoints(tokens: TokenPair, endpoints: Endpoints) -> Self {
        Self {
            tokens,
            endpoints,
            http: Client::new(),
        }
    }

    /// Tokens this client authenticates with.
    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// List every entry under `path`, following continuation cursors until
    /// the listing reports no more pages.
    pub async fn list_entries(&self, path: &str) -> Result<Vec<Metadata>> {
        let arg = ListFolderArg {
            path: api_path(path),
            recursive: true,
        };
        let mut page: ListFolderResult = self
            .rpc("files/list_folder", &arg)
            .await
            .map_err(|e| list_error(path, e))?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            debug!(path, cursor = %page.cursor, "fetching next listing page");
            let arg = ListFolderContinueArg {
                cursor: &page.cursor,
            };
            let mut next: ListFolderResult = self
                .rpc("files/list_folder/continue", &arg)
                .await
                .map_err(|e| list_error(path, e))?;
            entries.append(&mut next.entries);
            page = next;
        }

        debug!(path, count = entries.len(), "listed remote entries");
        Ok(entries)
    }

    /// All files under `path`, at any depth.
    pub async fn list_files_recursive(&self, path: &str) -> Result<Vec<RemoteFile>> {
        Ok(files_in(self.list_entries(path).await?))
    }

    /// Display paths of all folders under `path`, excluding `path` itself.
    pub async fn list_folders_recursive(&self, path: &str) -> Result<Vec<String>> {
        Ok(folders_in(self.list_entries(path).await?, path))
    }

    /// Download the file at `remote_path` into `destination`, returning the
    /// number of bytes written.
    pub async fn download_to_file(&self, remote_path: &str, destination: &Path) -> Result<u64> {
        let download_error = |message: String| DropboxError::DownloadError {
            path: remote_path.to_string(),
            message,
        };

        let arg = header_safe_json(&DownloadArg { path: remote_path })?;
        let response = self
            .http
            .post(format!("{}/2/files/download", self.endpoints.content))
            .bearer_auth(&self.tokens.access_token)
            .header(API_ARG_HEADER, arg)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(error_message(response).await));
        }

        // Stream to file
        let mut file = File::create(destination)
            .await
            .map_err(|e| DropboxError::local_io(destination, e))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DropboxError::local_io(destination, e))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| DropboxError::local_io(destination, e))?;

        Ok(written)
    }

    /// POST a JSON RPC call to the API host and decode the JSON reply.
    async fn rpc<A, T>(&self, endpoint: &str, arg: &A) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/2/{}", self.endpoints.api, endpoint))
            .bearer_auth(&self.tokens.access_token)
            .json(arg)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DropboxError::ApiError {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        Ok(response.json().await?)
    }
}

/// Keep only the file entries of a listing.
pub fn files_in(entries: Vec<Metadata>) -> Vec<RemoteFile> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Metadata::File(file) => Some(file),
            _ => None,
        })
        .collect()
}

/// Keep only the folder paths of a listing, dropping `root` itself.
pub fn folders_in(entries: Vec<Metadata>, root: &str) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Metadata::Folder(folder) if !is_same_remote_path(root, &folder.path) => {
                Some(folder.path)
            }
            _ => None,
        })
        .collect()
}

/// The API names the Dropbox root with an empty string.
fn api_path(path: &str) -> &str {
    match normalize_root(path) {
        "/" => "",
        path => path,
    }
}

/// Serialize `value` as JSON that can travel in an HTTP header: every
/// character outside printable ASCII is written as a `\uXXXX` escape.
pub fn header_safe_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if (' '..='~').contains(&c) {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

/// Read an error body, preferring the API's `error_summary`.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_error) => api_error.error_summary,
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    }
}

fn list_error(path: &str, err: DropboxError) -> DropboxError {
    let message = match err {
        DropboxError::ApiError { status, message } => format!("{} ({})", message, status),
        other => other.to_string(),
    };
    DropboxError::RemoteListError {
        path: path.to_string(),
        message,
    }
}
