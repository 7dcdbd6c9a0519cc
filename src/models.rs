//! Data models for Dropbox API requests and responses.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single entry of a folder listing, tagged by its `.tag` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File(RemoteFile),
    Folder(RemoteFolder),
    Deleted(DeletedEntry),
}

impl Metadata {
    /// Display path of the entry, whatever its kind.
    pub fn path(&self) -> &str {
        match self {
            Metadata::File(file) => &file.path,
            Metadata::Folder(folder) => &folder.path,
            Metadata::Deleted(entry) => &entry.path,
        }
    }
}

/// A file as seen by the remote listing at the time it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    #[serde(rename = "path_display")]
    pub path: String,
    #[serde(rename = "client_modified", with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// A folder entry. Only its path is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFolder {
    #[serde(rename = "path_display")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedEntry {
    #[serde(rename = "path_display", default)]
    pub path: String,
}

/// Access/refresh credential pair obtained from an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Response from the OAuth2 token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }
}

/// Body of `files/list_folder`.
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
}

/// Body of `files/list_folder/continue`.
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// One page of a folder listing.
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    #[serde(default)]
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// Argument carried in the `Dropbox-API-Arg` header of a download.
#[derive(Debug, Serialize)]
pub struct DownloadArg<'a> {
    pub path: &'a str,
}

/// Dropbox API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_metadata_decodes_by_tag() {
        let json = r#"[
            {
                ".tag": "file",
                "name": "a.txt",
                "path_display": "/Apps/root/a.txt",
                "path_lower": "/apps/root/a.txt",
                "id": "id:abc",
                "client_modified": "2022-05-20T00:00:00Z",
                "server_modified": "2022-05-21T10:00:00Z",
                "rev": "015",
                "size": 12
            },
            {".tag": "folder", "name": "sub", "path_display": "/Apps/root/sub"},
            {".tag": "deleted", "name": "gone", "path_display": "/Apps/root/gone"}
        ]"#;

        let entries: Vec<Metadata> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 3);

        match &entries[0] {
            Metadata::File(file) => {
                assert_eq!(file.path, "/Apps/root/a.txt");
                assert_eq!(file.name, "a.txt");
                assert_eq!(file.size, 12);
                assert_eq!(file.modified_at, datetime!(2022-05-20 0:00 UTC));
            }
            other => panic!("expected file, got {:?}", other),
        }
        assert!(matches!(&entries[1], Metadata::Folder(f) if f.path == "/Apps/root/sub"));
        assert!(matches!(&entries[2], Metadata::Deleted(_)));
        assert_eq!(entries[2].path(), "/Apps/root/gone");
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let json = r#"{"access_token": "sl.abc", "token_type": "bearer", "expires_in": 14400}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let pair = TokenPair::from(response);
        assert_eq!(pair.access_token, "sl.abc");
        assert_eq!(pair.refresh_token, None);
    }

    #[test]
    fn test_list_folder_arg_serialization() {
        let arg = ListFolderArg {
            path: "/Apps/root",
            recursive: true,
        };
        let json = serde_json::to_string(&arg).unwrap();
        assert_eq!(json, r#"{"path":"/Apps/root","recursive":true}"#);
    }
}
