//! Globus Transfer API wire types.
//!
//! The API wraps payloads in a `DATA_TYPE`/`DATA` envelope; structs here
//! mirror that envelope so request bodies serialize exactly as the API
//! expects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One item of a transfer request (`DATA_TYPE: "transfer_item"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    pub data_type: String,
    pub source_path: String,
    pub destination_path: String,
    /// Required (true) when the item is a directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
}

impl TransferItem {
    /// A single-file item.
    pub fn file(source_path: impl Into<String>, destination_path: impl Into<String>) -> Self {
        Self {
            data_type: "transfer_item".to_string(),
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            recursive: None,
        }
    }

    /// A recursive directory item.
    pub fn directory(source_path: impl Into<String>, destination_path: impl Into<String>) -> Self {
        Self {
            recursive: Some(true),
            ..Self::file(source_path, destination_path)
        }
    }
}

/// Transfer submission body (`DATA_TYPE: "transfer"`).
///
/// The submission id is server-issued per transfer, which makes the POST
/// idempotent: resubmitting the same descriptor cannot start a second task.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    #[serde(rename = "DATA_TYPE")]
    pub data_type: &'static str,
    pub submission_id: String,
    pub source_endpoint: String,
    pub destination_endpoint: String,
    #[serde(rename = "DATA")]
    pub data: Vec<TransferItem>,
    pub notify_on_succeeded: bool,
}

impl TransferRequest {
    pub fn new(
        submission_id: String,
        source_endpoint: String,
        destination_endpoint: String,
        data: Vec<TransferItem>,
    ) -> Self {
        Self {
            data_type: "transfer",
            submission_id,
            source_endpoint,
            destination_endpoint,
            data,
            notify_on_succeeded: false,
        }
    }
}

/// Accepted transfer submission.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferResult {
    /// Task id tracking the transfer
    pub task_id: Uuid,
    /// Result code, e.g. `Accepted`
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub submission_id: Option<String>,
}

/// One entry of a directory listing (`DATA_TYPE: "file"`).
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// `"file"`, `"dir"`, or `"invalid_symlink"`
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl FileEntry {
    pub fn is_directory(&self) -> bool {
        self.entry_type == "dir"
    }
}

/// Directory listing (`DATA_TYPE: "file_list"`).
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryListing {
    /// The listed path, as resolved by the endpoint
    pub path: String,
    #[serde(rename = "DATA", default)]
    pub entries: Vec<FileEntry>,
}

/// An endpoint returned by the search API.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub owner_string: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activated: bool,
}

/// Endpoint search results (`DATA_TYPE: "endpoint_list"`).
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSearchResults {
    #[serde(rename = "DATA", default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// Result of an autoactivation attempt (`DATA_TYPE: "activation_result"`).
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationResult {
    /// e.g. `AutoActivated.CachedCredential`, `AlreadyActivated`,
    /// `AutoActivationFailed`
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl ActivationResult {
    /// Whether the attempt left the endpoint unusable.
    pub fn failed(&self) -> bool {
        self.code == "AutoActivationFailed"
    }
}

/// Response of `GET /submission_id`.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionIdResponse {
    pub value: String,
}

/// Globus error body attached to non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_request_serializes_the_full_envelope() {
        let request = TransferRequest::new(
            "sub-123".to_string(),
            "src1".to_string(),
            "dst1".to_string(),
            vec![TransferItem::file("/a", "/b")],
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "DATA_TYPE": "transfer",
                "submission_id": "sub-123",
                "source_endpoint": "src1",
                "destination_endpoint": "dst1",
                "DATA": [{
                    "DATA_TYPE": "transfer_item",
                    "source_path": "/a",
                    "destination_path": "/b"
                }],
                "notify_on_succeeded": false
            })
        );
    }

    #[test]
    fn directory_items_serialize_recursive() {
        let item = TransferItem::directory("/data", "/backup/data");
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "DATA_TYPE": "transfer_item",
                "source_path": "/data",
                "destination_path": "/backup/data",
                "recursive": true
            })
        );
    }

    #[test]
    fn deserialize_directory_listing() {
        let json = r#"{
            "DATA_TYPE": "file_list",
            "path": "/home/",
            "DATA": [
                {"DATA_TYPE": "file", "name": "data", "type": "dir", "size": 4096,
                 "permissions": "0755", "user": "alice", "group": "staff",
                 "last_modified": "2023-05-01 12:00:00+00:00"},
                {"DATA_TYPE": "file", "name": "notes.txt", "type": "file", "size": 120}
            ]
        }"#;

        let listing: DirectoryListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.path, "/home/");
        assert_eq!(listing.entries.len(), 2);
        assert!(listing.entries[0].is_directory());
        assert!(!listing.entries[1].is_directory());
        assert_eq!(listing.entries[1].size, Some(120));
    }

    #[test]
    fn deserialize_endpoint_search() {
        let json = r#"{
            "DATA_TYPE": "endpoint_list",
            "DATA": [
                {"id": "c99b3e0a-8b3a-4c52-ae1c-4a0d1b6b2f7e",
                 "display_name": "Campus Cluster", "owner_string": "hpc@campus.edu",
                 "activated": true}
            ],
            "has_next_page": false
        }"#;

        let results: EndpointSearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.endpoints.len(), 1);
        assert_eq!(
            results.endpoints[0].display_name.as_deref(),
            Some("Campus Cluster")
        );
        assert!(!results.has_next_page);
    }

    #[test]
    fn activation_result_failure_detection() {
        let ok: ActivationResult = serde_json::from_str(
            r#"{"code": "AutoActivated.CachedCredential", "expires_in": 86400}"#,
        )
        .unwrap();
        assert!(!ok.failed());

        let failed: ActivationResult = serde_json::from_str(
            r#"{"code": "AutoActivationFailed", "message": "credential required"}"#,
        )
        .unwrap();
        assert!(failed.failed());
    }

    #[test]
    fn deserialize_transfer_result() {
        let json = r#"{
            "DATA_TYPE": "transfer_result",
            "task_id": "2f8f3c8e-0d7a-49d3-8c4e-0f1a2b3c4d5e",
            "code": "Accepted",
            "message": "The transfer has been accepted",
            "submission_id": "sub-123"
        }"#;

        let result: TransferResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.code, "Accepted");
        assert_eq!(
            result.task_id.to_string(),
            "2f8f3c8e-0d7a-49d3-8c4e-0f1a2b3c4d5e"
        );
    }
}
