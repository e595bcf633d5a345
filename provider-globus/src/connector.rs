//! Globus Transfer API connector.
//!
//! All operations authenticate with the current transfer token from the
//! shared [`AuthSession`] and talk to the API through the [`HttpClient`]
//! seam, so the whole connector is unit testable without a network.

use crate::error::{Result, TransferError};
use crate::types::{
    ActivationResult, ApiErrorBody, DirectoryListing, EndpointSearchResults, SubmissionIdResponse,
    TransferItem, TransferRequest, TransferResult,
};
use bridge_http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::AuthSession;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const TRANSFER_API_BASE: &str = "https://transfer.api.globusonline.org/v0.10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Client for the Globus Transfer REST API.
pub struct TransferConnector {
    http_client: Arc<dyn HttpClient>,
    session: Arc<AuthSession>,
    base_url: String,
}

impl TransferConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, session: Arc<AuthSession>) -> Self {
        Self {
            http_client,
            session,
            base_url: TRANSFER_API_BASE.to_string(),
        }
    }

    /// Override the API base URL. Used by tests.
    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        session: Arc<AuthSession>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            session,
            base_url: base_url.into(),
        }
    }

    /// Attempt automatic activation of an endpoint.
    ///
    /// Activation uses cached credentials where the endpoint allows it. A
    /// `code` of `AutoActivationFailed` means the endpoint needs manual
    /// credentials and is surfaced as [`TransferError::ActivationFailed`].
    #[instrument(skip(self), fields(endpoint_id = %endpoint_id))]
    pub async fn activate_endpoint(&self, endpoint_id: &str) -> Result<ActivationResult> {
        let url = format!("{}/endpoint/{}/autoactivate", self.base_url, endpoint_id);
        let response = self.execute_with_retry(HttpMethod::Post, url, None).await?;
        let result: ActivationResult = Self::parse_json(&response)?;

        if result.failed() {
            warn!(code = %result.code, "endpoint activation failed");
            return Err(TransferError::ActivationFailed {
                endpoint_id: endpoint_id.to_string(),
                message: result
                    .message
                    .unwrap_or_else(|| "automatic activation failed".to_string()),
            });
        }

        debug!(code = %result.code, "endpoint activated");
        Ok(result)
    }

    /// List the contents of a directory on an endpoint.
    #[instrument(skip(self), fields(endpoint_id = %endpoint_id, path = %path))]
    pub async fn list_directory(&self, endpoint_id: &str, path: &str) -> Result<DirectoryListing> {
        let url = format!(
            "{}/operation/endpoint/{}/ls?path={}",
            self.base_url,
            endpoint_id,
            encode_path(path)
        );
        let response = self.execute_with_retry(HttpMethod::Get, url, None).await?;
        let listing: DirectoryListing = Self::parse_json(&response)?;

        info!(entries = listing.entries.len(), "listed directory");
        Ok(listing)
    }

    /// Full-text search over endpoints visible to the signed-in user.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn endpoint_search(&self, query: &str) -> Result<EndpointSearchResults> {
        let url = format!(
            "{}/endpoint_search?filter_fulltext={}",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = self.execute_with_retry(HttpMethod::Get, url, None).await?;
        Self::parse_json(&response)
    }

    /// Submit a transfer of `items` between two endpoints.
    ///
    /// Obtains a fresh server-issued submission id first, which makes the
    /// submission idempotent against duplicate POSTs.
    #[instrument(skip(self, items), fields(
        source = %source_endpoint,
        destination = %destination_endpoint,
        items = items.len(),
    ))]
    pub async fn submit_transfer(
        &self,
        items: Vec<TransferItem>,
        source_endpoint: &str,
        destination_endpoint: &str,
    ) -> Result<TransferResult> {
        let submission_id = self.submission_id().await?;
        let request = TransferRequest::new(
            submission_id,
            source_endpoint.to_string(),
            destination_endpoint.to_string(),
            items,
        );

        let url = format!("{}/transfer", self.base_url);
        let body = serde_json::to_vec(&request)
            .map_err(|e| TransferError::Parse(format!("transfer body encoding failed: {}", e)))?;
        let response = self
            .execute_with_retry(HttpMethod::Post, url, Some(body))
            .await?;
        let result: TransferResult = Self::parse_json(&response)?;

        info!(task_id = %result.task_id, code = %result.code, "transfer submitted");
        Ok(result)
    }

    /// Fetch a single-use submission id for a transfer.
    async fn submission_id(&self) -> Result<String> {
        let url = format!("{}/submission_id", self.base_url);
        let response = self.execute_with_retry(HttpMethod::Get, url, None).await?;
        let id: SubmissionIdResponse = Self::parse_json(&response)?;
        Ok(id.value)
    }

    /// Execute a request with retry on rate limits and server errors.
    ///
    /// 429 and 5xx are retried with exponential backoff up to
    /// [`MAX_RETRIES`] attempts; any other non-2xx status is turned into a
    /// [`TransferError::Api`] from the Globus error body.
    async fn execute_with_retry(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let token = self.session.access_token()?;
        let mut attempt = 0;

        loop {
            let mut request = HttpRequest::new(method, url.clone())
                .bearer_token(&token)
                .header("Accept", "application/json")
                .timeout(REQUEST_TIMEOUT);
            if let Some(ref bytes) = body {
                request = request
                    .header("Content-Type", "application/json")
                    .body(bytes.clone().into());
            }

            let response = self.http_client.execute(request).await?;
            let status = response.status;

            if response.is_success() {
                debug!(status, "API request succeeded");
                return Ok(response);
            }

            if status == 429 || (500..600).contains(&status) {
                attempt += 1;
                if attempt >= MAX_RETRIES {
                    warn!(status, attempts = attempt, "API request exhausted retries");
                    return Err(Self::api_error(&response));
                }
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                debug!(status, attempt, ?backoff, "retrying API request");
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(Self::api_error(&response));
        }
    }

    /// Normalize a non-2xx response into [`TransferError::Api`].
    fn api_error(response: &HttpResponse) -> TransferError {
        let body: ApiErrorBody = response.json().unwrap_or(ApiErrorBody {
            code: None,
            message: None,
            request_id: None,
        });
        TransferError::Api {
            status: response.status,
            code: body.code.unwrap_or_else(|| "Unknown".to_string()),
            message: body.message.unwrap_or_else(|| response.text()),
            request_id: body.request_id,
        }
    }

    fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
        response
            .json()
            .map_err(|e| TransferError::Parse(format!("response decoding failed: {}", e)))
    }
}

/// Percent-encode a path for the `ls` query while keeping `/` literal, the
/// form the API expects for path parameters.
fn encode_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_http::{HttpError, HttpResponse};
    use bytes::Bytes;
    use core_auth::{AuthError, GlobusTokens};
    use mockall::mock;
    use mockall::predicate::function;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(
                &self,
                request: HttpRequest,
            ) -> std::result::Result<HttpResponse, HttpError>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn signed_in_session() -> Arc<AuthSession> {
        let session = Arc::new(AuthSession::new());
        session.authorize(GlobusTokens::new(
            "transfer-token".to_string(),
            None,
            3600,
        ));
        session
    }

    fn connector(mock: MockHttp) -> TransferConnector {
        TransferConnector::with_base_url(
            Arc::new(mock),
            signed_in_session(),
            "https://transfer.test/v0.10",
        )
    }

    #[tokio::test]
    async fn list_directory_builds_url_and_auth_header() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .with(function(|request: &HttpRequest| {
                request.method == HttpMethod::Get
                    && request.url
                        == "https://transfer.test/v0.10/operation/endpoint/ep1/ls?path=/home"
                    && request.headers.get("Authorization")
                        == Some(&"Bearer transfer-token".to_string())
            }))
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"path": "/home/", "DATA": [{"name": "f", "type": "file"}]}"#,
                ))
            });

        let listing = connector(mock).list_directory("ep1", "/home").await.unwrap();
        assert_eq!(listing.path, "/home/");
        assert_eq!(listing.entries.len(), 1);
    }

    #[tokio::test]
    async fn list_directory_encodes_spaces_but_not_slashes() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .with(function(|request: &HttpRequest| {
                request.url.ends_with("/ls?path=/my%20data/archive")
            }))
            .times(1)
            .returning(|_| Ok(response(200, r#"{"path": "/my data/archive/"}"#)));

        connector(mock)
            .list_directory("ep1", "/my data/archive")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_directory_missing_path_maps_to_api_error() {
        let mut mock = MockHttp::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(response(
                404,
                r#"{"code": "ClientError.NotFound", "message": "no such path",
                    "request_id": "abc123"}"#,
            ))
        });

        let err = connector(mock)
            .list_directory("ep1", "/missing")
            .await
            .unwrap_err();
        match err {
            TransferError::Api {
                status,
                ref code,
                ref request_id,
                ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "ClientError.NotFound");
                assert_eq!(request_id.as_deref(), Some("abc123"));
                assert_eq!(err.label(), Some("Directory Not Found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn endpoint_search_encodes_query() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .with(function(|request: &HttpRequest| {
                request.url
                    == "https://transfer.test/v0.10/endpoint_search?filter_fulltext=campus%20cluster"
            }))
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"DATA": [{"id": "ep1", "display_name": "Campus Cluster",
                        "activated": true}], "has_next_page": false}"#,
                ))
            });

        let results = connector(mock).endpoint_search("campus cluster").await.unwrap();
        assert_eq!(results.endpoints.len(), 1);
        assert_eq!(results.endpoints[0].id, "ep1");
    }

    #[tokio::test]
    async fn activate_endpoint_success() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .with(function(|request: &HttpRequest| {
                request.method == HttpMethod::Post
                    && request.url == "https://transfer.test/v0.10/endpoint/ep1/autoactivate"
            }))
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"code": "AutoActivated.CachedCredential", "expires_in": 86400}"#,
                ))
            });

        let result = connector(mock).activate_endpoint("ep1").await.unwrap();
        assert_eq!(result.code, "AutoActivated.CachedCredential");
    }

    #[tokio::test]
    async fn activate_endpoint_failure_is_surfaced() {
        let mut mock = MockHttp::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(response(
                200,
                r#"{"code": "AutoActivationFailed", "message": "credential required"}"#,
            ))
        });

        let err = connector(mock).activate_endpoint("ep1").await.unwrap_err();
        match err {
            TransferError::ActivationFailed {
                endpoint_id,
                message,
            } => {
                assert_eq!(endpoint_id, "ep1");
                assert_eq!(message, "credential required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn submit_transfer_fetches_submission_id_and_posts_descriptor() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(2)
            .returning(|request: HttpRequest| {
                if request.url.ends_with("/submission_id") {
                    assert_eq!(request.method, HttpMethod::Get);
                    return Ok(response(200, r#"{"value": "sub-123"}"#));
                }
                assert_eq!(request.method, HttpMethod::Post);
                assert_eq!(request.url, "https://transfer.test/v0.10/transfer");
                let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
                assert_eq!(
                    body,
                    r#"{"DATA_TYPE":"transfer","submission_id":"sub-123","source_endpoint":"src1","destination_endpoint":"dst1","DATA":[{"DATA_TYPE":"transfer_item","source_path":"/a","destination_path":"/b"}],"notify_on_succeeded":false}"#
                );
                Ok(response(
                    202,
                    r#"{"task_id": "2f8f3c8e-0d7a-49d3-8c4e-0f1a2b3c4d5e",
                        "code": "Accepted", "submission_id": "sub-123"}"#,
                ))
            });

        let result = connector(mock)
            .submit_transfer(vec![TransferItem::file("/a", "/b")], "src1", "dst1")
            .await
            .unwrap();
        assert_eq!(result.code, "Accepted");
    }

    #[tokio::test]
    async fn submit_transfer_rejection_maps_to_api_error() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(2)
            .returning(|request: HttpRequest| {
                if request.url.ends_with("/submission_id") {
                    return Ok(response(200, r#"{"value": "sub-123"}"#));
                }
                Ok(response(
                    400,
                    r#"{"code": "BadRequest", "message": "source_endpoint is required"}"#,
                ))
            });

        let err = connector(mock)
            .submit_transfer(vec![TransferItem::file("/a", "/b")], "src1", "dst1")
            .await
            .unwrap_err();
        match err {
            TransferError::Api { status, code, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "BadRequest");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn requests_require_a_signed_in_session() {
        let mock = MockHttp::new(); // no expectations: must not hit the network
        let connector = TransferConnector::with_base_url(
            Arc::new(mock),
            Arc::new(AuthSession::new()),
            "https://transfer.test/v0.10",
        );

        let err = connector.list_directory("ep1", "/home").await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Auth(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried_with_backoff() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, r#"{"code": "ServiceUnavailable"}"#)));
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"path": "/home/"}"#)));

        let listing = connector(mock).list_directory("ep1", "/home").await.unwrap();
        assert_eq!(listing.path, "/home/");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .times(MAX_RETRIES as usize)
            .returning(|_| {
                Ok(response(
                    503,
                    r#"{"code": "ServiceUnavailable", "message": "maintenance"}"#,
                ))
            });

        let err = connector(mock).list_directory("ep1", "/home").await.unwrap_err();
        match err {
            TransferError::Api { status, ref code, .. } => {
                assert_eq!(status, 503);
                assert_eq!(code, "ServiceUnavailable");
                assert_eq!(err.label(), Some("Server Under Maintenance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
