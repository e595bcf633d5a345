//! Error types for the transfer connector, plus the error-code label table.

use thiserror::Error;

/// Transfer API errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The API answered with an error status; `code` and `message` come from
    /// the parsed Globus error body.
    #[error("transfer API error (status {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Automatic endpoint activation was attempted and refused.
    #[error("activation of endpoint {endpoint_id} failed: {message}")]
    ActivationFailed {
        endpoint_id: String,
        message: String,
    },

    /// No token is available (or another auth-layer failure).
    #[error(transparent)]
    Auth(#[from] core_auth::AuthError),

    /// The API answered successfully but the payload did not parse.
    #[error("failed to parse API response: {0}")]
    Parse(String),

    /// Transport failure.
    #[error("network error: {0}")]
    Http(#[from] bridge_http::HttpError),
}

impl TransferError {
    /// The UI label for this error, when it maps to a known Globus code.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            TransferError::Api { code, .. } => error_label(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Map a Globus error identifier to a human-readable label for display.
///
/// Unknown sub-codes of `ExternalError.DirListingFailed.*` fall back to the
/// generic listing label; anything else unknown returns `None` and the
/// caller shows the raw message.
pub fn error_label(code: &str) -> Option<&'static str> {
    match code {
        "ClientError.NotFound" => Some("Directory Not Found"),
        "EndpointPermissionDenied" => Some("Endpoint Permission Denied"),
        "ClientError.ActivationRequired" => Some("Endpoint Activation Required"),
        "ExternalError.DirListingFailed.NotDirectory" => Some("Not a Directory"),
        "ServiceUnavailable" => Some("Server Under Maintenance"),
        "ExternalError.DirListingFailed.GCDisconnected" => {
            Some("Globus Connect Personal Not Running")
        }
        "ExternalError.DirListingFailed.PermissionDenied" => Some("Permission Denied"),
        code if code.starts_with("ExternalError.DirListingFailed") => {
            Some("Directory Listing Failed")
        }
        _ => None,
    }
}
