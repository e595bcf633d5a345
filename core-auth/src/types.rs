use serde::{Deserialize, Serialize};
use std::fmt;

/// Token set returned by a completed Globus authorization.
///
/// `transfer_token` is the bearer credential for the transfer API, taken
/// from the `other_tokens` list of the token payload. The refresh token is
/// retained for callers but never used by this crate.
///
/// # Security
///
/// The `Debug` implementation redacts token values.
#[derive(Clone, Serialize, Deserialize)]
pub struct GlobusTokens {
    /// Bearer token for the transfer API
    pub transfer_token: String,
    /// Long-lived refresh token, when the provider issued one
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl GlobusTokens {
    pub fn new(transfer_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            transfer_token,
            refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Whether the access token is expired or expires within `buffer_seconds`.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        chrono::Utc::now() >= self.expires_at - chrono::Duration::seconds(buffer_seconds)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(0)
    }
}

impl fmt::Debug for GlobusTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobusTokens")
            .field("transfer_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authentication state of the session.
///
/// ```text
/// SignedOut -> SigningIn -> SignedIn -> SignedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    /// No token is held
    #[default]
    SignedOut,
    /// Authorization flow in progress
    SigningIn,
    /// A transfer token is available
    SignedIn,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::SigningIn => write!(f, "Signing In..."),
            AuthState::SignedIn => write!(f, "Signed In"),
        }
    }
}
