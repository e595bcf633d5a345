//! OAuth 2.0 authorization flow with PKCE (RFC 6749 + RFC 7636).
//!
//! # Overview
//!
//! - Builds the authorization URL with the PKCE challenge
//! - Exchanges the authorization code for tokens
//! - Verifies the state parameter (CSRF protection)
//!
//! # Security
//!
//! - The code verifier is generated with a cryptographically secure RNG and
//!   never transmitted during authorization; only its SHA-256 challenge is.
//! - Tokens, codes, and verifiers are never logged.

use crate::error::{AuthError, Result};
use crate::types::GlobusTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_http::{HttpClient, HttpMethod, HttpRequest};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Globus Auth authorization endpoint.
pub const GLOBUS_AUTH_URL: &str = "https://auth.globus.org/v2/oauth2/authorize";
/// Globus Auth token endpoint.
pub const GLOBUS_TOKEN_URL: &str = "https://auth.globus.org/v2/oauth2/token";

const DEFAULT_CLIENT_ID: &str = "a4b3ea61-d252-4fe2-9b49-9e7e69434367";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/lab";
const DEFAULT_SCOPES: &str =
    "openid email profile urn:globus:auth:scope:transfer.api.globus.org:all";

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID (a public native-app client; no secret)
    pub client_id: String,
    /// Registered redirect URI for the OAuth callback
    pub redirect_uri: String,
    /// Requested OAuth scopes
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    /// Globus Auth configuration with the registered defaults.
    ///
    /// `GLOBUS_CLIENT_ID` and `GLOBUS_REDIRECT_URI` environment variables
    /// override the built-in client registration.
    pub fn globus() -> Self {
        Self {
            client_id: std::env::var("GLOBUS_CLIENT_ID")
                .unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string()),
            redirect_uri: std::env::var("GLOBUS_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
            scopes: DEFAULT_SCOPES.split(' ').map(str::to_string).collect(),
            auth_url: GLOBUS_AUTH_URL.to_string(),
            token_url: GLOBUS_TOKEN_URL.to_string(),
        }
    }
}

/// PKCE code verifier plus the state parameter for one sign-in attempt.
///
/// The verifier must be retained unchanged between the authorization request
/// and the matching token exchange, and is never sent during authorization.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a fresh verifier (32 random bytes, base64url) and state
    /// parameter (16 random bytes, base64url).
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        // 43-128 characters per RFC 7636; 32 bytes encodes to 43
        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 code challenge: BASE64URL(SHA-256(verifier)), unpadded.
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the authorization-code flow against the configured provider.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL for the user's browser.
    ///
    /// Returns the URL together with the PKCE verifier, which the caller
    /// must hold on to for [`exchange_code`](Self::exchange_code).
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("response_type", "code");
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
        }

        debug!("built authorization URL");
        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for Globus tokens.
    ///
    /// `state` is the value returned on the callback and must match the one
    /// generated with `verifier`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] when the callback state differs
    /// - [`AuthError::TokenExchangeFailed`] carrying the HTTP status and the
    ///   error body for any status >= 400
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<GlobusTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier.verifier()),
        ];

        debug!("exchanging authorization code for tokens");

        let request =
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone()).form(&params)?;
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let status = response.status;
            let body = response.text();
            warn!(status, "token exchange failed");
            return Err(AuthError::TokenExchangeFailed { status, body });
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("malformed token payload: {}", e)))?;

        info!(
            expires_in = token_response.expires_in,
            "authorization code exchanged"
        );

        token_response.into_tokens()
    }
}

/// JSON payload from the Globus token endpoint.
///
/// Globus issues one token per resource server: the top-level token covers
/// the Auth API scopes, while `other_tokens` carries the per-resource
/// tokens. The first of those is the transfer API bearer token.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    other_tokens: Vec<ResourceToken>,
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ResourceToken {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    resource_server: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    fn into_tokens(self) -> Result<GlobusTokens> {
        match self.other_tokens.into_iter().next() {
            Some(resource) => {
                if let Some(server) = &resource.resource_server {
                    debug!(resource_server = %server, "using per-resource token");
                }
                Ok(GlobusTokens::new(
                    resource.access_token,
                    resource.refresh_token,
                    resource.expires_in,
                ))
            }
            // Confidential deployments may scope everything onto the
            // top-level token.
            None => Ok(GlobusTokens::new(
                self.access_token,
                self.refresh_token,
                self.expires_in,
            )),
        }
    }
}
