//! # Authentication Manager
//!
//! Orchestrates the sign-in flow end to end: builds the authorization URL,
//! tracks the in-progress PKCE verifier, exchanges the callback code,
//! resolves the session signal, and emits auth events.
//!
//! The host opens the returned URL in a browser (the interactive step this
//! library cannot perform), captures the callback — typically with
//! [`RedirectListener`](crate::redirect::RedirectListener) — and hands the
//! code back to [`complete_sign_in`](AuthManager::complete_sign_in).

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
use crate::session::AuthSession;
use bridge_http::HttpClient;
use core_runtime::events::{AuthEvent, EventBus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};

/// Timeout for the token exchange (2 minutes).
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// PKCE material for the sign-in attempt currently awaiting its callback.
struct SignInProgress {
    verifier: PkceVerifier,
}

/// High-level authentication orchestrator.
pub struct AuthManager {
    flow: OAuthFlowManager,
    session: Arc<AuthSession>,
    event_bus: EventBus,
    in_progress: Mutex<Option<SignInProgress>>,
}

impl AuthManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, event_bus: EventBus) -> Self {
        Self {
            flow: OAuthFlowManager::new(config, http_client),
            session: Arc::new(AuthSession::new()),
            event_bus,
            in_progress: Mutex::new(None),
        }
    }

    /// The shared session; hand this to the transfer connector.
    pub fn session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.session)
    }

    /// Start a sign-in attempt.
    ///
    /// Generates PKCE parameters, records them as the in-progress attempt,
    /// emits [`AuthEvent::SigningIn`], and returns the authorization URL for
    /// the host to open.
    ///
    /// # Errors
    ///
    /// [`AuthError::SignInInProgress`] when an attempt is already awaiting
    /// its callback; cancel it first.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<String> {
        let mut in_progress = self.in_progress.lock().await;
        if in_progress.is_some() {
            warn!("sign-in already in progress");
            return Err(AuthError::SignInInProgress);
        }

        let (auth_url, verifier) = self.flow.build_auth_url()?;
        *in_progress = Some(SignInProgress { verifier });
        drop(in_progress);

        let _ = self.event_bus.emit(AuthEvent::SigningIn);

        info!("sign-in flow initiated");
        Ok(auth_url)
    }

    /// Complete the sign-in with the code and state from the callback.
    ///
    /// Exchanges the code (bounded by a 2-minute timeout), stores the token
    /// set, resolves the authorized signal, and emits
    /// [`AuthEvent::SignedIn`].
    #[instrument(skip_all)]
    pub async fn complete_sign_in(&self, code: &str, state: &str) -> Result<()> {
        let attempt = {
            let mut in_progress = self.in_progress.lock().await;
            in_progress.take().ok_or(AuthError::NoSignInInProgress)?
        };

        let exchange = self.flow.exchange_code(code, state, &attempt.verifier);
        let tokens = match timeout(DEFAULT_AUTH_TIMEOUT, exchange).await {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(e)) => {
                error!(error = %e, "token exchange failed");
                let _ = self.event_bus.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: !matches!(e, AuthError::StateMismatch { .. }),
                });
                return Err(e);
            }
            Err(_) => {
                error!("token exchange timed out");
                let _ = self.event_bus.emit(AuthEvent::AuthError {
                    message: "authentication timeout".to_string(),
                    recoverable: true,
                });
                return Err(AuthError::OperationTimeout {
                    operation: "token exchange",
                });
            }
        };

        let expires_at = Some(tokens.expires_at.timestamp());
        self.session.authorize(tokens);

        let _ = self.event_bus.emit(AuthEvent::SignedIn { expires_at });

        info!("sign-in completed");
        Ok(())
    }

    /// End the session: clear the token, invalidate pending waiters, emit
    /// [`AuthEvent::SignedOut`]. A fresh sign-in is required before further
    /// authenticated calls.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        // Discard any attempt still waiting for its callback.
        self.in_progress.lock().await.take();
        self.session.sign_out();

        let _ = self.event_bus.emit(AuthEvent::SignedOut);
        info!("signed out");
    }

    /// Discard the in-progress sign-in attempt, if any.
    ///
    /// Returns `true` when an attempt was discarded.
    pub async fn cancel_sign_in(&self) -> bool {
        self.in_progress.lock().await.take().is_some()
    }
}
