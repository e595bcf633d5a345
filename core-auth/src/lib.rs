//! # Authentication Module
//!
//! OAuth 2.0 authorization-code flow with PKCE against Globus Auth.
//!
//! ## Overview
//!
//! This crate obtains the bearer token used by the transfer API crate. The
//! flow is split the same way the pieces are exercised:
//!
//! - [`oauth`] builds the authorization URL (with PKCE challenge) and
//!   exchanges the authorization code for tokens.
//! - [`redirect`] captures the provider's redirect on the loopback
//!   interface, with a bounded timeout and a cancellation handle.
//! - [`session`] holds the process-wide token and the authorized signal that
//!   dependent calls wait on.
//! - [`manager`] orchestrates the above and emits auth events.
//!
//! ## Flow
//!
//! ```no_run
//! use core_auth::{AuthManager, OAuthConfig, RedirectListener};
//! use core_runtime::events::EventBus;
//! use bridge_http::ReqwestHttpClient;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> core_auth::Result<()> {
//! let config = OAuthConfig::globus();
//! let listener = RedirectListener::bind(&config.redirect_uri).await?;
//! let manager = AuthManager::new(config, Arc::new(ReqwestHttpClient::new()), EventBus::default());
//!
//! let auth_url = manager.sign_in().await?;
//! // Open `auth_url` in the user's browser...
//!
//! let callback = listener.wait_for_callback(Duration::from_secs(300)).await?;
//! manager.complete_sign_in(&callback.code, &callback.state).await?;
//!
//! let token = manager.session().access_token()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod oauth;
pub mod redirect;
pub mod session;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use redirect::{AuthCallback, RedirectListener};
pub use session::{AuthSession, AuthorizedSignal};
pub use types::{AuthState, GlobusTokens};
