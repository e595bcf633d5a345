//! Session state: the process-wide transfer token and the authorized
//! signal that dependent calls wait on.
//!
//! Each sign-in cycle is a *generation* backed by a `tokio::sync::watch`
//! channel. Every waiter subscribed to the current generation is notified
//! when authorization completes. Sign-out replaces the generation with a
//! fresh, unresolved one: waiters still parked on the old generation fail
//! with [`AuthError::SignedOut`] rather than hanging, and a later sign-in
//! resolves only waiters subscribed after the sign-out.

use crate::error::{AuthError, Result};
use crate::types::{AuthState, GlobusTokens};
use std::sync::RwLock;
use tokio::sync::watch;

/// Shared authentication session.
///
/// The only mutable state in the crate: written once per sign-in cycle by
/// the auth manager, read by every authenticated API call.
pub struct AuthSession {
    signal: RwLock<watch::Sender<Option<GlobusTokens>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            signal: RwLock::new(tx),
        }
    }

    /// A waiter bound to the current sign-in generation.
    pub fn subscribe(&self) -> AuthorizedSignal {
        let guard = self.signal.read().expect("session lock poisoned");
        AuthorizedSignal {
            receiver: guard.subscribe(),
        }
    }

    /// Store the token set and resolve every waiter of the current
    /// generation.
    pub fn authorize(&self, tokens: GlobusTokens) {
        let guard = self.signal.read().expect("session lock poisoned");
        // send_replace rather than send: the value must be stored even when
        // nobody is currently waiting.
        guard.send_replace(Some(tokens));
    }

    /// Clear the stored token and start a fresh, unresolved generation.
    ///
    /// Waiters on the old generation observe a closed channel and fail with
    /// [`AuthError::SignedOut`].
    pub fn sign_out(&self) {
        let (tx, _) = watch::channel(None);
        let mut guard = self.signal.write().expect("session lock poisoned");
        *guard = tx;
    }

    /// The current transfer bearer token.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] before the current generation has
    /// been authorized.
    pub fn access_token(&self) -> Result<String> {
        let guard = self.signal.read().expect("session lock poisoned");
        let token = guard
            .borrow()
            .as_ref()
            .map(|tokens| tokens.transfer_token.clone())
            .ok_or(AuthError::NotAuthenticated);
        token
    }

    /// The full token set, when authorized.
    pub fn tokens(&self) -> Option<GlobusTokens> {
        let guard = self.signal.read().expect("session lock poisoned");
        let tokens = guard.borrow().clone();
        tokens
    }

    pub fn state(&self) -> AuthState {
        let guard = self.signal.read().expect("session lock poisoned");
        if guard.borrow().is_some() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        }
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-generation waiter for "a token is now available".
pub struct AuthorizedSignal {
    receiver: watch::Receiver<Option<GlobusTokens>>,
}

impl AuthorizedSignal {
    /// Wait until the generation this waiter belongs to is authorized.
    ///
    /// Resolves immediately when the token is already present.
    ///
    /// # Errors
    ///
    /// [`AuthError::SignedOut`] when the generation was replaced by a
    /// sign-out before it ever resolved.
    pub async fn wait(mut self) -> Result<GlobusTokens> {
        loop {
            let current = self.receiver.borrow().clone();
            if let Some(tokens) = current {
                return Ok(tokens);
            }
            self.receiver
                .changed()
                .await
                .map_err(|_| AuthError::SignedOut)?;
        }
    }
}
