//! # Event Bus
//!
//! Decoupled notification of authentication state changes via
//! `tokio::sync::broadcast`. The auth manager emits events here; UI layers
//! (e.g., a file-browser panel) subscribe to re-render on sign-in and
//! sign-out without holding references into the auth crate.
//!
//! Subscribers should treat `RecvError::Lagged` as non-fatal (events were
//! missed but the stream continues) and `RecvError::Closed` as shutdown.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::SendError, Receiver};

/// Default buffer size per subscriber.
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Events describing the authentication lifecycle.
///
/// Payloads carry no token material; only state transitions and error
/// messages intended for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Authorization flow started; the host should be directing the user to
    /// the authorization URL.
    SigningIn,
    /// Token exchange completed; authenticated calls can proceed.
    SignedIn {
        /// Unix timestamp (seconds) when the access token expires, if known.
        expires_at: Option<i64>,
    },
    /// Session ended; the stored token was discarded.
    SignedOut,
    /// Authorization failed.
    AuthError {
        /// Human-readable error message.
        message: String,
        /// Whether a retry might succeed (e.g., a timeout vs. a rejected
        /// authorization code).
        recoverable: bool,
    },
}

impl AuthEvent {
    /// Human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            AuthEvent::SigningIn => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }

    /// Severity for log-level mapping in subscribers.
    pub fn severity(&self) -> EventSeverity {
        match self {
            AuthEvent::AuthError { .. } => EventSeverity::Error,
            AuthEvent::SignedIn { .. } | AuthEvent::SignedOut => EventSeverity::Info,
            AuthEvent::SigningIn => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Broadcast channel distributing [`AuthEvent`]s to any number of
/// independent subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity. A
    /// subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// there are none. Emitters that do not care may ignore the result.
    pub fn emit(&self, event: AuthEvent) -> Result<usize, SendError<AuthEvent>> {
        self.sender.send(event)
    }

    /// Create an independent receiver for all future events. Past events are
    /// not replayed.
    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
