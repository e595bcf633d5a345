use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("state parameter mismatch: expected '{expected}', got '{actual}'")]
    StateMismatch { expected: String, actual: String },

    #[error("token endpoint returned {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("a sign-in is already in progress")]
    SignInInProgress,

    #[error("no sign-in in progress")]
    NoSignInInProgress,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("signed out while waiting for authorization")]
    SignedOut,

    #[error("redirect capture was cancelled")]
    Cancelled,

    #[error("{operation} timed out")]
    OperationTimeout { operation: &'static str },

    #[error("network error: {0}")]
    Network(#[from] bridge_http::HttpError),

    #[error("redirect listener I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
