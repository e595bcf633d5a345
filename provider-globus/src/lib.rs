//! # Globus Transfer API connector
//!
//! Bearer-authenticated REST calls against the Globus Transfer API
//! (v0.10): endpoint activation and search, directory listing, and transfer
//! submission with server-issued submission ids.
//!
//! Every call follows one contract: it resolves with a validated, typed
//! payload or fails with a [`TransferError`] carrying the HTTP status and
//! the parsed Globus error body. [`error_label`] maps Globus error codes to
//! the short labels a UI layer renders.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::TransferConnector;
pub use error::{error_label, Result, TransferError};
pub use types::{
    ActivationResult, DirectoryListing, Endpoint, EndpointSearchResults, FileEntry, TransferItem,
    TransferRequest, TransferResult,
};
