//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the auth and transfer
//! crates:
//! - Logging and tracing setup
//! - Event bus for auth state changes
//!
//! This crate establishes the logging conventions and event broadcasting
//! mechanism used throughout the workspace.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{AuthEvent, EventBus};
