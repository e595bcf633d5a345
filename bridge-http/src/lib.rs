//! HTTP client abstraction for the Globus transfer client.
//!
//! The OAuth flow and the transfer connector talk to the network through the
//! [`HttpClient`] trait rather than a concrete client, so both can be unit
//! tested against a mock. The default implementation,
//! [`ReqwestHttpClient`], lives in this crate behind the same trait.

mod reqwest_client;

pub use reqwest_client::ReqwestHttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Transport-level errors produced by an [`HttpClient`].
///
/// Status codes are not errors at this layer; callers inspect
/// [`HttpResponse::status`] and apply their own contract.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach an `Authorization: Bearer <token>` header.
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Serialize `body` as JSON and set the content type.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| HttpError::InvalidRequest(format!("JSON encoding failed: {}", e)))?;
        self.body = Some(Bytes::from(encoded));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Serialize `params` as `application/x-www-form-urlencoded` and set the
    /// content type. Used by the OAuth token exchange.
    pub fn form<T: Serialize>(mut self, params: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| HttpError::InvalidRequest(format!("form encoding failed: {}", e)))?;
        self.body = Some(Bytes::from(encoded));
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::Transport(format!("JSON decoding failed: {}", e)))
    }

    /// Get the response body as a UTF-8 string (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Check if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Async HTTP client seam.
///
/// Implementations perform exactly one attempt per call; retry policy
/// belongs to the caller, which knows which statuses are retryable for its
/// API.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request, returning the response regardless of status.
    ///
    /// # Errors
    ///
    /// Fails only on transport problems: connection failure, timeout, or an
    /// unencodable request.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
