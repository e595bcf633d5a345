//! Loopback capture of the OAuth redirect.
//!
//! The authorization flow sends the user's browser back to the registered
//! redirect URI with the authorization code in the query string. For a
//! native client that URI points at the loopback interface, so this module
//! binds a small TCP listener there and waits for the provider's redirect.
//!
//! The wait is bounded by a timeout and by a [`CancellationToken`] handle;
//! an abandoned sign-in (browser window closed, user walked away) releases
//! the listener instead of leaking it.

use crate::error::{AuthError, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Maximum bytes read from the incoming request head.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Sign-in complete.</h3>\
<p>You can close this window and return to the application.</p></body></html>";
const DENIED_PAGE: &str = "<html><body><h3>Sign-in was not completed.</h3>\
<p>You can close this window.</p></body></html>";

/// Authorization code and state extracted from the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCallback {
    pub code: String,
    pub state: String,
}

/// One-shot listener for the OAuth redirect on the loopback interface.
pub struct RedirectListener {
    listener: TcpListener,
    path: String,
    cancel: CancellationToken,
}

impl RedirectListener {
    /// Bind on the host and port of the registered redirect URI.
    ///
    /// `http://localhost:8888/lab` binds `localhost:8888` and accepts the
    /// callback on path `/lab`. Port 0 binds an ephemeral port (useful in
    /// tests; a registered client uses a fixed port).
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| AuthError::Other(format!("invalid redirect URI: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| AuthError::Other("redirect URI has no host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AuthError::Other("redirect URI has no port".to_string()))?;

        let listener = TcpListener::bind((host.as_str(), port)).await?;
        debug!(addr = %listener.local_addr()?, "redirect listener bound");

        Ok(Self {
            listener,
            path: url.path().to_string(),
            cancel: CancellationToken::new(),
        })
    }

    /// The bound address (the real port when bound with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that cancels a pending [`wait_for_callback`](Self::wait_for_callback).
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the provider to redirect back, for at most `timeout`.
    ///
    /// Requests for other paths (favicons, health checks) are answered with
    /// 404 and ignored. Consumes the listener: the redirect URI is a
    /// one-shot channel per sign-in attempt.
    ///
    /// # Errors
    ///
    /// - [`AuthError::OperationTimeout`] when the timeout elapses
    /// - [`AuthError::Cancelled`] when the cancel handle fires
    /// - [`AuthError::AuthorizationDenied`] when the provider reports an
    ///   error (e.g., `access_denied`)
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn wait_for_callback(self, timeout: Duration) -> Result<AuthCallback> {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("redirect capture cancelled");
                Err(AuthError::Cancelled)
            }
            result = tokio::time::timeout(timeout, self.accept_loop()) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    warn!("redirect capture timed out");
                    Err(AuthError::OperationTimeout { operation: "redirect capture" })
                }
            }
        }
    }

    async fn accept_loop(&self) -> Result<AuthCallback> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!(%peer, "connection on redirect listener");

            match self.handle_connection(&mut stream).await {
                Ok(Some(callback)) => {
                    info!("authorization callback received");
                    return Ok(callback);
                }
                Ok(None) => continue,
                Err(err @ AuthError::AuthorizationDenied(_)) => return Err(err),
                Err(e) => {
                    // Malformed request from something else on loopback;
                    // keep waiting for the real redirect.
                    warn!(error = %e, "ignoring malformed request");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: &mut TcpStream) -> Result<Option<AuthCallback>> {
        let head = read_request_head(stream).await?;

        let target = match request_target(&head) {
            Some(target) => target,
            None => {
                respond(stream, "400 Bad Request", DENIED_PAGE).await?;
                return Err(AuthError::Other("unparseable request line".to_string()));
            }
        };

        // Resolve the origin-form target against a dummy base to reuse the
        // URL query parser.
        let url = Url::parse(&format!("http://localhost{}", target))
            .map_err(|e| AuthError::Other(format!("invalid request target: {}", e)))?;

        if url.path() != self.path {
            respond(stream, "404 Not Found", "").await?;
            return Ok(None);
        }

        let params: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if let Some(error) = params.get("error") {
            respond(stream, "200 OK", DENIED_PAGE).await?;
            let detail = params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| error.clone());
            return Err(AuthError::AuthorizationDenied(detail));
        }

        match params.get("code") {
            Some(code) => {
                respond(stream, "200 OK", SUCCESS_PAGE).await?;
                Ok(Some(AuthCallback {
                    code: code.clone(),
                    state: params.get("state").cloned().unwrap_or_default(),
                }))
            }
            None => {
                respond(stream, "400 Bad Request", DENIED_PAGE).await?;
                Ok(None)
            }
        }
    }
}

/// Read until the end of the request head or the size cap.
async fn read_request_head(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extract the request target from `GET /path?query HTTP/1.1`.
fn request_target(head: &str) -> Option<&str> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    if method != "GET" {
        return None;
    }
    parts.next()
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn bind_ephemeral() -> (RedirectListener, String) {
        let listener = RedirectListener::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr.to_string())
    }

    async fn send_request(addr: &str, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn callback_code_and_state_are_extracted() {
        let (listener, addr) = bind_ephemeral().await;

        let wait = tokio::spawn(listener.wait_for_callback(Duration::from_secs(5)));
        let response = send_request(&addr, "/callback?code=abc123&state=xyz").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert_eq!(
            wait.await.unwrap().unwrap(),
            AuthCallback {
                code: "abc123".to_string(),
                state: "xyz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unrelated_paths_are_ignored() {
        let (listener, addr) = bind_ephemeral().await;

        let wait = tokio::spawn(listener.wait_for_callback(Duration::from_secs(5)));

        let response = send_request(&addr, "/favicon.ico").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        send_request(&addr, "/callback?code=later&state=s").await;
        assert_eq!(wait.await.unwrap().unwrap().code, "later");
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let (listener, addr) = bind_ephemeral().await;

        let wait = tokio::spawn(listener.wait_for_callback(Duration::from_secs(5)));
        send_request(
            &addr,
            "/callback?error=access_denied&error_description=user+declined",
        )
        .await;

        match wait.await.unwrap() {
            Err(AuthError::AuthorizationDenied(detail)) => {
                assert_eq!(detail, "user declined");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn wait_times_out() {
        let (listener, _addr) = bind_ephemeral().await;

        let err = listener
            .wait_for_callback(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::OperationTimeout { .. }));
    }

    #[tokio::test]
    async fn cancel_handle_stops_the_wait() {
        let (listener, _addr) = bind_ephemeral().await;
        let cancel = listener.cancel_handle();

        let wait = tokio::spawn(listener.wait_for_callback(Duration::from_secs(30)));
        cancel.cancel();

        assert!(matches!(wait.await.unwrap(), Err(AuthError::Cancelled)));
    }
}
