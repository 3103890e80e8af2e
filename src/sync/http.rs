//! HTTP remote gateway.
//!
//! Talks JSON over HTTP to a Keeper server:
//! - `POST /api/v1/sign_in` and `POST /api/v1/sign_up` with `{login, password}`
//!   return a token in the `Authorization` header (or as `{"token": ...}`)
//! - `POST /api/v1/sync` with `Authorization: <token>` exchanges payloads
//!
//! The client is async (reqwest); calls are driven to completion on an owned
//! tokio runtime so the rest of the crate stays synchronous. Every request
//! is bounded by the configured timeout. There is no retry.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::debug;

use super::gateway::RemoteGateway;
use super::types::{GatewayError, SyncPayload, Token};
use crate::error::{Error, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct Credentials<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

/// Remote gateway backed by an HTTP server.
pub struct HttpGateway {
    client: reqwest::Client,
    runtime: Runtime,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client or runtime cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        let runtime = Runtime::new()
            .map_err(|e| Error::Config(format!("cannot start async runtime: {e}")))?;

        Ok(Self {
            client,
            runtime,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post_credentials(
        &self,
        path: &str,
        login: &str,
        verifier: &str,
    ) -> std::result::Result<(StatusCode, Option<Token>), GatewayError> {
        let url = self.url(path);
        debug!(%url, login, "Requesting token");

        self.runtime.block_on(async {
            let response = self
                .client
                .post(&url)
                .json(&Credentials {
                    login,
                    password: verifier,
                })
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if !status.is_success() {
                return Ok((status, None));
            }

            let header = response
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(Token::new);
            if let Some(token) = header {
                return Ok((status, Some(token)));
            }

            let body: TokenBody = response
                .json()
                .await
                .map_err(|e| GatewayError::Protocol(format!("no token in response: {e}")))?;
            Ok((status, Some(Token::new(body.token))))
        })
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Transport(format!("request timed out: {err}"))
    } else {
        GatewayError::Transport(err.to_string())
    }
}

fn unexpected(status: StatusCode) -> GatewayError {
    GatewayError::Protocol(format!("unexpected status {status}"))
}

impl RemoteGateway for HttpGateway {
    fn authenticate(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
        match self.post_credentials("/api/v1/sign_in", login, verifier)? {
            (_, Some(token)) => Ok(token),
            (StatusCode::NOT_FOUND, None) => Err(GatewayError::UnknownUser),
            (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, None) => {
                Err(GatewayError::Rejected("invalid credentials".into()))
            }
            (status, None) => Err(unexpected(status)),
        }
    }

    fn register(&self, login: &str, verifier: &str) -> std::result::Result<Token, GatewayError> {
        match self.post_credentials("/api/v1/sign_up", login, verifier)? {
            (_, Some(token)) => Ok(token),
            (StatusCode::CONFLICT, None) => {
                Err(GatewayError::Rejected(format!("login '{login}' is taken")))
            }
            (status, None) => Err(unexpected(status)),
        }
    }

    fn sync(
        &self,
        token: &Token,
        payload: &SyncPayload,
    ) -> std::result::Result<SyncPayload, GatewayError> {
        let url = self.url("/api/v1/sync");
        debug!(%url, sent = payload.counts().total(), "Sending sync payload");

        self.runtime.block_on(async {
            let response = self
                .client
                .post(&url)
                .header(AUTHORIZATION, token.as_str())
                .json(payload)
                .send()
                .await
                .map_err(transport)?;

            match response.status() {
                s if s.is_success() => response
                    .json::<SyncPayload>()
                    .await
                    .map_err(|e| GatewayError::Protocol(format!("invalid sync response: {e}"))),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(GatewayError::Unauthorized("token refused".into()))
                }
                status => Err(unexpected(status)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Serve one canned response and hand back the raw request.
    fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (base, handle)
    }

    fn gateway(base: &str) -> HttpGateway {
        HttpGateway::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_sign_in_token_from_header() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nAuthorization: tok-1\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let token = gateway(&base).authenticate("alice", "v").unwrap();
        assert_eq!(token.as_str(), "tok-1");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/v1/sign_in"));
        assert!(request.contains(r#""login":"alice""#));
        assert!(request.contains(r#""password":"v""#));
    }

    #[test]
    fn test_sign_up_token_from_body() {
        let body = r#"{"token":"tok-2"}"#;
        let response: &'static str = Box::leak(
            format!(
                "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_boxed_str(),
        );
        let (base, _server) = serve_once(response);
        let token = gateway(&base).register("alice", "v").unwrap();
        assert_eq!(token.as_str(), "tok-2");
    }

    #[test]
    fn test_sign_in_not_found_is_unknown_user() {
        let (base, _server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let err = gateway(&base).authenticate("ghost", "v").unwrap_err();
        assert!(matches!(err, GatewayError::UnknownUser));
    }

    #[test]
    fn test_sign_up_conflict_is_rejected() {
        let (base, _server) = serve_once(
            "HTTP/1.1 409 Conflict\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let err = gateway(&base).register("alice", "v").unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
    }

    #[test]
    fn test_sync_sends_token_and_parses_payload() {
        let body = r#"{"logins":[{"name":"bank","login":"alice","password":"p1","owner":5,"deleted":false,"updated":"1970-01-01T00:01:40Z"}],"cards":[],"texts":[],"binaries":[]}"#;
        let response: &'static str = Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_boxed_str(),
        );
        let (base, server) = serve_once(response);

        let returned = gateway(&base)
            .sync(&Token::new("tok-3"), &SyncPayload::default())
            .unwrap();
        assert_eq!(returned.logins.len(), 1);
        assert_eq!(returned.logins[0].payload.secret, "p1");

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /api/v1/sync"));
        assert!(request.contains("authorization: tok-3"));
    }

    #[test]
    fn test_sync_unauthorized() {
        let (base, _server) = serve_once(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let err = gateway(&base)
            .sync(&Token::new("stale"), &SyncPayload::default())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = gateway(&format!("http://127.0.0.1:{port}"))
            .authenticate("alice", "v")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
