//! `src/net/http.rs`
//!
//! # HTTP transport
//!
//! Backends talk to servers through the [`HttpClient`] trait so the front door
//! never depends on a concrete client. [`UreqClient`] is the production
//! implementation; its blocking calls run on tokio's blocking pool.
//!
//! Non-success statuses are not folded into a generic error: the whole
//! [`HttpResponse`] is returned inside [`VfsError::Http`] so callers can look
//! at the status code and body.

use std::{io::Read, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{VfsError, VfsResult};

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: Bytes,
}

impl HttpResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Pass the response through when successful, otherwise surface it as
    /// a transport error.
    pub fn error_for_status(self) -> VfsResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(VfsError::Http(Box::new(self)))
        }
    }
}

/// Request headers as `(name, value)` pairs.
pub type Headers = Vec<(&'static str, String)>;

/// Builds the `Authorization` header for a bearer token.
#[must_use]
pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET. Any status is returned as `Ok`; only failures that never
    /// produced a response are errors.
    async fn get(&self, url: &Url, headers: &Headers) -> VfsResult<HttpResponse>;
}

/// Blocking `ureq` agent driven from async code via `spawn_blocking`.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    #[must_use]
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self { agent }
    }
}

impl std::fmt::Debug for UreqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqClient").finish_non_exhaustive()
    }
}

fn read_response(resp: ureq::Response, url: &str) -> VfsResult<HttpResponse> {
    let status = resp.status();
    let final_url = resp.get_url().to_string();
    let mut body = Vec::new();
    resp.into_reader()
        .read_to_end(&mut body)
        .map_err(|e| VfsError::network(url, e.to_string()))?;

    Ok(HttpResponse {
        status,
        url: final_url,
        body: Bytes::from(body),
    })
}

#[async_trait]
impl HttpClient for UreqClient {
    #[instrument(skip(self, headers), fields(url = %url))]
    async fn get(&self, url: &Url, headers: &Headers) -> VfsResult<HttpResponse> {
        let agent = self.agent.clone();
        let url_str = url.to_string();
        let headers = headers.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut req = agent.get(&url_str);
            for (name, value) in &headers {
                req = req.set(name, value);
            }

            match req.call() {
                Ok(resp) => read_response(resp, &url_str),
                Err(ureq::Error::Status(_, resp)) => read_response(resp, &url_str),
                Err(ureq::Error::Transport(t)) => Err(VfsError::network(&url_str, t.to_string())),
            }
        })
        .await
        .map_err(|e| VfsError::Other(format!("HTTP worker failed: {e}")))?;

        if let Ok(resp) = &result {
            debug!(
                marker = "HTTP_REQUEST",
                operation_type = "http_get",
                status = resp.status,
                bytes = resp.body.len(),
                "GET completed"
            );
        }

        result
    }
}
