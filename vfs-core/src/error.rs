//! src/error.rs
//! ============================================================================
//! # `VfsError`: Unified Error Type for Storage Access
//!
//! Every backend, the listing cache and the front door return
//! `Result<T, VfsError>`. Variants follow the failure classes callers branch
//! on: not-found, authentication, transport, parse and ambiguous-match.
//! Nothing in this crate retries; errors travel unchanged to the caller.

use std::{io, string::FromUtf8Error, sync::Arc, time::Duration};

use thiserror::Error;

use crate::net::http::HttpResponse;

pub type VfsResult<T> = Result<T, VfsError>;

/// Unified error type for all storage operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A path segment could not be resolved while walking a folder handle.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// The resolved directory has no file with this name.
    #[error("File missing: {0}")]
    FileMissing(String),

    /// A wildcard expression matched nothing in the folder.
    #[error("No file in {folder} matches {pattern}")]
    NoMatch { folder: String, pattern: String },

    /// A wildcard expression matched more than one file.
    #[error("{pattern} matches more than one file in {folder}: {}", .candidates.join(", "))]
    AmbiguousMatch {
        folder: String,
        pattern: String,
        candidates: Vec<String>,
    },

    /// Token exchange failed or returned an incomplete credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-success HTTP status. Carries the full response so callers can
    /// inspect status code and body.
    #[error("HTTP {} from {}", .0.status, .0.url)]
    Http(Box<HttpResponse>),

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Network error on {url}: {reason}")]
    Network { url: String, reason: String },

    /// Directory listing failed; wraps the backend cause.
    #[error("Could not list directory {path}: {source}")]
    Listing {
        path: String,
        #[source]
        source: Arc<VfsError>,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Read permission denied for {0}")]
    PermissionDenied(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Unexpected error: {0}")]
    Other(String),
}

impl VfsError {
    /// Wrap a backend failure for the directory at `path`.
    pub fn listing<P: Into<String>>(path: P, source: Arc<Self>) -> Self {
        Self::Listing {
            path: path.into(),
            source,
        }
    }

    pub fn network<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Status code when this is a transport error with a response.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http(resp) => Some(resp.status),
            Self::Listing { source, .. } => source.http_status(),
            _ => None,
        }
    }

    /// True for the not-found family, including a 404 from a server.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FolderNotFound(_) | Self::FileMissing(_) | Self::NoMatch { .. } => true,
            Self::Http(resp) => resp.status == 404,
            Self::Listing { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
