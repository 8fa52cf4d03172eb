//! `src/backends/mod.rs`
//!
//! # Storage backends
//!
//! One [`StorageBackend`] implementation per backend kind. The front door
//! picks the implementation once, when it is built from a
//! [`StorageRoot`](crate::model::storage_root::StorageRoot), and never
//! re-checks the kind afterwards.

pub mod auth_proxy;
pub mod generic_http;
pub mod github;
pub mod local_handle;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::cache_manager::DirectoryCache,
    config::AuthConfig,
    error::VfsResult,
    fs::dir_entry::DirectoryEntry,
    model::storage_root::{BackendKind, BackendSpec, StorageRoot},
    net::http::HttpClient,
};

use self::{
    auth_proxy::AuthProxyBackend, generic_http::GenericHttpBackend, github::GithubBackend,
    local_handle::LocalHandleBackend,
};

/// Decoded file body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    Text(String),
    Binary(Bytes),
}

/// Result of a backend file read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub body: FileBody,
}

impl FileContent {
    pub fn text_body<P: Into<String>>(path: P, text: String) -> Self {
        Self {
            path: path.into(),
            body: FileBody::Text(text),
        }
    }

    pub fn binary<P: Into<String>>(path: P, bytes: Bytes) -> Self {
        Self {
            path: path.into(),
            body: FileBody::Binary(bytes),
        }
    }

    /// Content as UTF-8 text.
    pub fn text(&self) -> VfsResult<String> {
        match &self.body {
            FileBody::Text(t) => Ok(t.clone()),
            FileBody::Binary(b) => Ok(String::from_utf8(b.to_vec())?),
        }
    }

    /// Content parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> VfsResult<T> {
        match &self.body {
            FileBody::Text(t) => Ok(serde_json::from_str(t)?),
            FileBody::Binary(b) => Ok(serde_json::from_slice(b)?),
        }
    }

    /// Content as raw bytes.
    #[must_use]
    pub fn blob(&self) -> Bytes {
        match &self.body {
            FileBody::Text(t) => Bytes::copy_from_slice(t.as_bytes()),
            FileBody::Binary(b) => b.clone(),
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self.body {
            FileBody::Text(t) => Bytes::from(t),
            FileBody::Binary(b) => b,
        }
    }

    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self.body, FileBody::Binary(_))
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Immediate children of the directory at `path` (normalized, trailing
    /// `/`). Sorting is the caller's job.
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry>;

    /// Read the file at `path`.
    async fn read_file(&self, path: &str) -> VfsResult<FileContent>;
}

/// Shared collaborators handed to every backend at construction.
#[derive(Clone)]
pub struct BackendContext {
    pub http: Arc<dyn HttpClient>,
    pub cache: DirectoryCache,
    pub cancel: CancellationToken,
    pub token_timeout: Duration,
    pub permission_timeout: Duration,
}

impl BackendContext {
    pub fn new(http: Arc<dyn HttpClient>, cache: DirectoryCache, auth: &AuthConfig) -> Self {
        Self {
            http,
            cache,
            cancel: CancellationToken::new(),
            token_timeout: auth.token_timeout,
            permission_timeout: auth.permission_timeout,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendContext")
            .field("cache", &self.cache)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("token_timeout", &self.token_timeout)
            .field("permission_timeout", &self.permission_timeout)
            .finish_non_exhaustive()
    }
}

/// Select the backend for `root`.
///
/// Arms follow dispatch precedence: local handle, GitHub, authenticated
/// proxy, then plain HTTP.
pub fn build_backend(root: &StorageRoot, ctx: BackendContext) -> Arc<dyn StorageBackend> {
    match root.spec() {
        BackendSpec::LocalHandle { folder, prompt } => Arc::new(LocalHandleBackend::new(
            root.slug(),
            folder.clone(),
            prompt.clone(),
            ctx,
        )),
        BackendSpec::Github { token, api_base } => {
            Arc::new(GithubBackend::new(api_base, token.clone(), ctx))
        }
        BackendSpec::AuthenticatedProxy { tokens } => Arc::new(AuthProxyBackend::new(
            root.base_url(),
            tokens.clone(),
            ctx,
        )),
        BackendSpec::GenericHttp => Arc::new(GenericHttpBackend::new(root.base_url(), ctx)),
    }
}
