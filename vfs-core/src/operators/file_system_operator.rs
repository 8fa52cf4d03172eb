//! `src/operators/file_system_operator.rs`
//!
//! # Front door
//!
//! `FileSystemOperator` is the single entry point for one storage root.
//! The backend is chosen once, at construction; every call after that goes
//! straight to it. Listings are normalized, cached per `(slug, path)` in the
//! shared [`DirectoryCache`] and natural-sorted before they are returned.
//!
//! Caller -> `FileSystemOperator` -> backend -> (gzip unwrap for JSON) -> caller

use std::{pin::Pin, sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, stream};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    backends::{BackendContext, FileContent, StorageBackend, build_backend},
    cache::cache_manager::{CacheStatsSnapshot, DirectoryCache, ListingKey},
    config::AuthConfig,
    error::{VfsError, VfsResult},
    fs::{decompress::gunzip_all, dir_entry::DirectoryEntry, paths},
    model::storage_root::StorageRoot,
    net::http::HttpClient,
    operators::config_discovery::{self, ListDirectory, YamlConfigSet},
};

/// Size of the chunks yielded by [`FileSystemOperator::open_file_as_stream`].
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// File contents as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = VfsResult<Bytes>> + Send>>;

pub struct FileSystemOperator {
    root: StorageRoot,
    backend: Arc<dyn StorageBackend>,
    cache: DirectoryCache,
    cancel_token: CancellationToken,
}

impl FileSystemOperator {
    #[instrument(
        name = "file_operator_new",
        level = "debug",
        skip_all,
        fields(root = %root.slug(), backend = %root.kind())
    )]
    pub fn new(
        root: StorageRoot,
        http: Arc<dyn HttpClient>,
        cache: DirectoryCache,
        auth: &AuthConfig,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let ctx = BackendContext::new(http, cache.clone(), auth).with_cancel(cancel_token.clone());
        let backend = build_backend(&root, ctx);

        debug!(marker = "OPERATOR_CREATED", "Created file system operator");

        Self {
            root,
            backend,
            cache,
            cancel_token,
        }
    }

    /// Operator over an already-built backend.
    pub fn with_backend(
        root: StorageRoot,
        backend: Arc<dyn StorageBackend>,
        cache: DirectoryCache,
    ) -> Self {
        Self {
            root,
            backend,
            cache,
            cancel_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Abort every pending suspension point of this operator.
    pub fn cancel(&self) {
        warn!(root = %self.root.slug(), "Cancelling pending operations");
        self.cancel_token.cancel();
    }

    #[instrument(skip(self), fields(root = %self.root.slug()))]
    async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        if self.cancel_token.is_cancelled() {
            return Err(VfsError::Cancelled);
        }
        self.backend.read_file(path).await
    }

    pub async fn read_file_as_text(&self, path: &str) -> VfsResult<String> {
        self.read_file(path).await?.text()
    }

    pub async fn read_file_as_binary(&self, path: &str) -> VfsResult<Bytes> {
        Ok(self.read_file(path).await?.into_bytes())
    }

    pub async fn read_file_as_json(&self, path: &str) -> VfsResult<serde_json::Value> {
        self.read_file_as_json_typed(path).await
    }

    /// Read, unwrap any gzip layers, decode UTF-8 and parse JSON.
    pub async fn read_file_as_json_typed<T: DeserializeOwned>(&self, path: &str) -> VfsResult<T> {
        let raw = self.read_file(path).await?.into_bytes();
        let inflated = gunzip_all(raw)?;
        let text = String::from_utf8(inflated.to_vec())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// File contents as a stream of [`STREAM_CHUNK_SIZE`] chunks. Errors
    /// reading the file are returned here, not through the stream.
    pub async fn open_file_as_stream(&self, path: &str) -> VfsResult<ByteStream> {
        let bytes = self.read_file(path).await?.into_bytes();
        let len = bytes.len();
        let chunks = (0..len)
            .step_by(STREAM_CHUNK_SIZE)
            .map(move |start| Ok::<_, VfsError>(bytes.slice(start..len.min(start + STREAM_CHUNK_SIZE))));
        Ok(Box::pin(stream::iter(chunks)))
    }

    /// Sorted listing of the directory at `path`, from cache when present.
    #[instrument(
        name = "list_directory",
        level = "info",
        skip(self),
        fields(root = %self.root.slug(), operation_type = "list_directory")
    )]
    pub async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        let normalized = paths::normalize_dir_path(path);
        let key = ListingKey::new(self.root.slug(), &normalized);
        let start = Instant::now();

        if self.cancel_token.is_cancelled() {
            return Err(VfsError::Cancelled);
        }

        let backend = Arc::clone(&self.backend);
        let target = normalized.clone();
        let result = self
            .cache
            .get_or_load(key, move || async move {
                let mut entry = backend.list_directory(&target).await?;
                entry.sort();
                Ok(entry)
            })
            .await;

        match result {
            Ok(entry) => {
                debug!(
                    path = %normalized,
                    dirs = entry.dirs.len(),
                    files = entry.files.len(),
                    duration_ms = start.elapsed().as_millis(),
                    "Listed directory"
                );
                Ok(entry)
            }
            Err(source) => Err(VfsError::listing(normalized, source)),
        }
    }

    /// Drop every cached listing of this root.
    pub fn invalidate_cache(&self) {
        info!(
            marker = "CACHE_INVALIDATE",
            root = %self.root.slug(),
            "Invalidating root listings"
        );
        self.cache.invalidate_root(self.root.slug());
    }

    /// Resolve `raw` against the root's base URL. Best-effort cleanup of odd
    /// leading characters, not an access check.
    pub fn sanitize_path(&self, raw: &str) -> VfsResult<Url> {
        paths::sanitize_path(self.root.base_url(), raw)
    }

    /// Path of the one file in `folder` matching the glob `pattern`.
    pub async fn find_matching_file(&self, folder: &str, pattern: &str) -> VfsResult<String> {
        config_discovery::find_matching_file(self, folder, pattern).await
    }

    pub async fn find_all_yaml_files(&self, folder: &str) -> VfsResult<YamlConfigSet> {
        config_discovery::find_all_yaml_files(self, folder).await
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }
}

#[async_trait]
impl ListDirectory for FileSystemOperator {
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        Self::list_directory(self, path).await
    }
}

impl std::fmt::Debug for FileSystemOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemOperator")
            .field("root", &self.root)
            .field("backend", &self.backend.kind())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}
