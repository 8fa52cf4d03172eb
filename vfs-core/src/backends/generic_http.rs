//! `src/backends/generic_http.rs`
//!
//! Plain HTTP(S) file server with auto-generated directory listings.

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{BackendContext, FileContent, StorageBackend};
use crate::{
    error::VfsResult,
    fs::{dir_entry::DirectoryEntry, listing::parse_listing, paths::sanitize_path},
    model::storage_root::BackendKind,
    net::http::HttpResponse,
    util::suspend::guarded,
};

pub struct GenericHttpBackend {
    base_url: String,
    ctx: BackendContext,
}

impl GenericHttpBackend {
    pub fn new(base_url: &str, ctx: BackendContext) -> Self {
        Self {
            base_url: base_url.to_string(),
            ctx,
        }
    }

    async fn get(&self, url: &Url) -> VfsResult<HttpResponse> {
        guarded(
            "http request",
            &self.ctx.cancel,
            None,
            self.ctx.http.get(url, &Vec::new()),
        )
        .await?
        .error_for_status()
    }
}

#[async_trait]
impl StorageBackend for GenericHttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GenericHttp
    }

    #[instrument(skip(self), fields(backend = "generic-http"))]
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        let url = sanitize_path(&self.base_url, path)?;
        let resp = self.get(&url).await?;
        let entry = parse_listing(&resp.text_lossy());

        if entry.is_empty() {
            debug!(%url, "Listing parsed to nothing");
        }
        Ok(entry)
    }

    #[instrument(skip(self), fields(backend = "generic-http"))]
    async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        let url = sanitize_path(&self.base_url, path)?;
        let resp = self.get(&url).await?;
        Ok(FileContent::binary(path, resp.body))
    }
}
