//! `src/backends/local_handle.rs`
//!
//! # Local-handle backend
//!
//! Works over a folder capability granted by the host (a folder picker, or a
//! plain directory on disk via [`DiskFolder`]). The capability cannot resolve
//! multi-segment paths, so every listing walks from the root handle one
//! child lookup at a time.

use std::{collections::HashMap, fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs as TokioFs;
use tracing::{debug, info, instrument, warn};

use super::{BackendContext, FileContent, StorageBackend};
use crate::{
    cache::cache_manager::ListingKey,
    error::{VfsError, VfsResult},
    fs::{
        dir_entry::DirectoryEntry,
        paths::{remove_dot_dot_pairs, segments, split_parent},
    },
    model::storage_root::BackendKind,
    util::suspend::guarded,
};

/// Host answer to a read-permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// A directory capability.
#[async_trait]
pub trait FolderHandle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Immediate children as `(name, handle)` pairs.
    async fn children(&self) -> VfsResult<Vec<(String, NativeHandle)>>;

    async fn query_permission(&self) -> PermissionState;
}

/// A file capability.
#[async_trait]
pub trait FileHandle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn read(&self) -> VfsResult<Bytes>;
}

/// Interactive grant callback: asks the user and resolves to their decision.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn request_permission(&self, folder: &str) -> PermissionState;
}

#[derive(Debug, Clone)]
pub enum NativeHandle {
    Folder(Arc<dyn FolderHandle>),
    File(Arc<dyn FileHandle>),
}

impl NativeHandle {
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

pub struct LocalHandleBackend {
    slug: Arc<str>,
    root: Arc<dyn FolderHandle>,
    prompt: Option<Arc<dyn PermissionPrompt>>,
    ctx: BackendContext,
}

impl LocalHandleBackend {
    pub fn new(
        slug: &str,
        root: Arc<dyn FolderHandle>,
        prompt: Option<Arc<dyn PermissionPrompt>>,
        ctx: BackendContext,
    ) -> Self {
        Self {
            slug: Arc::from(slug),
            root,
            prompt,
            ctx,
        }
    }

    /// Blocks until read permission is settled.
    ///
    /// Without a prompt configured, an ungranted handle is used anyway and
    /// the read itself reports the failure.
    async fn ensure_permission(&self) -> VfsResult<()> {
        if self.root.query_permission().await == PermissionState::Granted {
            return Ok(());
        }

        let Some(prompt) = &self.prompt else {
            debug!(folder = self.root.name(), "No permission prompt configured, proceeding");
            return Ok(());
        };

        info!(
            marker = "LOCAL_HANDLE",
            operation_type = "permission_prompt",
            folder = self.root.name(),
            "Waiting for folder permission decision"
        );

        let decision = guarded(
            "permission prompt",
            &self.ctx.cancel,
            Some(self.ctx.permission_timeout),
            async { Ok(prompt.request_permission(self.root.name()).await) },
        )
        .await?;

        match decision {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied | PermissionState::Prompt => {
                warn!(folder = self.root.name(), "Folder permission not granted");
                Err(VfsError::PermissionDenied(self.root.name().to_string()))
            }
        }
    }

    /// Walks from the root handle to the folder named by `path`.
    async fn resolve_folder(&self, path: &str) -> VfsResult<Arc<dyn FolderHandle>> {
        let parts = remove_dot_dot_pairs(segments(path));
        let mut current = self.root.clone();

        for part in &parts {
            let children = current.children().await?;
            let next = children.into_iter().find_map(|(name, handle)| match handle {
                NativeHandle::Folder(f) if name == *part => Some(f),
                _ => None,
            });

            current = next.ok_or_else(|| VfsError::FolderNotFound(part.clone()))?;
        }

        Ok(current)
    }

    /// Lists `path` without the permission gate.
    async fn scan(&self, path: &str) -> VfsResult<DirectoryEntry> {
        let folder = self.resolve_folder(path).await?;
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut handles = HashMap::new();

        for (name, handle) in folder.children().await? {
            if handle.is_folder() {
                dirs.push(name.clone());
            } else {
                files.push(name.clone());
            }
            handles.insert(name, handle);
        }

        Ok(DirectoryEntry::new(dirs, files).with_handles(handles))
    }
}

#[async_trait]
impl StorageBackend for LocalHandleBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalHandle
    }

    #[instrument(skip(self), fields(backend = "local-handle"))]
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        self.ensure_permission().await?;
        self.scan(path).await
    }

    #[instrument(skip(self), fields(backend = "local-handle"))]
    async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        self.ensure_permission().await?;

        let (parent, name) = split_parent(path)?;
        let key = ListingKey::new(&self.slug, &parent);

        let listing = match self.ctx.cache.get(&key).await {
            Some(entry) => entry,
            None => {
                let entry = self.scan(&parent).await?;
                self.ctx.cache.insert(key, entry.clone()).await;
                entry
            }
        };

        match listing.handle(&name) {
            Some(NativeHandle::File(file)) => {
                let bytes = file.read().await?;
                Ok(FileContent::binary(path, bytes))
            }
            _ => Err(VfsError::FileMissing(name)),
        }
    }
}

/// A [`FolderHandle`] over a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskFolder {
    path: PathBuf,
    name: String,
}

impl DiskFolder {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

#[async_trait]
impl FolderHandle for DiskFolder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn children(&self) -> VfsResult<Vec<(String, NativeHandle)>> {
        let mut out = Vec::new();
        let mut read_dir = TokioFs::read_dir(&self.path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            // Follows symlinks; dangling ones are skipped.
            let meta = match TokioFs::metadata(&entry_path).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping {:?}: {}", entry_path, e);
                    continue;
                }
            };

            let handle = if meta.is_dir() {
                NativeHandle::Folder(Arc::new(Self::new(entry_path)))
            } else {
                NativeHandle::File(Arc::new(DiskFile {
                    path: entry_path,
                    name: name.clone(),
                }))
            };
            out.push((name, handle));
        }

        Ok(out)
    }

    async fn query_permission(&self) -> PermissionState {
        match TokioFs::metadata(&self.path).await {
            Ok(_) => PermissionState::Granted,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionState::Denied,
            Err(_) => PermissionState::Prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
}

#[async_trait]
impl FileHandle for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> VfsResult<Bytes> {
        Ok(Bytes::from(TokioFs::read(&self.path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::cache_manager::DirectoryCache, config::AuthConfig, net::http::mock::MockHttp};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tempfile::TempDir;

    async fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        TokioFs::create_dir_all(root.join("runs/run10")).await.unwrap();
        TokioFs::create_dir_all(root.join("runs/run2")).await.unwrap();
        TokioFs::write(root.join("runs/summary.csv"), "a,b\n1,2\n").await.unwrap();
        TokioFs::write(root.join("runs/run2/events.txt"), "e").await.unwrap();
        dir
    }

    fn ctx() -> BackendContext {
        BackendContext::new(Arc::new(MockHttp::new()), DirectoryCache::new(), &AuthConfig::default())
    }

    fn backend(dir: &TempDir) -> LocalHandleBackend {
        let folder = Arc::new(DiskFolder::new(dir.path().to_path_buf()));
        LocalHandleBackend::new("local", folder, None, ctx())
    }

    #[tokio::test]
    async fn lists_children_with_handles() {
        let dir = sample_tree().await;
        let entry = backend(&dir).list_directory("/runs/").await.unwrap();

        assert_eq!(entry.dirs, vec!["run2".to_string(), "run10".to_string()]);
        assert_eq!(entry.files, vec!["summary.csv".to_string()]);
        assert!(entry.handle("run2").unwrap().is_folder());
        assert!(!entry.handle("summary.csv").unwrap().is_folder());
    }

    #[tokio::test]
    async fn dot_dot_pairs_are_removed_before_walking() {
        let dir = sample_tree().await;
        let entry = backend(&dir)
            .list_directory("/runs/run10/../run2/")
            .await
            .unwrap();
        assert_eq!(entry.files, vec!["events.txt".to_string()]);
    }

    #[tokio::test]
    async fn missing_segment_is_named() {
        let dir = sample_tree().await;
        let err = backend(&dir).list_directory("/runs/nope/").await.unwrap_err();
        match err {
            VfsError::FolderNotFound(seg) => assert_eq!(seg, "nope"),
            other => panic!("expected FolderNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_file_through_parent_listing() {
        let dir = sample_tree().await;
        let b = backend(&dir);

        let content = b.read_file("/runs/summary.csv").await.unwrap();
        assert_eq!(content.text().unwrap(), "a,b\n1,2\n");

        let err = b.read_file("/runs/absent.csv").await.unwrap_err();
        assert!(matches!(err, VfsError::FileMissing(ref n) if n == "absent.csv"));

        // a folder is not a file
        let err = b.read_file("/runs/run2").await.unwrap_err();
        assert!(matches!(err, VfsError::FileMissing(_)));
    }

    #[derive(Debug)]
    struct UngrantedFolder;

    #[async_trait]
    impl FolderHandle for UngrantedFolder {
        fn name(&self) -> &str {
            "picked"
        }

        async fn children(&self) -> VfsResult<Vec<(String, NativeHandle)>> {
            Ok(Vec::new())
        }

        async fn query_permission(&self) -> PermissionState {
            PermissionState::Prompt
        }
    }

    struct CountingPrompt {
        answer: PermissionState,
        asked: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl PermissionPrompt for CountingPrompt {
        async fn request_permission(&self, _folder: &str) -> PermissionState {
            self.asked.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer
        }
    }

    fn prompted(answer: PermissionState, delay: Duration) -> (LocalHandleBackend, Arc<CountingPrompt>) {
        let prompt = Arc::new(CountingPrompt {
            answer,
            asked: AtomicUsize::new(0),
            delay,
        });
        let mut c = ctx();
        c.permission_timeout = Duration::from_millis(50);
        let b = LocalHandleBackend::new("picked", Arc::new(UngrantedFolder), Some(prompt.clone()), c);
        (b, prompt)
    }

    #[tokio::test]
    async fn prompt_grant_allows_listing() {
        let (b, prompt) = prompted(PermissionState::Granted, Duration::ZERO);
        assert!(b.list_directory("/").await.unwrap().is_empty());
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prompt_denial_is_an_error() {
        let (b, _) = prompted(PermissionState::Denied, Duration::ZERO);
        let err = b.list_directory("/").await.unwrap_err();
        assert!(matches!(err, VfsError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn unanswered_prompt_times_out() {
        let (b, _) = prompted(PermissionState::Granted, Duration::from_secs(10));
        let err = b.list_directory("/").await.unwrap_err();
        assert!(matches!(err, VfsError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cached_parent_still_asks_before_reading() {
        let (b, prompt) = prompted(PermissionState::Denied, Duration::ZERO);
        b.ctx
            .cache
            .insert(ListingKey::new("picked", "/"), DirectoryEntry::default())
            .await;

        let err = b.read_file("/notes.txt").await.unwrap_err();
        assert!(matches!(err, VfsError::PermissionDenied(_)));
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_on_cache_miss_asks_once() {
        let (b, prompt) = prompted(PermissionState::Granted, Duration::ZERO);
        let err = b.read_file("/notes.txt").await.unwrap_err();
        assert!(matches!(err, VfsError::FileMissing(_)));
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_prompt_proceeds_optimistically() {
        let b = LocalHandleBackend::new("picked", Arc::new(UngrantedFolder), None, ctx());
        assert!(b.list_directory("/").await.is_ok());
    }
}
