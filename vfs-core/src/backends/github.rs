//! `src/backends/github.rs`
//!
//! # GitHub backend
//!
//! Reads repositories through the REST contents API. Paths look like
//! `owner/repo/in/repo/path`. The token is injected by the caller; none is
//! ever compiled into the binary.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BackendContext, FileContent, StorageBackend};
use crate::{
    error::{VfsError, VfsResult},
    fs::{dir_entry::DirectoryEntry, paths},
    model::storage_root::BackendKind,
    net::http::{Headers, bearer},
    util::suspend::guarded,
};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Extensions kept as raw bytes. The API reports no content type, so
/// everything else is decoded as UTF-8 text.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "avro", "dbf", "gpkg", "gz", "h5", "jpg", "jpeg", "omx", "png", "shp", "shx", "sqlite", "zip",
    "zst",
];

#[must_use]
pub fn is_binary_path(path: &str) -> bool {
    paths::extension(path).is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// `owner`, `repo` and the in-repo remainder of a path.
struct RepoPath {
    owner: String,
    repo: String,
    rest: Vec<String>,
}

impl RepoPath {
    fn parse(path: &str) -> Option<Self> {
        let mut parts = paths::segments(path).into_iter();
        let owner = parts.next()?;
        let repo = parts.next()?;
        Some(Self {
            owner,
            repo,
            rest: parts.collect(),
        })
    }
}

pub struct GithubBackend {
    api_base: String,
    token: Option<String>,
    ctx: BackendContext,
}

impl GithubBackend {
    pub fn new(api_base: &str, token: Option<String>, ctx: BackendContext) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            ctx,
        }
    }

    fn api_url(&self, repo: &RepoPath, tail: &[&str], rest: &[String]) -> VfsResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| VfsError::InvalidPath(format!("{}: {e}", self.api_base)))?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|()| VfsError::InvalidPath(self.api_base.clone()))?;
            segs.pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.repo.as_str()])
                .extend(tail)
                .extend(rest);
        }
        Ok(url)
    }

    fn headers(&self) -> Headers {
        let mut headers: Headers = vec![("Accept", "application/vnd.github+json".to_string())];
        if let Some(token) = &self.token {
            headers.push(bearer(token));
        }
        headers
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &Url) -> VfsResult<T> {
        let resp = guarded(
            "github request",
            &self.ctx.cancel,
            None,
            self.ctx.http.get(url, &self.headers()),
        )
        .await?
        .error_for_status()?;

        Ok(serde_json::from_slice(&resp.body)?)
    }
}

fn decode_content(content: &str, encoding: Option<&str>) -> VfsResult<Bytes> {
    if encoding == Some("base64") {
        let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        Ok(Bytes::from(BASE64_STANDARD.decode(compact)?))
    } else {
        Ok(Bytes::copy_from_slice(content.as_bytes()))
    }
}

#[async_trait]
impl StorageBackend for GithubBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Github
    }

    #[instrument(skip(self), fields(backend = "github"))]
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        let Some(repo) = RepoPath::parse(path) else {
            debug!(path, "Path has no owner/repo, returning empty listing");
            return Ok(DirectoryEntry::default());
        };

        let url = self.api_url(&repo, &["contents"], &repo.rest)?;
        let items: Vec<ContentsItem> = self.get_json(&url).await?;

        let (dirs, files): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.kind == "dir");

        Ok(DirectoryEntry::new(
            dirs.into_iter().map(|i| i.name),
            files.into_iter().map(|i| i.name),
        ))
    }

    #[instrument(skip(self), fields(backend = "github"))]
    async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        let repo = RepoPath::parse(path)
            .filter(|r| !r.rest.is_empty())
            .ok_or_else(|| VfsError::InvalidPath(format!("{path}: expected owner/repo/file")))?;

        let url = self.api_url(&repo, &["contents"], &repo.rest)?;
        let file: ContentsFile = self.get_json(&url).await?;

        let inline = file.encoding.as_deref() == Some("base64") && !file.content.is_empty();
        let bytes = if inline {
            decode_content(&file.content, file.encoding.as_deref())?
        } else if let Some(sha) = &file.sha {
            debug!(path, sha = %sha, "Large file, fetching blob");
            let blob_url = self.api_url(&repo, &["git", "blobs", sha.as_str()], &[])?;
            let blob: ContentsFile = self.get_json(&blob_url).await?;
            decode_content(&blob.content, blob.encoding.as_deref())?
        } else {
            decode_content(&file.content, file.encoding.as_deref())?
        };

        if is_binary_path(path) {
            return Ok(FileContent::binary(path, bytes));
        }
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Ok(FileContent::text_body(path, text)),
            Err(_) => {
                debug!(path, "Not UTF-8, keeping raw bytes");
                Ok(FileContent::binary(path, bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::cache_manager::DirectoryCache, config::AuthConfig, net::http::mock::MockHttp};
    use std::sync::Arc;

    fn backend(http: &MockHttp) -> GithubBackend {
        let ctx = BackendContext::new(Arc::new(http.clone()), DirectoryCache::new(), &AuthConfig::default());
        GithubBackend::new(DEFAULT_API_BASE, Some("t0ken".into()), ctx)
    }

    fn encoded(data: &[u8]) -> String {
        // The API wraps base64 at 60 columns.
        let raw = BASE64_STANDARD.encode(data);
        raw.as_bytes()
            .chunks(60)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn png_stays_binary_csv_becomes_text() {
        let http = MockHttp::new();
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff];
        http.route(
            "https://api.github.com/repos/sim/data/contents/img/logo.png",
            200,
            serde_json::json!({"encoding": "base64", "content": encoded(&png), "sha": "1"}).to_string(),
        );
        http.route(
            "https://api.github.com/repos/sim/data/contents/tables/trips.csv",
            200,
            serde_json::json!({"encoding": "base64", "content": encoded(b"id,mode\n1,car\n"), "sha": "2"})
                .to_string(),
        );

        let b = backend(&http);
        let logo = b.read_file("sim/data/img/logo.png").await.unwrap();
        assert!(logo.is_binary());
        assert_eq!(&logo.blob()[..], &png[..]);

        let trips = b.read_file("/sim/data/tables/trips.csv").await.unwrap();
        assert!(!trips.is_binary());
        assert_eq!(trips.text().unwrap(), "id,mode\n1,car\n");

        let auth = http.requests()[0]
            .headers
            .iter()
            .any(|(k, v)| *k == "Authorization" && v == "Bearer t0ken");
        assert!(auth);
    }

    #[tokio::test]
    async fn unlisted_non_utf8_extension_reads_as_bytes() {
        let http = MockHttp::new();
        let gif = b"GIF89a\xff\x00\x80";
        http.route(
            "https://api.github.com/repos/sim/data/contents/logo.gif",
            200,
            serde_json::json!({"encoding": "base64", "content": encoded(gif), "sha": "9"}).to_string(),
        );

        let logo = backend(&http).read_file("sim/data/logo.gif").await.unwrap();
        assert!(logo.is_binary());
        assert_eq!(&logo.blob()[..], &gif[..]);
    }

    #[tokio::test]
    async fn large_file_is_fetched_by_blob_sha() {
        let http = MockHttp::new();
        http.route(
            "https://api.github.com/repos/sim/data/contents/big.json",
            200,
            serde_json::json!({"encoding": "none", "content": "", "sha": "abc123"}).to_string(),
        );
        http.route(
            "https://api.github.com/repos/sim/data/git/blobs/abc123",
            200,
            serde_json::json!({"encoding": "base64", "content": encoded(br#"{"n": 42}"#)}).to_string(),
        );

        let content = backend(&http).read_file("sim/data/big.json").await.unwrap();
        let v: serde_json::Value = content.json().unwrap();
        assert_eq!(v["n"], 42);
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn listing_classifies_by_type_field() {
        let http = MockHttp::new();
        http.route(
            "https://api.github.com/repos/sim/data/contents/runs",
            200,
            serde_json::json!([
                {"name": "run10", "type": "dir"},
                {"name": "README.md", "type": "file"},
                {"name": "run2", "type": "dir"},
                {"name": "link", "type": "symlink"}
            ])
            .to_string(),
        );

        let entry = backend(&http).list_directory("/sim/data/runs/").await.unwrap();
        assert_eq!(entry.dirs, vec!["run2".to_string(), "run10".to_string()]);
        assert_eq!(entry.files, vec!["link".to_string(), "README.md".to_string()]);
    }

    #[tokio::test]
    async fn short_paths_make_no_request() {
        let http = MockHttp::new();
        let b = backend(&http);

        assert!(b.list_directory("/sim/").await.unwrap().is_empty());
        assert!(b.list_directory("/").await.unwrap().is_empty());
        assert!(matches!(
            b.read_file("sim/data").await.unwrap_err(),
            VfsError::InvalidPath(_)
        ));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn api_errors_surface_the_response() {
        let http = MockHttp::new();
        let err = backend(&http).read_file("sim/data/missing.txt").await.unwrap_err();
        assert_eq!(err.http_status(), Some(404));
    }

    #[test]
    fn binary_extension_match_is_case_insensitive() {
        assert!(is_binary_path("a/b/PHOTO.JPG"));
        assert!(is_binary_path("net.sqlite"));
        assert!(!is_binary_path("events.xml"));
        assert!(!is_binary_path("noext"));
    }
}
