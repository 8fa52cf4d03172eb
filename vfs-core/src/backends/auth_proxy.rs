//! `src/backends/auth_proxy.rs`
//!
//! # Authenticated-proxy backend
//!
//! An object-storage bucket sitting behind a proxy that wants a bearer
//! token. The token comes from a [`TokenProvider`] on every operation; this
//! backend never stores it.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{BackendContext, FileContent, StorageBackend};
use crate::{
    error::{VfsError, VfsResult},
    fs::{
        dir_entry::DirectoryEntry,
        listing::{ListingFormat, parse_anchors},
        paths,
    },
    model::storage_root::BackendKind,
    net::http::{HttpResponse, bearer},
    util::suspend::guarded,
};

/// Reply to a token request. Both fields must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenReply {
    pub access_token: Option<String>,
    pub username: Option<String>,
}

/// Sentinel sent to whoever owns the credentials.
#[derive(Debug)]
pub struct TokenRequest {
    pub reply: oneshot::Sender<TokenReply>,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn request_token(&self) -> VfsResult<TokenReply>;
}

/// Serves a fixed pair of credentials, typically read from the environment.
#[derive(Clone)]
pub struct StaticTokenProvider {
    reply: TokenReply,
}

impl StaticTokenProvider {
    pub fn new(access_token: Option<String>, username: Option<String>) -> Self {
        Self {
            reply: TokenReply {
                access_token,
                username,
            },
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("has_token", &self.reply.access_token.is_some())
            .field("username", &self.reply.username)
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn request_token(&self) -> VfsResult<TokenReply> {
        Ok(self.reply.clone())
    }
}

/// Asks a parent task for credentials over a channel. Each request carries
/// its own single-use reply slot.
#[derive(Debug, Clone)]
pub struct ChannelTokenProvider {
    requests: mpsc::Sender<TokenRequest>,
}

impl ChannelTokenProvider {
    /// Provider plus the receiving end the credential owner listens on.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<TokenRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl TokenProvider for ChannelTokenProvider {
    async fn request_token(&self) -> VfsResult<TokenReply> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(TokenRequest { reply })
            .await
            .map_err(|_| VfsError::Authentication("token channel closed".into()))?;
        answer
            .await
            .map_err(|_| VfsError::Authentication("token request dropped without a reply".into()))
    }
}

pub struct AuthProxyBackend {
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    ctx: BackendContext,
}

impl AuthProxyBackend {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>, ctx: BackendContext) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            ctx,
        }
    }

    /// One token exchange, bounded by the token timeout.
    async fn token(&self) -> VfsResult<String> {
        let reply = guarded(
            "token exchange",
            &self.ctx.cancel,
            Some(self.ctx.token_timeout),
            self.tokens.request_token(),
        )
        .await?;

        let TokenReply {
            access_token: Some(token),
            username: Some(username),
        } = reply
        else {
            warn!("Token reply is missing access_token or username");
            return Err(VfsError::Authentication(
                "token reply must carry access_token and username".into(),
            ));
        };

        debug!(username = %username, "Token exchange complete");
        Ok(token)
    }

    fn url_for(&self, relative: &str) -> VfsResult<Url> {
        let joined = format!("{}/{relative}", self.base_url);
        Url::parse(&joined).map_err(|e| VfsError::InvalidPath(format!("{joined}: {e}")))
    }

    async fn get(&self, url: &Url) -> VfsResult<HttpResponse> {
        let token = self.token().await?;
        let headers = vec![bearer(&token)];
        guarded(
            "proxy request",
            &self.ctx.cancel,
            None,
            self.ctx.http.get(url, &headers),
        )
        .await?
        .error_for_status()
    }
}

/// Directory targets end in `/`, file-looking ones (last segment has an
/// extension) do not.
fn listing_target(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if paths::extension(trimmed).is_some() {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[async_trait]
impl StorageBackend for AuthProxyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AuthenticatedProxy
    }

    #[instrument(skip(self), fields(backend = "authenticated-proxy"))]
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry> {
        let url = self.url_for(&listing_target(path))?;
        let resp = self.get(&url).await?;
        let html = resp.text_lossy();

        Ok(match ListingFormat::sniff(&html) {
            Some(format) => format.parse(&html),
            None => {
                debug!(%url, "No listing dialect matched, walking anchors");
                parse_anchors(&html)
            }
        })
    }

    #[instrument(skip(self), fields(backend = "authenticated-proxy"))]
    async fn read_file(&self, path: &str) -> VfsResult<FileContent> {
        let url = self.url_for(path.trim_matches('/'))?;
        let resp = self.get(&url).await?;
        Ok(FileContent::binary(path, resp.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::cache_manager::DirectoryCache, config::AuthConfig, net::http::mock::MockHttp};
    use std::time::Duration;

    const BASE: &str = "https://proxy.example.org/bucket";

    fn backend(http: &MockHttp, tokens: Arc<dyn TokenProvider>) -> AuthProxyBackend {
        let auth = AuthConfig {
            token_timeout: Duration::from_millis(50),
            ..AuthConfig::default()
        };
        let ctx = BackendContext::new(Arc::new(http.clone()), DirectoryCache::new(), &auth);
        AuthProxyBackend::new(BASE, tokens, ctx)
    }

    fn static_tokens() -> Arc<dyn TokenProvider> {
        Arc::new(StaticTokenProvider::new(Some("abc".into()), Some("ada".into())))
    }

    #[test]
    fn listing_targets_follow_extension() {
        assert_eq!(listing_target("/runs/base/"), "runs/base/");
        assert_eq!(listing_target("/runs/base"), "runs/base/");
        assert_eq!(listing_target("/runs/summary.csv/"), "runs/summary.csv");
        assert_eq!(listing_target("/"), "");
    }

    #[tokio::test]
    async fn read_sends_bearer_token() {
        let http = MockHttp::new();
        http.route(&format!("{BASE}/runs/base/stats.txt"), 200, "mean 4.2");

        let content = backend(&http, static_tokens())
            .read_file("/runs/base/stats.txt/")
            .await
            .unwrap();
        assert_eq!(content.text().unwrap(), "mean 4.2");

        let req = &http.requests()[0];
        assert!(req.headers.iter().any(|(k, v)| *k == "Authorization" && v == "Bearer abc"));
    }

    #[tokio::test]
    async fn non_success_keeps_the_response() {
        let http = MockHttp::new();
        http.route(&format!("{BASE}/secret.json"), 403, "denied");

        let err = backend(&http, static_tokens()).read_file("secret.json").await.unwrap_err();
        match err {
            VfsError::Http(resp) => {
                assert_eq!(resp.status, 403);
                assert_eq!(resp.text_lossy(), "denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_username_is_fatal_and_makes_no_request() {
        let http = MockHttp::new();
        let tokens: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new(Some("abc".into()), None));

        let err = backend(&http, tokens).list_directory("/runs/").await.unwrap_err();
        assert!(matches!(err, VfsError::Authentication(_)));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn listing_falls_back_to_anchor_walk() {
        let http = MockHttp::new();
        http.route(
            &format!("{BASE}/runs/"),
            200,
            r#"<html><body><div class="listing">
  <a href="../">../</a>
  <a href="base/">base/</a>
  <a href="policy/">policy/</a>
  <a href="notes.md">notes.md</a>
</div></body></html>"#,
        );

        let entry = backend(&http, static_tokens()).list_directory("/runs").await.unwrap();
        assert_eq!(entry.dirs, vec!["base".to_string(), "policy".to_string()]);
        assert_eq!(entry.files, vec!["notes.md".to_string()]);
    }

    #[tokio::test]
    async fn channel_provider_round_trip() {
        let (provider, mut requests) = ChannelTokenProvider::channel(4);
        tokio::spawn(async move {
            while let Some(req) = requests.recv().await {
                let _ = req.reply.send(TokenReply {
                    access_token: Some("from-parent".into()),
                    username: Some("ops".into()),
                });
            }
        });

        let http = MockHttp::new();
        http.route(&format!("{BASE}/a.txt"), 200, "ok");
        backend(&http, Arc::new(provider)).read_file("a.txt").await.unwrap();

        let req = &http.requests()[0];
        assert!(req.headers.iter().any(|(_, v)| v == "Bearer from-parent"));
    }

    #[tokio::test]
    async fn silent_parent_times_out() {
        let (provider, _requests) = ChannelTokenProvider::channel(1);
        let http = MockHttp::new();

        let err = backend(&http, Arc::new(provider)).read_file("a.txt").await.unwrap_err();
        assert!(matches!(err, VfsError::Timeout { operation: "token exchange", .. }));
    }

    #[tokio::test]
    async fn dropped_reply_is_an_auth_error() {
        let (provider, mut requests) = ChannelTokenProvider::channel(1);
        tokio::spawn(async move {
            if let Some(req) = requests.recv().await {
                drop(req);
            }
        });

        let err = provider.request_token().await.unwrap_err();
        assert!(matches!(err, VfsError::Authentication(_)));
    }
}
