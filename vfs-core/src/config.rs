//! src/config.rs
//! ============================================================================
//! # Config: Storage Root Configuration Loader and Saver
//!
//! Describes the configured storage roots plus cache, transport and logging
//! settings. Loads and saves TOML from the platform config directory found by
//! the [`directories`](https://docs.rs/directories) crate, or from an explicit
//! path.
//!
//! Credentials are never stored in the file. A root names the environment
//! variables that hold its token (and username, for the authenticated proxy).
//!
//! ## Example
//! ```toml
//! [[roots]]
//! slug = "public"
//! kind = "generic-http"
//! base_url = "https://files.example.org/sims"
//!
//! [[roots]]
//! slug = "gh"
//! kind = "github"
//! token_env = "GITHUB_TOKEN"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::model::storage_root::BackendKind;

/// Listing cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on cached listings across all roots. Unset keeps every
    /// listing until its root is invalidated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u64>,

    /// Enable hit/miss/load counters
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: None,
            enable_stats: true,
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("vfs-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Bounds for the interactive suspension points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token exchange with the parent context
    #[serde(with = "humantime_serde")]
    pub token_timeout: Duration,

    /// Waiting for the user to answer a folder permission prompt
    #[serde(with = "humantime_serde")]
    pub permission_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_timeout: Duration::from_secs(30),
            permission_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
            file_prefix: "vfs".to_string(),
        }
    }
}

/// One configured storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub slug: String,

    pub kind: BackendKind,

    /// Base URL; unused for local roots
    #[serde(default)]
    pub base_url: String,

    /// Folder on disk for `local-handle` roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,

    /// Environment variable holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Environment variable holding the username (authenticated proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_env: Option<String>,

    /// GitHub API base, for GitHub Enterprise installs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub roots: Vec<RootConfig>,
}

impl Config {
    /// Loads config from the default location, creating it with defaults if
    /// absent.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path).await
    }

    /// Loads config from `path`, creating it with defaults if absent.
    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(path).await?;

            Ok(default_config)
        }
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str).await?;

        Ok(())
    }

    /// Root with the given slug.
    #[must_use]
    pub fn root(&self, slug: &str) -> Option<&RootConfig> {
        self.roots.iter().find(|r| r.slug == slug)
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "vfs", "vfs")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[cache]
max_capacity = 100

[auth]
token_timeout = "5s"

[[roots]]
slug = "public"
kind = "generic-http"
base_url = "https://files.example.org/sims"

[[roots]]
slug = "bucket"
kind = "authenticated-proxy"
base_url = "https://proxy.example.org/bucket"
token_env = "BUCKET_TOKEN"
username_env = "BUCKET_USER"

[[roots]]
slug = "home"
kind = "local-handle"
folder = "/tmp/sims"
"#;

    #[test]
    fn parses_roots_and_partial_sections() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(cfg.cache.max_capacity, Some(100));
        assert!(cfg.cache.enable_stats);
        assert_eq!(cfg.auth.token_timeout, Duration::from_secs(5));
        assert_eq!(cfg.auth.permission_timeout, Duration::from_secs(120));
        assert_eq!(cfg.roots.len(), 3);

        let bucket = cfg.root("bucket").unwrap();
        assert_eq!(bucket.kind, BackendKind::AuthenticatedProxy);
        assert_eq!(bucket.token_env.as_deref(), Some("BUCKET_TOKEN"));

        let home = cfg.root("home").unwrap();
        assert_eq!(home.kind, BackendKind::LocalHandle);
        assert_eq!(home.folder.as_deref(), Some(Path::new("/tmp/sims")));
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config::load_from(&path).await.unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let again = Config::load_from(&path).await.unwrap();
        assert_eq!(again, cfg);
    }
}
