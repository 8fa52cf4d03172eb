//! `src/model/storage_root.rs`
//!
//! # `StorageRoot`: one configured backend endpoint
//!
//! A root is immutable once built. Its slug names the cache partition its
//! listings live in; its [`BackendSpec`] carries whatever the backend needs
//! (folder handle, GitHub token, token provider).

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    backends::{
        auth_proxy::{StaticTokenProvider, TokenProvider},
        github::DEFAULT_API_BASE,
        local_handle::{DiskFolder, FolderHandle, PermissionPrompt},
    },
    config::RootConfig,
    error::{VfsError, VfsResult},
};

/// Backend kinds, in dispatch precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LocalHandle,
    Github,
    AuthenticatedProxy,
    GenericHttp,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalHandle => "local-handle",
            Self::Github => "github",
            Self::AuthenticatedProxy => "authenticated-proxy",
            Self::GenericHttp => "generic-http",
        };
        f.write_str(s)
    }
}

/// Backend-specific part of a root.
#[derive(Clone)]
pub enum BackendSpec {
    LocalHandle {
        folder: Arc<dyn FolderHandle>,
        prompt: Option<Arc<dyn PermissionPrompt>>,
    },

    Github {
        token: Option<String>,
        api_base: String,
    },

    AuthenticatedProxy {
        tokens: Arc<dyn TokenProvider>,
    },

    GenericHttp,
}

impl BackendSpec {
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::LocalHandle { .. } => BackendKind::LocalHandle,
            Self::Github { .. } => BackendKind::Github,
            Self::AuthenticatedProxy { .. } => BackendKind::AuthenticatedProxy,
            Self::GenericHttp => BackendKind::GenericHttp,
        }
    }
}

impl fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalHandle { folder, prompt } => f
                .debug_struct("LocalHandle")
                .field("folder", &folder.name())
                .field("prompt", &prompt.is_some())
                .finish(),
            Self::Github { token, api_base } => f
                .debug_struct("Github")
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .field("api_base", api_base)
                .finish(),
            Self::AuthenticatedProxy { .. } => f.write_str("AuthenticatedProxy"),
            Self::GenericHttp => f.write_str("GenericHttp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageRoot {
    slug: Arc<str>,
    base_url: String,
    spec: BackendSpec,
}

impl StorageRoot {
    pub fn new(slug: &str, base_url: &str, spec: BackendSpec) -> Self {
        Self {
            slug: Arc::from(slug),
            base_url: base_url.trim_end_matches('/').to_string(),
            spec,
        }
    }

    pub fn generic_http(slug: &str, base_url: &str) -> Self {
        Self::new(slug, base_url, BackendSpec::GenericHttp)
    }

    pub fn github(slug: &str, token: Option<String>) -> Self {
        Self::new(
            slug,
            "",
            BackendSpec::Github {
                token,
                api_base: DEFAULT_API_BASE.to_string(),
            },
        )
    }

    pub fn authenticated_proxy(slug: &str, base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::new(slug, base_url, BackendSpec::AuthenticatedProxy { tokens })
    }

    pub fn local_handle(
        slug: &str,
        folder: Arc<dyn FolderHandle>,
        prompt: Option<Arc<dyn PermissionPrompt>>,
    ) -> Self {
        Self::new(slug, "", BackendSpec::LocalHandle { folder, prompt })
    }

    /// Build a root from its config entry, reading credentials from the
    /// environment variables the entry names.
    pub fn from_config(cfg: &RootConfig) -> VfsResult<Self> {
        let env = |name: &Option<String>| name.as_ref().and_then(|v| std::env::var(v).ok());

        let spec = match cfg.kind {
            BackendKind::LocalHandle => {
                let folder = cfg.folder.clone().ok_or_else(|| {
                    VfsError::InvalidPath(format!("root {} has no folder configured", cfg.slug))
                })?;
                BackendSpec::LocalHandle {
                    folder: Arc::new(DiskFolder::new(folder)),
                    prompt: None,
                }
            }
            BackendKind::Github => BackendSpec::Github {
                token: env(&cfg.token_env),
                api_base: cfg
                    .api_base
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            },
            BackendKind::AuthenticatedProxy => {
                let provider = StaticTokenProvider::new(env(&cfg.token_env), env(&cfg.username_env));
                BackendSpec::AuthenticatedProxy {
                    tokens: Arc::new(provider),
                }
            }
            BackendKind::GenericHttp => BackendSpec::GenericHttp,
        };

        Ok(Self::new(&cfg.slug, &cfg.base_url, spec))
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.spec.kind()
    }
}
