//! `src/operators/config_discovery.rs`
//!
//! # YAML config discovery
//!
//! Dashboards, topsheets, vizes and project configs for a folder can live in
//! the folder itself or in a `simwrapper`/`.simwrapper` folder next to any of
//! its ancestors. Candidates are visited from the root down to the target and
//! a later match overwrites an earlier one with the same file name, so the
//! closest definition wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    error::{VfsError, VfsResult},
    fs::{
        dir_entry::DirectoryEntry,
        paths::{normalize_dir_path, segments},
    },
};

/// Folder names (lowercased) that hold shared configs.
pub const CONFIG_FOLDERS: &[&str] = &["simwrapper", ".simwrapper"];

const DASHBOARD_PATTERN: &str = "dashboard*.{yml,yaml}";
const TOPSHEET_PATTERN: &str = "{topsheet,table}*.{yml,yaml}";
const VIZ_PATTERN: &str = "viz-*.{yml,yaml}";
const CONFIG_PATTERN: &str = "simwrapper-config.{yml,yaml}";

/// Anything that can list a directory by path.
#[async_trait]
pub trait ListDirectory: Send + Sync {
    async fn list_directory(&self, path: &str) -> VfsResult<DirectoryEntry>;
}

/// Config files found for a folder, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YamlConfigSet {
    pub dashboards: BTreeMap<String, String>,
    pub topsheets: BTreeMap<String, String>,
    pub configs: BTreeMap<String, String>,
    pub vizes: BTreeMap<String, String>,
}

impl YamlConfigSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dashboards.is_empty()
            && self.topsheets.is_empty()
            && self.configs.is_empty()
            && self.vizes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dashboards.len() + self.topsheets.len() + self.configs.len() + self.vizes.len()
    }
}

fn matcher(pattern: &str) -> VfsResult<GlobMatcher> {
    let mut builder = GlobBuilder::new(pattern);
    builder.literal_separator(true);
    Ok(builder
        .build()
        .map_err(|e| VfsError::InvalidPath(format!("invalid pattern '{pattern}': {e}")))?
        .compile_matcher())
}

struct Matchers {
    dashboards: GlobMatcher,
    topsheets: GlobMatcher,
    vizes: GlobMatcher,
    configs: GlobMatcher,
}

impl Matchers {
    fn new() -> VfsResult<Self> {
        Ok(Self {
            dashboards: matcher(DASHBOARD_PATTERN)?,
            topsheets: matcher(TOPSHEET_PATTERN)?,
            vizes: matcher(VIZ_PATTERN)?,
            configs: matcher(CONFIG_PATTERN)?,
        })
    }

    fn collect(&self, folder: &str, entry: &DirectoryEntry, out: &mut YamlConfigSet) {
        for name in &entry.files {
            let slot = if self.dashboards.is_match(name) {
                &mut out.dashboards
            } else if self.topsheets.is_match(name) {
                &mut out.topsheets
            } else if self.vizes.is_match(name) {
                &mut out.vizes
            } else if self.configs.is_match(name) {
                &mut out.configs
            } else {
                continue;
            };
            slot.insert(name.clone(), format!("{folder}{name}"));
        }
    }
}

/// Every proper ancestor of a normalized directory path, root first.
fn ancestors(target: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut prefix = String::from("/");
    for seg in segments(target) {
        out.push(prefix.clone());
        prefix.push_str(&seg);
        prefix.push('/');
    }
    out
}

/// Collect the YAML configs that apply to `folder`.
///
/// Failing to list an ancestor or a config folder is logged and skipped.
/// Failing to list `folder` itself is an error.
#[instrument(skip(lister), fields(operation_type = "find_all_yaml_files"))]
pub async fn find_all_yaml_files<L>(lister: &L, folder: &str) -> VfsResult<YamlConfigSet>
where
    L: ListDirectory + ?Sized,
{
    let target = normalize_dir_path(folder);
    let matchers = Matchers::new()?;

    let mut config_folders = Vec::new();
    for ancestor in ancestors(&target) {
        match lister.list_directory(&ancestor).await {
            Ok(entry) => config_folders.extend(
                entry
                    .dirs
                    .iter()
                    .filter(|d| CONFIG_FOLDERS.contains(&d.to_lowercase().as_str()))
                    .map(|d| format!("{ancestor}{d}/")),
            ),
            Err(e) => warn!(
                marker = "CONFIG_DISCOVERY",
                folder = %ancestor,
                error = %e,
                "Skipping unlistable ancestor"
            ),
        }
    }

    let mut found = YamlConfigSet::default();
    for candidate in &config_folders {
        match lister.list_directory(candidate).await {
            Ok(entry) => matchers.collect(candidate, &entry, &mut found),
            Err(e) => warn!(
                marker = "CONFIG_DISCOVERY",
                folder = %candidate,
                error = %e,
                "Skipping unlistable config folder"
            ),
        }
    }

    let entry = lister.list_directory(&target).await?;
    matchers.collect(&target, &entry, &mut found);

    debug!(
        marker = "CONFIG_DISCOVERY",
        folder = %target,
        config_folders = config_folders.len(),
        found = found.len(),
        "Config discovery complete"
    );
    Ok(found)
}

/// Full path of the single file in `folder` whose name matches `pattern`.
#[instrument(skip(lister), fields(operation_type = "find_matching_file"))]
pub async fn find_matching_file<L>(lister: &L, folder: &str, pattern: &str) -> VfsResult<String>
where
    L: ListDirectory + ?Sized,
{
    let dir = normalize_dir_path(folder);
    let glob = matcher(pattern)?;
    let entry = lister.list_directory(&dir).await?;

    let mut hits: Vec<&String> = entry.files.iter().filter(|f| glob.is_match(f.as_str())).collect();

    match hits.len() {
        0 => Err(VfsError::NoMatch {
            folder: dir,
            pattern: pattern.to_string(),
        }),
        1 => Ok(format!("{dir}{}", hits.remove(0))),
        _ => Err(VfsError::AmbiguousMatch {
            folder: dir,
            pattern: pattern.to_string(),
            candidates: hits.into_iter().cloned().collect(),
        }),
    }
}
