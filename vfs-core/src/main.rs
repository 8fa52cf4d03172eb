//! src/main.rs
//! `vfs` command line: list and read files on any configured storage root.

use std::{fmt::Write as _, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, stdout};
use tracing::{debug, info};

use vfs_core::{
    DirectoryEntry, FileSystemOperator, StorageRoot,
    cache::DirectoryCache,
    config::{Config, RootConfig},
    logging::{LoggerConfig, init_logging_with_config},
    net::UreqClient,
};

/// Browse local folders, GitHub repositories and HTTP file servers through
/// one interface
#[derive(Parser, Debug)]
#[command(name = "vfs")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level for the JSON log file (overrides the config)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls { root: String, path: String },

    /// Print a file
    Cat { root: String, path: String },

    /// Print a JSON file (gzip layers are unwrapped)
    Json { root: String, path: String },

    /// Show the dashboard/topsheet/viz configs that apply to a folder
    Configs { root: String, path: String },

    /// Print the single file in FOLDER matching PATTERN
    Find {
        root: String,
        folder: String,
        pattern: String,
    },

    /// List configured roots
    Roots,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path).await,
        None => Config::load().await,
    }
    .context("Failed to load configuration")?;

    let mut logger_config = LoggerConfig::from(&config.logging);
    if let Some(level) = &args.log_level {
        logger_config.log_level = level.as_str().into();
    }
    let _guard = init_logging_with_config(logger_config)
        .await
        .context("Failed to initialize logging")?;

    info!(command = ?args.command, "Starting vfs");
    run(&config, args.command).await
}

fn operator(config: &Config, slug: &str) -> Result<FileSystemOperator> {
    let root_cfg = config
        .root(slug)
        .with_context(|| format!("No root named '{slug}' in configuration"))?;
    let root = StorageRoot::from_config(root_cfg)
        .with_context(|| format!("Invalid configuration for root '{slug}'"))?;

    let http = Arc::new(UreqClient::new(config.http.timeout, &config.http.user_agent));
    let cache = DirectoryCache::with_config(config.cache.clone());

    debug!(root = slug, kind = %root.kind(), "Built operator");
    Ok(FileSystemOperator::new(root, http, cache, &config.auth))
}

async fn run(config: &Config, command: Command) -> Result<()> {
    let mut out = stdout();

    match command {
        Command::Ls { root, path } => {
            let entry = operator(config, &root)?
                .list_directory(&path)
                .await
                .with_context(|| format!("Failed to list {path}"))?;

            out.write_all(render_listing(&entry)?.as_bytes()).await?;
        }

        Command::Cat { root, path } => {
            let mut chunks = operator(config, &root)?
                .open_file_as_stream(&path)
                .await
                .with_context(|| format!("Failed to read {path}"))?;

            while let Some(chunk) = chunks.next().await {
                out.write_all(&chunk?).await?;
            }
        }

        Command::Json { root, path } => {
            let value = operator(config, &root)?
                .read_file_as_json(&path)
                .await
                .with_context(|| format!("Failed to read {path} as JSON"))?;
            let pretty = serde_json::to_string_pretty(&value)?;
            out.write_all(pretty.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }

        Command::Configs { root, path } => {
            let found = operator(config, &root)?
                .find_all_yaml_files(&path)
                .await
                .with_context(|| format!("Config discovery failed for {path}"))?;
            let pretty = serde_json::to_string_pretty(&found)?;
            out.write_all(pretty.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }

        Command::Find {
            root,
            folder,
            pattern,
        } => {
            let path = operator(config, &root)?
                .find_matching_file(&folder, &pattern)
                .await
                .with_context(|| format!("No unique match for '{pattern}' in {folder}"))?;
            out.write_all(format!("{path}\n").as_bytes()).await?;
        }

        Command::Roots => {
            out.write_all(render_roots(&config.roots)?.as_bytes()).await?;
        }
    }

    out.flush().await?;
    Ok(())
}

/// One name per line, directories first with a trailing `/`.
fn render_listing(entry: &DirectoryEntry) -> Result<String> {
    let mut text = String::new();
    for dir in &entry.dirs {
        writeln!(text, "{dir}/")?;
    }
    for file in &entry.files {
        writeln!(text, "{file}")?;
    }
    Ok(text)
}

fn render_roots(roots: &[RootConfig]) -> Result<String> {
    let mut text = String::new();
    for r in roots {
        writeln!(text, "{}\t{}\t{}", r.slug, r.kind, r.base_url)?;
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_marks_directories() {
        let entry = DirectoryEntry::new(
            vec!["run10".to_string(), "run2".to_string()],
            vec!["a.csv".to_string()],
        );
        assert_eq!(render_listing(&entry).unwrap(), "run2/\nrun10/\na.csv\n");
    }

    #[test]
    fn roots_are_tab_separated() {
        let config: Config = toml::from_str(
            r#"
[[roots]]
slug = "public"
kind = "generic-http"
base_url = "https://files.example.org/sims"
"#,
        )
        .unwrap();

        assert_eq!(
            render_roots(&config.roots).unwrap(),
            "public\tgeneric-http\thttps://files.example.org/sims\n"
        );
    }
}
