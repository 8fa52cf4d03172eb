//! `src/fs/listing.rs`
//!
//! # HTML directory-listing parsers
//!
//! Plain HTTP servers describe a directory with a generated HTML page whose
//! shape depends on the server. [`ListingFormat::sniff`] picks the dialect
//! from a signature in the body and the matching row pattern pulls out the
//! entries. Signatures are tried in a fixed order and the first hit wins.
//!
//! A body that matches no signature parses to an empty listing, so an empty
//! [`DirectoryEntry`] from here can mean "unparseable" as well as "empty".

use std::{borrow::Cow, sync::LazyLock};

use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::debug;

use super::dir_entry::DirectoryEntry;

static LIST_ITEM_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<li><a href="([^"]*)">([^<]*)<"#).expect("valid list-item regex")
});

static NODE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<li>\s*<a href="([^"]*)""#).expect("valid node row regex"));

static APACHE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<td><a href="([^"]*)">([^<]*)</a>"#).expect("valid apache row regex")
});

static NGINX_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([^"]*)">"#).expect("valid nginx row regex"));

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("valid anchor regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Server dialects, in sniffing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    SimpleWebServer,
    Subversion,
    NodeStatic,
    Apache,
    Nginx,
}

impl ListingFormat {
    /// Dialect whose signature appears first in sniffing order.
    #[must_use]
    pub fn sniff(html: &str) -> Option<Self> {
        if html.contains("SimpleWebServer") {
            Some(Self::SimpleWebServer)
        } else if html.contains("<ul>") {
            Some(Self::Subversion)
        } else if html.contains(r#"<ul id="files">"#) {
            Some(Self::NodeStatic)
        } else if html.contains("<table>") {
            Some(Self::Apache)
        } else if html.lines().any(|l| l.starts_with("<a ")) {
            Some(Self::Nginx)
        } else {
            None
        }
    }

    #[must_use]
    pub fn parse(self, html: &str) -> DirectoryEntry {
        let mut rows = Rows::default();

        match self {
            Self::SimpleWebServer => {
                for cap in LIST_ITEM_ROW.captures_iter(html) {
                    rows.push(&decode_entities(&cap[2]));
                }
            }
            Self::Subversion => {
                for cap in LIST_ITEM_ROW.captures_iter(html) {
                    let name = decode_entities(&cap[2]);
                    if is_parent_link(&name) {
                        continue;
                    }
                    rows.push(name.strip_prefix("./").unwrap_or(&name));
                }
            }
            Self::NodeStatic => {
                for cap in NODE_ROW.captures_iter(html) {
                    let href = decode_href(&cap[1]);
                    if href == "/" || is_parent_link(&href) {
                        continue;
                    }
                    rows.push(&href);
                }
            }
            Self::Apache => {
                for cap in APACHE_ROW.captures_iter(html) {
                    let href = &cap[1];
                    let text = cap[2].trim();
                    if href.starts_with('?') || href.starts_with('/') || text == "Parent Directory" {
                        continue;
                    }
                    let href = decode_href(href);
                    if is_parent_link(&href) {
                        continue;
                    }
                    rows.push(&href);
                }
            }
            Self::Nginx => {
                for line in html.lines().filter(|l| l.starts_with("<a ")) {
                    if let Some(cap) = NGINX_ROW.captures(line) {
                        let href = decode_href(&cap[1]);
                        if is_parent_link(&href) {
                            continue;
                        }
                        rows.push(&href);
                    }
                }
            }
        }

        rows.into_entry()
    }
}

/// Parse an HTML listing by sniffing its dialect. Unknown dialects give an
/// empty listing.
#[must_use]
pub fn parse_listing(html: &str) -> DirectoryEntry {
    match ListingFormat::sniff(html) {
        Some(format) => {
            debug!(?format, "Parsing directory listing");
            format.parse(html)
        }
        None => {
            debug!(bytes = html.len(), "No listing dialect matched");
            DirectoryEntry::default()
        }
    }
}

/// Walk every anchor element regardless of dialect.
///
/// An anchor is a directory when both its target and its visible text end in
/// `/`. The `../` parent link and column-sort links are skipped.
#[must_use]
pub fn parse_anchors(html: &str) -> DirectoryEntry {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for cap in ANCHOR.captures_iter(html) {
        let href = decode_href(&cap[1]);
        let text = decode_entities(TAG.replace_all(&cap[2], "").trim()).into_owned();

        if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
            continue;
        }
        if is_parent_link(&href) || is_parent_link(&text) || text == "Parent Directory" {
            continue;
        }

        let name = if text.is_empty() { href.clone() } else { text.clone() };
        if href.ends_with('/') && text.ends_with('/') {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }

    DirectoryEntry::new(dirs, files)
}

#[derive(Default)]
struct Rows {
    dirs: Vec<String>,
    files: Vec<String>,
}

impl Rows {
    /// Trailing `/` marks a directory.
    fn push(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        if name.ends_with('/') {
            self.dirs.push(name.to_string());
        } else {
            self.files.push(name.to_string());
        }
    }

    fn into_entry(self) -> DirectoryEntry {
        DirectoryEntry::new(self.dirs, self.files)
    }
}

fn is_parent_link(name: &str) -> bool {
    matches!(name, "../" | ".." | "./../")
}

fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&#47;", "/")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}

fn decode_href(href: &str) -> String {
    let unescaped = decode_entities(href);
    percent_decode_str(&unescaped).decode_utf8_lossy().into_owned()
}
