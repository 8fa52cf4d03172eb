//! `src/fs/paths.rs`
//!
//! Path normalization shared by the front door and the backends.
//!
//! Listing paths are cache keys, so every spelling of a directory has to end
//! up as the same string: leading `/`, single trailing `/`, no `//` runs and
//! no `/./` segments.

use url::Url;

use crate::error::{VfsError, VfsResult};

/// Collapse runs of `/` into one. A `scheme://` prefix is left alone.
#[must_use]
pub fn collapse_separators(path: &str) -> String {
    let (scheme, rest) = match path.find("://") {
        Some(idx) => path.split_at(idx + 3),
        None => ("", path),
    };

    let mut out = String::with_capacity(path.len());
    out.push_str(scheme);

    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Directory cache key form of `path`.
///
/// ```text
/// "data//runs/./a"  ->  "/data/runs/a/"
/// ```
#[must_use]
pub fn normalize_dir_path(path: &str) -> String {
    let mut p = format!("/{path}/");
    p = collapse_separators(&p);

    while p.contains("/./") {
        p = p.replace("/./", "/");
    }

    p
}

/// Non-empty segments of `path`.
#[must_use]
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Removes every `..` together with the segment in front of it, repeating
/// until no such pair is left.
///
/// A `..` with nothing in front of it is kept, so `["..", "a"]` comes back
/// unchanged. This is not URL-style resolution.
#[must_use]
pub fn remove_dot_dot_pairs(mut parts: Vec<String>) -> Vec<String> {
    while let Some(idx) = parts.iter().skip(1).position(|p| p == "..") {
        let idx = idx + 1;
        parts.drain(idx - 1..=idx);
    }
    parts
}

/// Splits a file path into its parent directory (normalized) and file name.
pub fn split_parent(path: &str) -> VfsResult<(String, String)> {
    let trimmed = path.trim_end_matches('/');
    let (parent, name) = match trimmed.rfind('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    if name.is_empty() {
        return Err(VfsError::InvalidPath(path.to_string()));
    }

    Ok((normalize_dir_path(parent), name.to_string()))
}

/// Lower-cased extension of the final path segment, if any.
#[must_use]
pub fn extension(path: &str) -> Option<String> {
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && !name[1..].contains('.') {
        // dotfile like ".env"
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

const fn is_allowed_leading(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | ':' | '+')
}

/// Resolve a user-supplied path against a base URL.
///
/// Characters outside `[0-9a-zA-Z_\-/:+]` are stripped from the *start* of the
/// path only, the result is joined to `base`, duplicate separators are
/// collapsed and `.`/`..` are resolved by the URL parser.
///
/// This is best-effort hardening against odd leading characters in user
/// input. It is **not** a security boundary: a path can still climb out of
/// `base` with `..`, and callers handling untrusted input must enforce their
/// own access rules.
pub fn sanitize_path(base: &str, raw: &str) -> VfsResult<Url> {
    let path = raw.trim_start_matches(|c: char| !is_allowed_leading(c));
    let joined = collapse_separators(&format!("{base}/{path}"));

    Url::parse(&joined).map_err(|e| VfsError::InvalidPath(format!("{raw}: {e}")))
}
