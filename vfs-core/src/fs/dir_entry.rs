//! `src/fs/dir_entry.rs`
//!
//! # `DirectoryEntry`: normalized directory listing
//!
//! Every backend produces one of these. Construction cleans the names (no
//! separators, no trailing `/`) and natural-sorts both lists, so callers never
//! see an unsorted listing regardless of where it came from.

use std::{cmp::Ordering, collections::HashMap, fmt, iter::Peekable, str::Chars};

use crate::backends::local_handle::NativeHandle;

/// Sorted subdirectory and file names of one directory.
#[derive(Clone, Default)]
pub struct DirectoryEntry {
    pub dirs: Vec<String>,
    pub files: Vec<String>,

    /// Native child handles keyed by name. Only the local-handle backend
    /// fills this in.
    pub handles: Option<HashMap<String, NativeHandle>>,
}

impl DirectoryEntry {
    pub fn new<D, F>(dirs: D, files: F) -> Self
    where
        D: IntoIterator<Item = String>,
        F: IntoIterator<Item = String>,
    {
        let mut entry = Self {
            dirs: dirs.into_iter().filter_map(clean_name).collect(),
            files: files.into_iter().filter_map(clean_name).collect(),
            handles: None,
        };
        entry.sort();
        entry
    }

    #[must_use]
    pub fn with_handles(mut self, handles: HashMap<String, NativeHandle>) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Natural, case-insensitive ordering of both name lists.
    pub fn sort(&mut self) {
        self.dirs.sort_by(|a, b| natural_cmp(a, b));
        self.files.sort_by(|a, b| natural_cmp(a, b));
    }

    /// An empty listing may also mean "could not be parsed".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    #[must_use]
    pub fn handle(&self, name: &str) -> Option<&NativeHandle> {
        self.handles.as_ref()?.get(name)
    }

    #[must_use]
    pub fn has_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }
}

impl PartialEq for DirectoryEntry {
    fn eq(&self, other: &Self) -> bool {
        let keys = |e: &Self| {
            e.handles.as_ref().map(|h| {
                let mut k: Vec<&String> = h.keys().collect();
                k.sort();
                k.into_iter().cloned().collect::<Vec<_>>()
            })
        };

        self.dirs == other.dirs && self.files == other.files && keys(self) == keys(other)
    }
}

impl Eq for DirectoryEntry {}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("dirs", &self.dirs)
            .field("files", &self.files)
            .field("handles", &self.handles.as_ref().map(HashMap::len))
            .finish()
    }
}

/// Strips trailing separators and any directory prefix.
fn clean_name(name: String) -> Option<String> {
    let trimmed = name.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);

    if last.is_empty() {
        None
    } else if last.len() == name.len() {
        Some(name)
    } else {
        Some(last.to_string())
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Human ordering: case-insensitive, embedded numbers compared by value.
///
/// `img1 < img2 < img10`, `Alpha == alpha` (ties broken by raw byte order so
/// the sort stays deterministic).
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_number(&mut ai);
                let nb = take_number(&mut bi);
                match cmp_digit_runs(&na, &nb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            (Some(ca), Some(cb)) => {
                let la = ca.to_lowercase();
                let lb = cb.to_lowercase();
                match la.cmp(lb) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn numeric_substrings_compare_by_value() {
        let entry = DirectoryEntry::new(Vec::new(), names(&["img2", "img10", "img1"]));
        assert_eq!(entry.files, names(&["img1", "img2", "img10"]));
    }

    #[test]
    fn ordering_ignores_case() {
        let entry = DirectoryEntry::new(names(&["beta", "Alpha", "gamma", "ALPHA2"]), Vec::new());
        assert_eq!(entry.dirs, names(&["Alpha", "ALPHA2", "beta", "gamma"]));
    }

    #[test]
    fn leading_zeros_do_not_change_value_order() {
        assert_eq!(natural_cmp("run007", "run7"), Ordering::Less);
        assert_eq!(natural_cmp("run007", "run8"), Ordering::Less);
        assert_eq!(natural_cmp("it.100", "it.20"), Ordering::Greater);
    }

    #[test]
    fn names_are_stripped_of_separators() {
        let entry = DirectoryEntry::new(
            names(&["output/", "nested/deep/", "/"]),
            names(&["/files/a.csv", "b.csv"]),
        );
        assert_eq!(entry.dirs, names(&["deep", "output"]));
        assert_eq!(entry.files, names(&["a.csv", "b.csv"]));
        for n in entry.dirs.iter().chain(entry.files.iter()) {
            assert!(!n.contains('/'));
        }
    }

    #[test]
    fn empty_listing_is_reported() {
        assert!(DirectoryEntry::default().is_empty());
        assert!(!DirectoryEntry::new(Vec::new(), names(&["x"])).is_empty());
    }
}
