//! Relative path handling for the verification cache.
//!
//! Cache keys are relative paths rendered with `/` separators, byte for
//! byte as the filesystem reports them. Two distinct files never share a
//! key: names that differ only in Unicode normalization (`café` composed
//! vs. decomposed) are different keys. Paths that are not valid UTF-8
//! have no key and are never cached.
//!
//! # Example
//!
//! ```
//! use copyverify::scanner::path_utils::{relative_key, strip_root};
//! use std::path::Path;
//!
//! let rel = strip_root(Path::new("/data/src"), Path::new("/data/src/docs/cafe\u{0301}.txt")).unwrap();
//! assert_eq!(relative_key(&rel).as_deref(), Some("docs/cafe\u{0301}.txt"));
//!
//! // A sibling sharing the root's name prefix is not under the root
//! assert!(strip_root(Path::new("/data/src"), Path::new("/data/src-old/a.txt")).is_none());
//! ```

use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
///
/// Only used to spot names that a normalizing filesystem would merge;
/// never for cache keys.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Strip `root` from `path`, returning the remainder.
///
/// Matching is done per path component, which is equivalent to stripping
/// the root with a trailing separator: `/data/src` never strips
/// `/data/src-old/file`. Returns `None` when `path` is not under `root`
/// or is the root itself.
#[must_use]
pub fn strip_root(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel.to_path_buf())
    }
}

/// Render a relative path as a cache key: `/`-separated, exact.
///
/// Returns `None` if any component is not valid UTF-8; such a file has no
/// unambiguous key.
#[must_use]
pub fn relative_key(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Render a relative path for messages: `/`-separated, lossy.
#[must_use]
pub fn display_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the destination counterpart of a source file.
#[must_use]
pub fn destination_path(destination_root: &Path, relative: &Path) -> PathBuf {
    destination_root.join(relative)
}
