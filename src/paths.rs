//! Path identity: normalization, equality and ordering under one comparer.
//!
//! Every component that compares, hashes or sorts source paths receives the
//! same `PathIdentity` value. It is built once at startup from the host
//! filesystem's case sensitivity and passed down explicitly.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How path text is compared.
pub enum CaseSensitivity {
    /// Ordinal comparison of the raw text.
    Sensitive,
    /// Ordinal comparison after folding to upper case.
    Insensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The single path comparer used by a run.
pub struct PathIdentity {
    case: CaseSensitivity,
}

/// Hashable identity of a path under a given `PathIdentity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathIdentity {
    pub fn new(case: CaseSensitivity) -> Self {
        Self { case }
    }

    /// Comparer matching the host filesystem: case-insensitive on Windows and
    /// macOS, case-sensitive elsewhere.
    pub fn for_host() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            Self::new(CaseSensitivity::Insensitive)
        } else {
            Self::new(CaseSensitivity::Sensitive)
        }
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    /// Make `path` absolute and lexically clean. The path does not have to
    /// exist; symlinks are not resolved.
    pub fn normalize(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(path),
                Err(_) => path.to_path_buf(),
            }
        };
        clean(&joined)
    }

    pub fn key(&self, path: impl AsRef<Path>) -> PathKey {
        let text = path.as_ref().to_string_lossy();
        match self.case {
            CaseSensitivity::Sensitive => PathKey(text.into_owned()),
            CaseSensitivity::Insensitive => PathKey(text.to_uppercase()),
        }
    }

    pub fn equal(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
        self.key(a) == self.key(b)
    }

    pub fn compare(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> Ordering {
        self.key(a).cmp(&self.key(b))
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
