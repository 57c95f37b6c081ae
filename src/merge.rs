//! Uniquing and ordering of source file lists.
//!
//! Uniquing and sorting are separate steps. `make_unique` keeps first-seen
//! order; `sort_paths` applies the display order. Both use the run's
//! `PathIdentity`, so a list that is unique under one is unique under the
//! other.

use crate::paths::{PathIdentity, PathKey};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Normalize every path and drop later duplicates, keeping first-seen order.
pub fn make_unique<I, P>(identity: &PathIdentity, paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut seen: HashSet<PathKey> = HashSet::new();
    let mut out = Vec::new();
    for p in paths {
        let full = identity.normalize(p);
        if seen.insert(identity.key(&full)) {
            out.push(full);
        }
    }
    out
}

/// Stable sort under the shared comparer.
pub fn sort_paths(identity: &PathIdentity, paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| identity.compare(a, b));
}

/// Membership set over normalized paths.
#[derive(Debug, Clone)]
pub struct FileSet {
    identity: PathIdentity,
    keys: HashSet<PathKey>,
}

impl FileSet {
    pub fn new<I, P>(identity: PathIdentity, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let keys = paths
            .into_iter()
            .map(|p| identity.key(identity.normalize(p)))
            .collect();
        Self { identity, keys }
    }

    /// `path` must already be normalized.
    pub fn contains(&self, path: &Path) -> bool {
        self.keys.contains(&self.identity.key(path))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
