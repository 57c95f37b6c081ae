//! Project-side records: discovered projects, evaluated items, rolled output.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A project discovered in a solution.
pub struct ProjectHandle {
    pub name: String,
    /// Absolute, normalized manifest path.
    pub manifest_path: PathBuf,
    /// Path as written in the solution, relative to its directory.
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One item reported by the build-evaluation engine.
pub struct EvaluatedItem {
    pub item_type: String,
    pub evaluated_include: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
/// Snapshot of a project as written to the roll: raw manifest plus files.
pub struct RolledProject {
    pub handle: ProjectHandle,
    pub manifest_raw: String,
    pub files: Vec<PathBuf>,
}
