//! Shared data models: projects, run options, and diagnostic buckets.

pub mod options;
pub mod project;

use crate::paths::{PathIdentity, PathKey};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

pub use options::{AnalysisMode, OutputFormat, RollOptions};
pub use project::{EvaluatedItem, ProjectHandle, RolledProject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
/// Severity kept by the roll. Hidden and informational findings never get here.
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A single finding. Line and column are 1-based.
pub struct Diagnostic {
    pub severity: Severity,
    pub id: String,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Diagnostic with no location.
    pub fn bare(severity: Severity, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            id: id.into(),
            message: normalize_message(&message.into()),
            file: None,
            line: None,
            column: None,
        }
    }
}

/// Collapse line breaks so a message always fits on one line.
pub fn normalize_message(message: &str) -> String {
    message.replace(['\r', '\n'], " ").trim().to_string()
}

/// Where a diagnostic is recorded. Decided once, at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Solution,
    /// Keyed by the manifest of the project being processed.
    Project(PathBuf),
    /// File inside the rolled set, 1-based line.
    FileLine(PathBuf, u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    severity: Severity,
    id: String,
    file: Option<PathKey>,
    line: Option<u32>,
    column: Option<u32>,
    message: String,
}

#[derive(Debug, Clone)]
pub struct ProjectBucket {
    pub manifest_path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct FileBucket {
    pub path: PathBuf,
    pub lines: BTreeMap<u32, Vec<Diagnostic>>,
}

/// Diagnostics grouped by solution, project and file+line.
///
/// Project and file keys use the run's `PathIdentity`, and every insertion
/// passes through one dedup set, so a finding reported twice by the engine
/// is stored once.
#[derive(Debug, Clone)]
pub struct DiagnosticBucketSet {
    identity: PathIdentity,
    pub analysis_mode: AnalysisMode,
    pub solution: Vec<Diagnostic>,
    projects: BTreeMap<PathKey, ProjectBucket>,
    files: BTreeMap<PathKey, FileBucket>,
    seen: HashSet<DedupKey>,
    /// Collection stopped early; the buckets hold what was gathered so far.
    pub cancelled: bool,
}

impl DiagnosticBucketSet {
    pub fn new(identity: PathIdentity, analysis_mode: AnalysisMode) -> Self {
        Self {
            identity,
            analysis_mode,
            solution: Vec::new(),
            projects: BTreeMap::new(),
            files: BTreeMap::new(),
            seen: HashSet::new(),
            cancelled: false,
        }
    }

    /// Set used when analysis is disabled: one advisory note at solution level.
    pub fn skipped(identity: PathIdentity, analysis_mode: AnalysisMode) -> Self {
        let mut set = Self::new(identity, analysis_mode);
        set.insert(
            Placement::Solution,
            Diagnostic::bare(
                Severity::Warning,
                "ANALYSIS",
                format!("Analysis skipped (analysis mode: {analysis_mode})."),
            ),
        );
        set
    }

    /// Record `diag` at `placement`. Returns false when an identical finding
    /// was already recorded anywhere in the set.
    pub fn insert(&mut self, placement: Placement, diag: Diagnostic) -> bool {
        let key = DedupKey {
            severity: diag.severity,
            id: diag.id.clone(),
            file: diag.file.as_ref().map(|f| self.identity.key(f)),
            line: diag.line,
            column: diag.column,
            message: diag.message.clone(),
        };
        if !self.seen.insert(key) {
            return false;
        }
        match placement {
            Placement::Solution => self.solution.push(diag),
            Placement::Project(manifest) => {
                self.projects
                    .entry(self.identity.key(&manifest))
                    .or_insert_with(|| ProjectBucket {
                        manifest_path: manifest,
                        diagnostics: Vec::new(),
                    })
                    .diagnostics
                    .push(diag);
            }
            Placement::FileLine(file, line) => {
                self.files
                    .entry(self.identity.key(&file))
                    .or_insert_with(|| FileBucket {
                        path: file,
                        lines: BTreeMap::new(),
                    })
                    .lines
                    .entry(line)
                    .or_default()
                    .push(diag);
            }
        }
        true
    }

    pub fn for_project(&self, manifest: &Path) -> &[Diagnostic] {
        self.projects
            .get(&self.identity.key(manifest))
            .map(|b| b.diagnostics.as_slice())
            .unwrap_or(&[])
    }

    pub fn for_file(&self, file: &Path) -> Option<&BTreeMap<u32, Vec<Diagnostic>>> {
        self.files.get(&self.identity.key(file)).map(|b| &b.lines)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectBucket> {
        self.projects.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileBucket> {
        self.files.values()
    }

    /// All recorded diagnostics, solution first, then projects, then files.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.solution
            .iter()
            .chain(self.projects.values().flat_map(|b| b.diagnostics.iter()))
            .chain(
                self.files
                    .values()
                    .flat_map(|b| b.lines.values().flatten()),
            )
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.iter().filter(|d| d.severity == severity).count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
