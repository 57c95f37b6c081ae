//! Roll assembly: resolve every selected project, merge the file sets and
//! attach diagnostics.

use crate::analysis::AnalysisEngine;
use crate::cancel::CancelToken;
use crate::diagnostics::DiagnosticMapper;
use crate::error::{Result, RollError};
use crate::merge::{make_unique, sort_paths, FileSet};
use crate::models::{DiagnosticBucketSet, ProjectHandle, RollOptions, RolledProject};
use crate::paths::PathIdentity;
use crate::resolver::SourceResolver;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything the writer needs.
#[derive(Debug)]
pub struct RollBundle {
    pub identity: PathIdentity,
    pub solution: PathBuf,
    /// Selected projects in selection order.
    pub projects: Vec<RolledProject>,
    /// Global file set: unique and sorted.
    pub files: Vec<PathBuf>,
    /// Deduplicated, first-seen order.
    pub warnings: Vec<String>,
    pub diagnostics: DiagnosticBucketSet,
}

pub struct RollAssembler {
    identity: PathIdentity,
    resolver: SourceResolver,
    options: RollOptions,
}

struct ProjectResult {
    rolled: RolledProject,
    warnings: Vec<String>,
}

impl RollAssembler {
    pub fn new(identity: PathIdentity, resolver: SourceResolver, options: RollOptions) -> Self {
        Self {
            identity,
            resolver,
            options,
        }
    }

    pub fn assemble<E: AnalysisEngine>(
        &self,
        solution: &Path,
        selected: &[ProjectHandle],
        engine: &mut E,
        cancel: &CancelToken,
    ) -> Result<RollBundle> {
        // order of `selected` is kept by the indexed collect
        let results: Vec<ProjectResult> = selected
            .par_iter()
            .map(|handle| self.roll_project(handle))
            .collect();

        let mut projects = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for r in results {
            warnings.extend(r.warnings);
            projects.push(r.rolled);
        }

        let mut files = make_unique(
            &self.identity,
            projects.iter().flat_map(|p| p.files.iter()),
        );
        sort_paths(&self.identity, &mut files);
        let warnings = dedup_warnings(warnings);

        if files.is_empty() {
            for w in &warnings {
                warn!("{w}");
            }
            return Err(RollError::NoSourceFiles);
        }
        info!(
            projects = projects.len(),
            files = files.len(),
            "source files collected"
        );

        let mode = self.options.analysis_mode;
        let diagnostics = if mode.is_enabled() {
            let manifests: Vec<PathBuf> = selected.iter().map(|p| p.manifest_path.clone()).collect();
            let rolled = FileSet::new(self.identity, files.iter());
            DiagnosticMapper::new(self.identity, self.options.include_generated, mode).collect(
                engine,
                solution,
                &manifests,
                &rolled,
                cancel,
            )
        } else {
            info!("analysis disabled");
            DiagnosticBucketSet::skipped(self.identity, mode)
        };

        Ok(RollBundle {
            identity: self.identity,
            solution: self.identity.normalize(solution),
            projects,
            files,
            warnings,
            diagnostics,
        })
    }

    fn roll_project(&self, handle: &ProjectHandle) -> ProjectResult {
        let outcome = self.resolver.resolve(&handle.manifest_path, &self.options);
        let mut warnings: Vec<String> = outcome
            .warnings
            .into_iter()
            .map(|w| format!("[{}] {}", handle.name, w))
            .collect();

        let mut files = make_unique(&self.identity, outcome.files);
        sort_paths(&self.identity, &mut files);

        let manifest_raw = match fs::read_to_string(&handle.manifest_path) {
            Ok(text) => text,
            Err(e) => {
                // a missing manifest was already reported by the resolver
                if handle.manifest_path.exists() {
                    warnings.push(format!(
                        "[{}] Failed to read project file: {}",
                        handle.name, e
                    ));
                }
                String::new()
            }
        };

        ProjectResult {
            rolled: RolledProject {
                handle: handle.clone(),
                manifest_raw,
                files,
            },
            warnings,
        }
    }
}

fn dedup_warnings(warnings: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    warnings
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}
