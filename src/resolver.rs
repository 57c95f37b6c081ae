//! Per-project source file resolution.
//!
//! A resolver holds an ordered list of strategies. Each strategy reports
//! `Found`, `Empty` or `Failed`; the first `Found` wins. The standard list is
//! build evaluation followed by a recursive filesystem scan, so a project
//! whose evaluation fails or declares nothing still yields its `.cs` files.

use crate::evaluate::{design_time_properties, GlobalProperties, ProjectEvaluator};
use crate::filter::should_exclude;
use crate::models::RollOptions;
use crate::paths::PathIdentity;
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SOURCE_EXTENSION: &str = ".cs";

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Vec<PathBuf>),
    Empty,
    Failed(String),
}

impl Resolution {
    fn from_files(files: Vec<PathBuf>) -> Self {
        if files.is_empty() {
            Resolution::Empty
        } else {
            Resolution::Found(files)
        }
    }
}

/// Inputs shared by every strategy for one project.
pub struct ResolveContext<'a> {
    pub manifest: &'a Path,
    pub project_dir: &'a Path,
    pub include_generated: bool,
    pub identity: &'a PathIdentity,
}

pub trait SourceStrategy: Send + Sync {
    /// Short label used in warnings.
    fn name(&self) -> &'static str;

    /// Strategies that consult the evaluation engine are skipped when the
    /// caller disables evaluation.
    fn uses_evaluation(&self) -> bool {
        false
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Resolution;
}

/// Files declared as `Compile` items by the build-evaluation engine.
pub struct EvaluationStrategy {
    evaluator: Box<dyn ProjectEvaluator>,
    properties: GlobalProperties,
}

impl EvaluationStrategy {
    pub fn new(evaluator: Box<dyn ProjectEvaluator>) -> Self {
        Self {
            evaluator,
            properties: design_time_properties(),
        }
    }
}

impl SourceStrategy for EvaluationStrategy {
    fn name(&self) -> &'static str {
        "Project evaluation"
    }

    fn uses_evaluation(&self) -> bool {
        true
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Resolution {
        let items = match self.evaluator.evaluate(ctx.manifest, &self.properties) {
            Ok(items) => items,
            Err(e) => return Resolution::Failed(e.to_string()),
        };

        let mut files = Vec::new();
        for item in items {
            if !item.item_type.eq_ignore_ascii_case("Compile") {
                continue;
            }
            let include = item.evaluated_include.trim();
            if include.is_empty() {
                continue;
            }
            // wildcards are not expanded here
            if include.contains('*') || include.contains('?') {
                debug!(include, "skipping wildcard Compile item");
                continue;
            }
            let full = ctx.identity.normalize(ctx.project_dir.join(include));
            if !has_source_extension(&full) {
                continue;
            }
            if should_exclude(&full, ctx.include_generated) {
                continue;
            }
            files.push(full);
        }
        Resolution::from_files(files)
    }
}

/// Every `.cs` file below the project directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemStrategy;

impl SourceStrategy for FilesystemStrategy {
    fn name(&self) -> &'static str {
        "Filesystem scan"
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Resolution {
        let dir = Pattern::escape(&ctx.project_dir.to_string_lossy());
        let pattern = format!("{}/**/*{}", dir, SOURCE_EXTENSION);
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let entries = match glob_with(&pattern, options) {
            Ok(entries) => entries,
            Err(e) => return Resolution::Failed(format!("bad scan pattern '{pattern}': {e}")),
        };

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(p) => {
                    if !p.is_file() {
                        continue;
                    }
                    let full = ctx.identity.normalize(&p);
                    if should_exclude(&full, ctx.include_generated) {
                        continue;
                    }
                    files.push(full);
                }
                Err(e) => warn!("Failed to read entry: {e}"),
            }
        }
        Resolution::from_files(files)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Resolves a project's source files through an ordered strategy list.
pub struct SourceResolver {
    identity: PathIdentity,
    strategies: Vec<Box<dyn SourceStrategy>>,
}

impl SourceResolver {
    pub fn new(identity: PathIdentity, strategies: Vec<Box<dyn SourceStrategy>>) -> Self {
        Self {
            identity,
            strategies,
        }
    }

    /// Build evaluation first, filesystem scan second.
    pub fn standard(identity: PathIdentity, evaluator: Box<dyn ProjectEvaluator>) -> Self {
        Self::new(
            identity,
            vec![
                Box::new(EvaluationStrategy::new(evaluator)),
                Box::new(FilesystemStrategy),
            ],
        )
    }

    /// Resolve the files of one project. Never fails: a missing manifest or a
    /// failing strategy is reported through `warnings`.
    pub fn resolve(&self, manifest: &Path, options: &RollOptions) -> ResolveOutcome {
        let mut outcome = ResolveOutcome::default();

        if !manifest.is_file() {
            outcome
                .warnings
                .push(format!("Project not found: {}", manifest.display()));
            return outcome;
        }

        let manifest = self.identity.normalize(manifest);
        let project_dir = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let ctx = ResolveContext {
            manifest: &manifest,
            project_dir: &project_dir,
            include_generated: options.include_generated,
            identity: &self.identity,
        };

        let active: Vec<&dyn SourceStrategy> = self
            .strategies
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !(options.skip_evaluation && s.uses_evaluation()))
            .collect();

        for (i, strategy) in active.iter().enumerate() {
            let next = active.get(i + 1);
            match strategy.resolve(&ctx) {
                Resolution::Found(files) => {
                    debug!(
                        manifest = %manifest.display(),
                        strategy = strategy.name(),
                        files = files.len(),
                        "resolved project sources"
                    );
                    outcome.files = files;
                    return outcome;
                }
                Resolution::Empty => {
                    debug!(
                        manifest = %manifest.display(),
                        strategy = strategy.name(),
                        "strategy yielded no files"
                    );
                }
                Resolution::Failed(reason) => {
                    let msg = match next {
                        Some(n) => format!(
                            "{} failed, falling back to {}. {}",
                            strategy.name(),
                            n.name().to_lowercase(),
                            reason
                        ),
                        None => format!("{} failed. {}", strategy.name(), reason),
                    };
                    warn!(manifest = %manifest.display(), "{msg}");
                    outcome.warnings.push(msg);
                }
            }
        }
        outcome
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(SOURCE_EXTENSION)
}
