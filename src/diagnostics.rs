//! Diagnostic collection and bucketing.
//!
//! Raw findings from the analysis engine are filtered (suppressed, hidden and
//! informational ones are dropped) and placed exactly once:
//!
//! - file + line, when the remapped or raw span points into the rolled set;
//! - project, keyed by the manifest being processed, when the finding has a
//!   location outside the rolled set;
//! - solution, when it has no location at all.
//!
//! Analysis is best-effort. Engine failures turn into diagnostics and never
//! abort the roll.

use crate::analysis::{AnalysisEngine, AnalysisProject, LineSpan, RawDiagnostic, RawSeverity};
use crate::cancel::CancelToken;
use crate::filter::should_exclude;
use crate::merge::FileSet;
use crate::models::{
    normalize_message, AnalysisMode, Diagnostic, DiagnosticBucketSet, Placement, Severity,
};
use crate::paths::{PathIdentity, PathKey};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct DiagnosticMapper {
    identity: PathIdentity,
    include_generated: bool,
    mode: AnalysisMode,
}

impl DiagnosticMapper {
    pub fn new(identity: PathIdentity, include_generated: bool, mode: AnalysisMode) -> Self {
        Self {
            identity,
            include_generated,
            mode,
        }
    }

    /// Collect diagnostics for the selected projects of `solution`.
    ///
    /// Projects of the solution that are not in `selected` are never
    /// compiled. When `cancel` fires, the set gathered so far is returned
    /// with `cancelled` set.
    pub fn collect<E: AnalysisEngine>(
        &self,
        engine: &mut E,
        solution: &Path,
        selected: &[PathBuf],
        rolled: &FileSet,
        cancel: &CancelToken,
    ) -> DiagnosticBucketSet {
        let mut set = DiagnosticBucketSet::new(self.identity, self.mode);
        let selected: HashSet<PathKey> = selected
            .iter()
            .map(|p| self.identity.key(self.identity.normalize(p)))
            .collect();

        if cancel.is_cancelled() {
            set.cancelled = true;
            return set;
        }

        let projects = match engine.open_solution(solution) {
            Ok(p) => p,
            Err(e) => {
                warn!(solution = %solution.display(), "failed to open solution for analysis: {e}");
                self.drain_events(engine, &mut set);
                set.insert(
                    Placement::Solution,
                    Diagnostic::bare(
                        Severity::Error,
                        "WORKSPACE",
                        format!("Failed to open solution: {e}"),
                    ),
                );
                return set;
            }
        };
        self.drain_events(engine, &mut set);

        for project in projects {
            if cancel.is_cancelled() {
                set.cancelled = true;
                break;
            }
            let Some(manifest) = project.manifest_path.as_ref() else {
                continue;
            };
            let manifest = self.identity.normalize(manifest);
            if !selected.contains(&self.identity.key(&manifest)) {
                continue;
            }
            if !self.collect_project(engine, &project, &manifest, rolled, cancel, &mut set) {
                set.cancelled = true;
                break;
            }
        }

        info!(
            errors = set.count(Severity::Error),
            warnings = set.count(Severity::Warning),
            cancelled = set.cancelled,
            "diagnostics collected"
        );
        set
    }

    /// Returns false when cancellation interrupted the project.
    fn collect_project<E: AnalysisEngine>(
        &self,
        engine: &mut E,
        project: &AnalysisProject,
        manifest: &Path,
        rolled: &FileSet,
        cancel: &CancelToken,
        set: &mut DiagnosticBucketSet,
    ) -> bool {
        let compilation = match engine.compilation(project) {
            Ok(Some(c)) => c,
            Ok(None) => {
                self.drain_events(engine, set);
                set.insert(
                    Placement::Project(manifest.to_path_buf()),
                    Diagnostic::bare(
                        Severity::Error,
                        "COMPILATION",
                        "Compilation is null (project could not be evaluated).",
                    ),
                );
                return true;
            }
            Err(e) => {
                self.drain_events(engine, set);
                set.insert(
                    Placement::Project(manifest.to_path_buf()),
                    Diagnostic::bare(
                        Severity::Error,
                        "COMPILATION",
                        format!("Failed to get compilation: {e}"),
                    ),
                );
                return true;
            }
        };
        self.drain_events(engine, set);

        let compiler = engine.compiler_diagnostics(&compilation);
        let mut finished = true;
        let analyzer = if cancel.is_cancelled() {
            finished = false;
            Vec::new()
        } else {
            match engine.analyzer_diagnostics(&compilation) {
                Ok(found) => found,
                Err(e) => {
                    set.insert(
                        Placement::Project(manifest.to_path_buf()),
                        Diagnostic::bare(
                            Severity::Error,
                            "ANALYZERS",
                            format!("Analyzer run failed: {e}"),
                        ),
                    );
                    Vec::new()
                }
            }
        };

        for raw in compiler.into_iter().chain(analyzer) {
            if let Some((placement, diag)) = self.classify(&raw, manifest, rolled) {
                if !set.insert(placement, diag) {
                    debug!(id = %raw.id, "duplicate diagnostic skipped");
                }
            }
        }
        finished
    }

    fn drain_events<E: AnalysisEngine>(&self, engine: &mut E, set: &mut DiagnosticBucketSet) {
        for ev in engine.drain_workspace_events() {
            let severity = if ev.failure {
                Severity::Error
            } else {
                Severity::Warning
            };
            set.insert(
                Placement::Solution,
                Diagnostic::bare(severity, "WORKSPACE", ev.message),
            );
        }
    }

    /// Decide where `raw` belongs, or drop it.
    pub fn classify(
        &self,
        raw: &RawDiagnostic,
        current_manifest: &Path,
        rolled: &FileSet,
    ) -> Option<(Placement, Diagnostic)> {
        if raw.suppressed {
            return None;
        }
        let severity = match raw.severity {
            RawSeverity::Warning => Severity::Warning,
            RawSeverity::Error => Severity::Error,
            RawSeverity::Hidden | RawSeverity::Info => return None,
        };
        let message = normalize_message(&raw.message);

        if let Some((file, line, column)) = self.precise_location(raw, rolled) {
            if !self.include_generated && should_exclude(&file, false) {
                return None;
            }
            let diag = Diagnostic {
                severity,
                id: raw.id.clone(),
                message,
                file: Some(file.clone()),
                line: Some(line),
                column: Some(column),
            };
            return Some((Placement::FileLine(file, line), diag));
        }

        match any_location(raw) {
            Some(span) => {
                let file = self.identity.normalize(span.path.trim());
                if !self.include_generated && should_exclude(&file, false) {
                    return None;
                }
                let diag = Diagnostic {
                    severity,
                    id: raw.id.clone(),
                    message,
                    file: Some(file),
                    line: span.start.map(|s| s.line + 1),
                    column: span.start.map(|s| s.character + 1),
                };
                Some((Placement::Project(current_manifest.to_path_buf()), diag))
            }
            None => Some((
                Placement::Solution,
                Diagnostic {
                    severity,
                    id: raw.id.clone(),
                    message,
                    file: None,
                    line: None,
                    column: None,
                },
            )),
        }
    }

    /// Remapped span first, then the raw span; accepted only inside the
    /// rolled set. Returns the file and a 1-based line and column.
    fn precise_location(&self, raw: &RawDiagnostic, rolled: &FileSet) -> Option<(PathBuf, u32, u32)> {
        for span in [raw.mapped.as_ref(), raw.raw.as_ref()].into_iter().flatten() {
            let path = span.path.trim();
            if path.is_empty() {
                continue;
            }
            let Some(start) = span.start else {
                continue;
            };
            let full = self.identity.normalize(path);
            if rolled.contains(&full) {
                return Some((full, start.line + 1, start.character + 1));
            }
        }
        None
    }
}

fn any_location(raw: &RawDiagnostic) -> Option<&LineSpan> {
    [raw.raw.as_ref(), raw.mapped.as_ref()]
        .into_iter()
        .flatten()
        .find(|s| !s.path.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, WorkspaceEvent};
    use crate::paths::CaseSensitivity;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn identity() -> PathIdentity {
        PathIdentity::new(CaseSensitivity::Sensitive)
    }

    fn raw(sev: RawSeverity, id: &str, span: Option<LineSpan>) -> RawDiagnostic {
        RawDiagnostic {
            severity: sev,
            id: id.into(),
            message: format!("{id} message\r\nsecond line"),
            suppressed: false,
            mapped: None,
            raw: span,
        }
    }

    /// Engine serving canned diagnostics per manifest and recording which
    /// projects were compiled.
    #[derive(Default)]
    struct StubEngine {
        projects: Vec<AnalysisProject>,
        diagnostics: HashMap<PathBuf, Vec<RawDiagnostic>>,
        analyzer: HashMap<PathBuf, Vec<RawDiagnostic>>,
        fail_open: bool,
        fail_compile: Vec<PathBuf>,
        fail_analyzers: bool,
        compiled: Vec<PathBuf>,
        events: Vec<WorkspaceEvent>,
        cancel_after_compile: Option<CancelToken>,
    }

    impl StubEngine {
        fn with_projects(manifests: &[&str]) -> Self {
            Self {
                projects: manifests
                    .iter()
                    .map(|m| AnalysisProject {
                        name: m.to_string(),
                        manifest_path: Some(PathBuf::from(m)),
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl AnalysisEngine for StubEngine {
        type Compilation = PathBuf;

        fn open_solution(&mut self, _s: &Path) -> Result<Vec<AnalysisProject>, AnalysisError> {
            if self.fail_open {
                return Err(AnalysisError::Other("MSBuild not found".into()));
            }
            Ok(self.projects.clone())
        }

        fn compilation(
            &mut self,
            project: &AnalysisProject,
        ) -> Result<Option<PathBuf>, AnalysisError> {
            let manifest = project.manifest_path.clone().unwrap();
            self.compiled.push(manifest.clone());
            if let Some(token) = &self.cancel_after_compile {
                token.cancel();
            }
            if self.fail_compile.contains(&manifest) {
                return Err(AnalysisError::Other("restore failed".into()));
            }
            Ok(Some(manifest))
        }

        fn compiler_diagnostics(&mut self, c: &PathBuf) -> Vec<RawDiagnostic> {
            self.diagnostics.get(c).cloned().unwrap_or_default()
        }

        fn analyzer_diagnostics(&mut self, c: &PathBuf) -> Result<Vec<RawDiagnostic>, AnalysisError> {
            if self.fail_analyzers {
                return Err(AnalysisError::Other("analyzer crashed".into()));
            }
            Ok(self.analyzer.get(c).cloned().unwrap_or_default())
        }

        fn drain_workspace_events(&mut self) -> Vec<WorkspaceEvent> {
            std::mem::take(&mut self.events)
        }
    }

    fn run(engine: &mut StubEngine, selected: &[&str], rolled: &[&str], include_generated: bool) -> DiagnosticBucketSet {
        let mapper = DiagnosticMapper::new(identity(), include_generated, AnalysisMode::Default);
        let selected: Vec<PathBuf> = selected.iter().map(PathBuf::from).collect();
        let rolled = FileSet::new(identity(), rolled.iter().map(PathBuf::from));
        mapper.collect(engine, Path::new("/s/App.sln"), &selected, &rolled, &CancelToken::new())
    }

    #[test]
    fn places_by_location_kind() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        engine.diagnostics.insert(
            "/s/A/A.csproj".into(),
            vec![
                raw(RawSeverity::Warning, "CS0168", Some(LineSpan::at("/s/A/Program.cs", 41, 4))),
                raw(RawSeverity::Error, "CS0246", Some(LineSpan::at("/s/Lib/Lib.cs", 9, 0))),
                raw(RawSeverity::Error, "CS5001", None),
            ],
        );
        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/Program.cs"], false);

        let lines = set.for_file(Path::new("/s/A/Program.cs")).unwrap();
        let at_42 = &lines[&42];
        assert_eq!(at_42.len(), 1);
        assert_eq!(at_42[0].id, "CS0168");
        assert_eq!(at_42[0].column, Some(5));
        assert_eq!(at_42[0].message, "CS0168 message  second line");

        // keyed by the project being processed, not by the diagnostic's file
        let project = set.for_project(Path::new("/s/A/A.csproj"));
        assert_eq!(project.len(), 1);
        assert_eq!(project[0].id, "CS0246");
        assert_eq!(project[0].file.as_deref(), Some(Path::new("/s/Lib/Lib.cs")));
        assert_eq!(project[0].line, Some(10));
        assert!(set.for_project(Path::new("/s/Lib/Lib.csproj")).is_empty());

        assert_eq!(set.solution.len(), 1);
        assert_eq!(set.solution[0].id, "CS5001");
    }

    #[test]
    fn duplicate_findings_across_passes_are_recorded_once() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        let d = raw(RawSeverity::Warning, "CA1822", Some(LineSpan::at("/s/A/Program.cs", 3, 8)));
        engine.diagnostics.insert("/s/A/A.csproj".into(), vec![d.clone(), d.clone()]);
        engine.analyzer.insert("/s/A/A.csproj".into(), vec![d]);
        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/Program.cs"], false);
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn mapped_location_wins_over_raw() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        let mut d = raw(RawSeverity::Warning, "CS0219", Some(LineSpan::at("/s/A/obj/View.g.cs", 100, 0)));
        d.mapped = Some(LineSpan::at("/s/A/View.cshtml.cs", 6, 2));
        engine.diagnostics.insert("/s/A/A.csproj".into(), vec![d]);
        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/View.cshtml.cs"], false);
        let lines = set.for_file(Path::new("/s/A/View.cshtml.cs")).unwrap();
        assert_eq!(lines[&7][0].column, Some(3));
    }

    #[test]
    fn raw_location_used_when_mapped_is_outside_roll() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        let mut d = raw(RawSeverity::Warning, "CS0219", Some(LineSpan::at("/s/A/Program.cs", 0, 0)));
        d.mapped = Some(LineSpan::at("/elsewhere/Template.tt", 6, 2));
        engine.diagnostics.insert("/s/A/A.csproj".into(), vec![d]);
        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/Program.cs"], false);
        assert!(set.for_file(Path::new("/s/A/Program.cs")).unwrap().contains_key(&1));
    }

    #[test]
    fn generated_file_diagnostics_are_dropped_not_rebucketed() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        let d = raw(RawSeverity::Warning, "CS8618", Some(LineSpan::at("/s/A/Model.g.cs", 4, 0)));
        engine.diagnostics.insert("/s/A/A.csproj".into(), vec![d]);

        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/Program.cs"], false);
        assert!(set.is_empty());

        // with generated files rolled, the same finding lands on its line
        let mut engine2 = StubEngine::with_projects(&["/s/A/A.csproj"]);
        engine2.diagnostics.insert(
            "/s/A/A.csproj".into(),
            vec![raw(RawSeverity::Warning, "CS8618", Some(LineSpan::at("/s/A/Model.g.cs", 4, 0)))],
        );
        let set = run(&mut engine2, &["/s/A/A.csproj"], &["/s/A/Model.g.cs"], true);
        assert!(set.for_file(Path::new("/s/A/Model.g.cs")).is_some());
    }

    #[test]
    fn drops_suppressed_hidden_and_info() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        let mut suppressed = raw(RawSeverity::Error, "CS0001", None);
        suppressed.suppressed = true;
        engine.diagnostics.insert(
            "/s/A/A.csproj".into(),
            vec![
                suppressed,
                raw(RawSeverity::Info, "IDE0005", None),
                raw(RawSeverity::Hidden, "IDE0001", None),
            ],
        );
        let set = run(&mut engine, &["/s/A/A.csproj"], &[], false);
        assert!(set.is_empty());
    }

    #[test]
    fn unselected_projects_are_never_compiled() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj", "/s/B/B.csproj"]);
        engine.diagnostics.insert(
            "/s/B/B.csproj".into(),
            vec![raw(RawSeverity::Error, "CS0103", None)],
        );
        let set = run(&mut engine, &["/s/A/A.csproj"], &[], false);
        assert_eq!(engine.compiled, vec![PathBuf::from("/s/A/A.csproj")]);
        assert!(set.is_empty());
    }

    #[test]
    fn open_failure_is_a_solution_error() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        engine.fail_open = true;
        let set = run(&mut engine, &["/s/A/A.csproj"], &[], false);
        assert_eq!(set.solution.len(), 1);
        assert_eq!(set.solution[0].severity, Severity::Error);
        assert!(set.solution[0].message.contains("MSBuild not found"));
        assert!(engine.compiled.is_empty());
    }

    #[test]
    fn compile_failure_is_recorded_and_other_projects_continue() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj", "/s/B/B.csproj"]);
        engine.fail_compile.push("/s/A/A.csproj".into());
        engine.diagnostics.insert(
            "/s/B/B.csproj".into(),
            vec![raw(RawSeverity::Warning, "CS0105", None)],
        );
        let set = run(&mut engine, &["/s/A/A.csproj", "/s/B/B.csproj"], &[], false);
        let a = set.for_project(Path::new("/s/A/A.csproj"));
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, "COMPILATION");
        assert_eq!(set.solution.len(), 1);
        assert_eq!(engine.compiled.len(), 2);
    }

    #[test]
    fn analyzer_failure_keeps_compiler_findings() {
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj"]);
        engine.fail_analyzers = true;
        engine.diagnostics.insert(
            "/s/A/A.csproj".into(),
            vec![raw(RawSeverity::Warning, "CS0168", Some(LineSpan::at("/s/A/P.cs", 0, 0)))],
        );
        let set = run(&mut engine, &["/s/A/A.csproj"], &["/s/A/P.cs"], false);
        let project = set.for_project(Path::new("/s/A/A.csproj"));
        assert_eq!(project[0].id, "ANALYZERS");
        assert_eq!(project[0].severity, Severity::Error);
        assert!(set.for_file(Path::new("/s/A/P.cs")).is_some());
    }

    #[test]
    fn workspace_events_go_to_solution_level() {
        let mut engine = StubEngine::with_projects(&[]);
        engine.events.push(WorkspaceEvent {
            failure: false,
            message: "Found project reference without a matching metadata reference".into(),
        });
        let set = run(&mut engine, &[], &[], false);
        assert_eq!(set.solution.len(), 1);
        assert_eq!(set.solution[0].id, "WORKSPACE");
        assert_eq!(set.solution[0].severity, Severity::Warning);
    }

    #[test]
    fn cancellation_stops_between_projects() {
        let token = CancelToken::new();
        let mut engine = StubEngine::with_projects(&["/s/A/A.csproj", "/s/B/B.csproj"]);
        engine.cancel_after_compile = Some(token.clone());
        engine.diagnostics.insert(
            "/s/A/A.csproj".into(),
            vec![raw(RawSeverity::Warning, "CS0168", None)],
        );
        let mapper = DiagnosticMapper::new(identity(), false, AnalysisMode::Default);
        let selected = vec![PathBuf::from("/s/A/A.csproj"), PathBuf::from("/s/B/B.csproj")];
        let rolled = FileSet::new(identity(), Vec::<PathBuf>::new());
        let set = mapper.collect(&mut engine, Path::new("/s/App.sln"), &selected, &rolled, &token);

        assert!(set.cancelled);
        assert_eq!(engine.compiled, vec![PathBuf::from("/s/A/A.csproj")]);
        // compiler findings gathered before the stop are kept
        assert_eq!(set.solution.len(), 1);
    }
}
