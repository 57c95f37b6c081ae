//! Analysis through `dotnet build`.
//!
//! Each selected project is built on its own with project references
//! disabled, and diagnostics are read back from the canonical MSBuild
//! console format:
//!
//! ```text
//! /src/App/Program.cs(12,9): warning CS0168: The variable 'x' is declared but never used [/src/App/App.csproj]
//! CSC : error CS5001: Program does not contain a static 'Main' method [/src/App/App.csproj]
//! ```
//!
//! MSBuild prints most findings twice (live and in the summary); the mapper's
//! dedup set absorbs the repeats.

use super::{
    AnalysisEngine, AnalysisError, AnalysisProject, LinePosition, LineSpan, RawDiagnostic,
    RawSeverity, WorkspaceEvent,
};
use crate::models::AnalysisMode;
use crate::paths::PathIdentity;
use crate::solution;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Captured console output of one project build.
#[derive(Debug, Clone)]
pub struct BuildLog {
    pub lines: Vec<String>,
    pub success: bool,
}

pub struct DotnetBuildEngine {
    identity: PathIdentity,
    mode: AnalysisMode,
    program: String,
    events: Vec<WorkspaceEvent>,
}

impl DotnetBuildEngine {
    pub fn new(identity: PathIdentity, mode: AnalysisMode) -> Self {
        Self {
            identity,
            mode,
            program: "dotnet".to_string(),
            events: Vec::new(),
        }
    }

    /// Use another executable in place of `dotnet`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn build_args(&self, manifest: &Path) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            manifest.to_string_lossy().to_string(),
            "-nologo".to_string(),
            // an up-to-date build skips the compiler and prints no findings
            "--no-incremental".to_string(),
            "-p:BuildProjectReferences=false".to_string(),
            "-p:PreferredUILang=en-US".to_string(),
            "-clp:NoSummary;ForceNoAlign".to_string(),
        ];
        if self.mode != AnalysisMode::Default {
            args.push(format!("-p:AnalysisMode={}", self.mode));
        }
        args
    }
}

impl AnalysisEngine for DotnetBuildEngine {
    type Compilation = BuildLog;

    fn open_solution(&mut self, path: &Path) -> Result<Vec<AnalysisProject>, AnalysisError> {
        let projects = solution::read_projects(path, &self.identity)
            .map_err(|e| AnalysisError::Other(e.to_string()))?;
        Ok(projects
            .into_iter()
            .map(|p| AnalysisProject {
                name: p.name,
                manifest_path: Some(p.manifest_path),
            })
            .collect())
    }

    fn compilation(
        &mut self,
        project: &AnalysisProject,
    ) -> Result<Option<BuildLog>, AnalysisError> {
        let Some(manifest) = project.manifest_path.as_ref() else {
            return Ok(None);
        };
        info!(
            project = %project.name,
            "building for diagnostics; bin/obj output is written next to the project"
        );
        let output = Command::new(&self.program)
            .args(self.build_args(manifest))
            .env("DOTNET_CLI_UI_LANGUAGE", "en-US")
            .env("DOTNET_NOLOGO", "1")
            .output()?;

        let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        lines.extend(
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string),
        );
        let log = BuildLog {
            lines,
            success: output.status.success(),
        };
        debug!(project = %project.name, success = log.success, lines = log.lines.len(), "build finished");

        let reported_error = log
            .lines
            .iter()
            .filter_map(|l| parse_line(l))
            .any(|d| d.severity == RawSeverity::Error);
        if !log.success && !reported_error {
            self.events.push(WorkspaceEvent {
                failure: true,
                message: format!(
                    "Build of {} failed without reporting diagnostics (exit status {}).",
                    project.name, output.status
                ),
            });
            return Ok(None);
        }
        Ok(Some(log))
    }

    fn compiler_diagnostics(&mut self, compilation: &BuildLog) -> Vec<RawDiagnostic> {
        compilation.lines.iter().filter_map(|l| parse_line(l)).collect()
    }

    fn analyzer_diagnostics(
        &mut self,
        _compilation: &BuildLog,
    ) -> Result<Vec<RawDiagnostic>, AnalysisError> {
        // analyzers run inside the build; their output is already in the log
        Ok(Vec::new())
    }

    fn drain_workspace_events(&mut self) -> Vec<WorkspaceEvent> {
        std::mem::take(&mut self.events)
    }
}

fn located_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<path>\S.*?)\((?P<line>\d+)(?:,(?P<col>\d+))?(?:,\d+,\d+)?\)\s*:\s*(?P<sev>error|warning|info|message)\s+(?P<id>[A-Za-z][A-Za-z0-9_]*)\s*:\s*(?P<msg>.*?)(?:\s+\[[^\]]+\])?\s*$",
        )
        .expect("valid located diagnostic regex")
    })
}

fn origin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<origin>(?:[A-Za-z]:)?[^:\[]*?)\s*:\s*(?P<sev>error|warning|info|message)\s+(?P<id>[A-Za-z][A-Za-z0-9_]*)\s*:\s*(?P<msg>.*?)(?:\s+\[[^\]]+\])?\s*$",
        )
        .expect("valid origin diagnostic regex")
    })
}

fn parse_severity(s: &str) -> RawSeverity {
    match s {
        "error" => RawSeverity::Error,
        "warning" => RawSeverity::Warning,
        _ => RawSeverity::Info,
    }
}

/// Parse one console line in MSBuild's canonical error format.
pub fn parse_line(line: &str) -> Option<RawDiagnostic> {
    if let Some(c) = located_re().captures(line) {
        // console positions are 1-based
        let row: u32 = c["line"].parse().ok()?;
        let col: u32 = c
            .name("col")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1);
        let span = LineSpan {
            path: c["path"].trim().to_string(),
            start: Some(LinePosition {
                line: row.saturating_sub(1),
                character: col.saturating_sub(1),
            }),
        };
        return Some(RawDiagnostic {
            severity: parse_severity(&c["sev"]),
            id: c["id"].to_string(),
            message: c["msg"].to_string(),
            suppressed: false,
            mapped: None,
            raw: Some(span),
        });
    }

    let c = origin_re().captures(line)?;
    let origin = c["origin"].trim();
    // tool names (CSC, MSBUILD) carry no location; project or file paths do
    let raw = if origin.contains('/') || origin.contains('\\') {
        Some(LineSpan {
            path: origin.to_string(),
            start: None,
        })
    } else {
        None
    };
    Some(RawDiagnostic {
        severity: parse_severity(&c["sev"]),
        id: c["id"].to_string(),
        message: c["msg"].to_string(),
        suppressed: false,
        mapped: None,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CaseSensitivity;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_located_warning() {
        let d = parse_line(
            "/src/App/Program.cs(12,9): warning CS0168: The variable 'x' is declared but never used [/src/App/App.csproj]",
        )
        .unwrap();
        assert_eq!(d.severity, RawSeverity::Warning);
        assert_eq!(d.id, "CS0168");
        assert_eq!(d.message, "The variable 'x' is declared but never used");
        assert_eq!(d.raw, Some(LineSpan::at("/src/App/Program.cs", 11, 8)));
        assert!(d.mapped.is_none());
    }

    #[test]
    fn parses_span_with_end_position() {
        let d = parse_line(r"C:\src\App\A.cs(3,1,3,10): error CS1002: ; expected").unwrap();
        assert_eq!(d.severity, RawSeverity::Error);
        assert_eq!(d.raw, Some(LineSpan::at(r"C:\src\App\A.cs", 2, 0)));
    }

    #[test]
    fn tool_origin_has_no_location() {
        let d = parse_line(
            "CSC : error CS5001: Program does not contain a static 'Main' method suitable for an entry point [/src/App/App.csproj]",
        )
        .unwrap();
        assert_eq!(d.id, "CS5001");
        assert!(d.raw.is_none());
    }

    #[test]
    fn project_origin_keeps_path_without_position() {
        let d = parse_line("/src/App/App.csproj : warning NU1603: App depends on X (>= 1.0.0)").unwrap();
        assert_eq!(
            d.raw,
            Some(LineSpan {
                path: "/src/App/App.csproj".into(),
                start: None
            })
        );
    }

    #[test]
    fn windows_project_origin_is_a_path() {
        let d = parse_line(r"C:\src\App\App.csproj : warning NU1701: Package restored").unwrap();
        assert_eq!(d.raw.unwrap().path, r"C:\src\App\App.csproj");
    }

    #[test]
    fn ignores_plain_output() {
        assert!(parse_line("  Determining projects to restore...").is_none());
        assert!(parse_line("Build succeeded.").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn analysis_mode_is_passed_unless_default() {
        let id = PathIdentity::new(CaseSensitivity::Sensitive);
        let engine = DotnetBuildEngine::new(id, AnalysisMode::Recommended);
        let args = engine.build_args(Path::new("/src/App/App.csproj"));
        assert!(args.contains(&"-p:AnalysisMode=Recommended".to_string()));
        let engine = DotnetBuildEngine::new(id, AnalysisMode::Default);
        let args = engine.build_args(Path::new("/src/App/App.csproj"));
        assert!(!args.iter().any(|a| a.starts_with("-p:AnalysisMode")));
    }

    #[test]
    fn every_build_recompiles() {
        let id = PathIdentity::new(CaseSensitivity::Sensitive);
        let engine = DotnetBuildEngine::new(id, AnalysisMode::Default);
        let args = engine.build_args(Path::new("/src/App/App.csproj"));
        assert_eq!(args[0], "build");
        assert!(args.contains(&"--no-incremental".to_string()));
        assert!(args.contains(&"-p:BuildProjectReferences=false".to_string()));
    }

    #[test]
    fn missing_program_is_a_compilation_error() {
        let id = PathIdentity::new(CaseSensitivity::Sensitive);
        let mut engine = DotnetBuildEngine::new(id, AnalysisMode::Default)
            .with_program("csroll-definitely-missing-dotnet");
        let project = AnalysisProject {
            name: "App".into(),
            manifest_path: Some("/src/App/App.csproj".into()),
        };
        assert!(matches!(
            engine.compilation(&project),
            Err(AnalysisError::Io(_))
        ));
    }
}
