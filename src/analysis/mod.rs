//! Analysis-engine interface.
//!
//! The diagnostic mapper talks to the compiler toolchain only through
//! `AnalysisEngine`. Spans follow the engine convention: 0-based line and
//! character. The mapper converts them to 1-based positions.

pub mod dotnet;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use dotnet::DotnetBuildEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSeverity {
    Hidden,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePosition {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A location as reported by the engine. `path` may be relative or empty.
pub struct LineSpan {
    pub path: String,
    pub start: Option<LinePosition>,
}

impl LineSpan {
    pub fn at(path: impl Into<String>, line: u32, character: u32) -> Self {
        Self {
            path: path.into(),
            start: Some(LinePosition { line, character }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    pub severity: RawSeverity,
    pub id: String,
    pub message: String,
    pub suppressed: bool,
    /// Location after `#line`-style remapping, when the engine provides one.
    pub mapped: Option<LineSpan>,
    /// Lexical location in the compiled text.
    pub raw: Option<LineSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisProject {
    pub name: String,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Load problem reported by the engine outside any single diagnostic.
pub struct WorkspaceEvent {
    pub failure: bool,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// The compiler/analyzer toolchain seen by the diagnostic mapper.
pub trait AnalysisEngine {
    type Compilation;

    /// Load the solution and list its projects in solution order.
    fn open_solution(&mut self, solution: &Path) -> Result<Vec<AnalysisProject>, AnalysisError>;

    /// `Ok(None)` means the project could not be evaluated.
    fn compilation(
        &mut self,
        project: &AnalysisProject,
    ) -> Result<Option<Self::Compilation>, AnalysisError>;

    fn compiler_diagnostics(&mut self, compilation: &Self::Compilation) -> Vec<RawDiagnostic>;

    fn analyzer_diagnostics(
        &mut self,
        compilation: &Self::Compilation,
    ) -> Result<Vec<RawDiagnostic>, AnalysisError>;

    /// Workspace events gathered since the last call.
    fn drain_workspace_events(&mut self) -> Vec<WorkspaceEvent> {
        Vec::new()
    }
}
