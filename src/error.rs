use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RollError>;

/// Terminal failures of a roll. Degraded resolution and analysis problems
/// are reported as warnings or diagnostics instead.
#[derive(Error, Debug)]
pub enum RollError {
    #[error("{what} not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("only .sln / .slnx files are supported: {}", .0.display())]
    UnsupportedSolution(PathBuf),

    #[error("multiple solutions found in {}: {}. Use --sln <path>", .dir.display(), .names.join(", "))]
    AmbiguousSolution { dir: PathBuf, names: Vec<String> },

    #[error("no .csproj projects found in solution {}", .0.display())]
    NoProjects(PathBuf),

    #[error("no projects matched --projects input: {0}")]
    NoProjectsMatched(String),

    #[error("no C# files collected")]
    NoSourceFiles,

    #[error("{0}")]
    InvalidOption(String),

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RollError {
    /// Process exit code reported by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            RollError::NotFound { .. }
            | RollError::UnsupportedSolution(_)
            | RollError::AmbiguousSolution { .. }
            | RollError::NoProjects(_)
            | RollError::NoProjectsMatched(_) => 2,
            RollError::NoSourceFiles => 3,
            _ => 1,
        }
    }
}
