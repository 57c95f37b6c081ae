//! Run options shared by the resolver, the assembler and the writer.

use crate::error::RollError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
/// Layout of the rolled artifact.
pub enum OutputFormat {
    /// Plain `.cs` file with comment separators.
    #[default]
    CSharp,
    /// Markdown document with fenced code blocks.
    Markdown,
}

impl OutputFormat {
    pub fn default_file_name(self) -> &'static str {
        match self {
            OutputFormat::CSharp => "CSharpRoll.cs",
            OutputFormat::Markdown => "CSharpRoll.md",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cs" | "csharp" => Ok(OutputFormat::CSharp),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            other => Err(RollError::InvalidOption(format!(
                "invalid format '{other}'. Allowed: cs, md"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
/// Analyzer rule set requested from the analysis engine. `None` turns
/// analysis off entirely.
pub enum AnalysisMode {
    #[default]
    Default,
    Recommended,
    Minimum,
    All,
    None,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Default,
        AnalysisMode::Recommended,
        AnalysisMode::Minimum,
        AnalysisMode::All,
        AnalysisMode::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Default => "Default",
            AnalysisMode::Recommended => "Recommended",
            AnalysisMode::Minimum => "Minimum",
            AnalysisMode::All => "All",
            AnalysisMode::None => "None",
        }
    }

    pub fn is_enabled(self) -> bool {
        self != AnalysisMode::None
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = RollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AnalysisMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let allowed: Vec<&str> = AnalysisMode::ALL.iter().map(|m| m.as_str()).collect();
                RollError::InvalidOption(format!(
                    "invalid analysis mode '{}'. Allowed: {}",
                    s,
                    allowed.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Default)]
/// Options that affect file collection.
pub struct RollOptions {
    /// Keep `*.g.cs`, `*.Designer.cs` and similar generated sources.
    pub include_generated: bool,
    /// Skip build evaluation and go straight to the filesystem scan.
    pub skip_evaluation: bool,
    pub analysis_mode: AnalysisMode,
}
