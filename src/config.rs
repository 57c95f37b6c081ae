//! Configuration discovery and effective settings resolution.
//!
//! csroll reads `csroll.toml|yaml|yml` from the start directory or the
//! closest ancestor (the walk stops at a `.git` entry) and merges it with
//! CLI flags to produce an `Effective` config.
//! Defaults:
//! - `solution`: the single `.sln`/`.slnx` in the start directory
//! - `projects`: every C# project of the solution
//! - `output`: `CSharpRoll.cs` / `CSharpRoll.md` next to the solution
//! - `format`: `cs`
//! - `include_generated`, `no_evaluation`: false
//! - `analysis_mode`: `Default`
//! - `report`: `human`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{Result, RollError};
use crate::models::{AnalysisMode, OutputFormat};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILES: [&str; 3] = ["csroll.toml", "csroll.yaml", "csroll.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Logging section under `[log]`.
pub struct LogCfg {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `csroll.toml|yaml`.
pub struct CsrollConfig {
    /// Solution path, relative to the config file's directory.
    pub solution: Option<String>,
    #[serde(default)]
    pub projects: Option<Vec<String>>,
    pub output: Option<String>,
    pub format: Option<String>,
    pub include_generated: Option<bool>,
    pub no_evaluation: Option<bool>,
    pub analysis_mode: Option<String>,
    pub report: Option<String>,
    #[serde(default)]
    pub log: Option<LogCfg>,
}

/// Values given on the command line. `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub dir: Option<String>,
    pub solution: Option<String>,
    pub projects: Vec<String>,
    pub output: Option<String>,
    pub format: Option<String>,
    pub include_generated: Option<bool>,
    pub no_evaluation: Option<bool>,
    pub analysis_mode: Option<String>,
    pub report: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    /// Absolute directory searched for a solution when none is named.
    pub search_dir: PathBuf,
    /// Directory holding the config file, or the detected root.
    pub config_root: PathBuf,
    pub solution: Option<PathBuf>,
    pub projects: Vec<String>,
    pub output: Option<String>,
    pub format: OutputFormat,
    pub include_generated: bool,
    pub no_evaluation: bool,
    pub analysis_mode: AnalysisMode,
    pub report: String,
    pub log_level: Option<String>,
    pub log_json: bool,
}

/// Walk upward from `start` to detect the configuration root.
///
/// Stops when a `csroll.toml|yaml|yml` or a `.git` entry is found.
pub fn detect_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `CsrollConfig` from `csroll.toml` or `csroll.yaml|yml` if present.
pub fn load_config(root: &Path) -> Result<Option<CsrollConfig>> {
    let toml_path = root.join("csroll.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path)?;
        let cfg: CsrollConfig = toml::from_str(&s).map_err(|e| RollError::Parse {
            path: toml_path.clone(),
            message: e.to_string(),
        })?;
        return Ok(Some(cfg));
    }
    for yml in ["csroll.yaml", "csroll.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p)?;
            let cfg: CsrollConfig = serde_yaml::from_str(&s).map_err(|e| RollError::Parse {
                path: p.clone(),
                message: e.to_string(),
            })?;
            return Ok(Some(cfg));
        }
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective> {
    let search_dir = std::env::current_dir()?.join(cli.dir.as_deref().unwrap_or("."));
    let config_root = detect_root(&search_dir);
    let cfg = load_config(&config_root)?.unwrap_or_default();

    let solution = cli
        .solution
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| cfg.solution.as_ref().map(|s| config_root.join(s)));

    let projects = if cli.projects.is_empty() {
        cfg.projects.unwrap_or_default()
    } else {
        cli.projects.clone()
    };

    let output = cli.output.clone().or(cfg.output);

    let format = match cli.format.as_deref().or(cfg.format.as_deref()) {
        Some(f) => f.parse()?,
        None => OutputFormat::default(),
    };

    let analysis_mode = match cli
        .analysis_mode
        .as_deref()
        .or(cfg.analysis_mode.as_deref())
    {
        Some(m) => m.parse()?,
        None => AnalysisMode::default(),
    };

    let report = cli
        .report
        .clone()
        .or(cfg.report)
        .unwrap_or_else(|| "human".to_string());
    if report != "human" && report != "json" {
        return Err(RollError::InvalidOption(format!(
            "invalid report '{report}'. Allowed: human, json"
        )));
    }

    let include_generated = cli
        .include_generated
        .or(cfg.include_generated)
        .unwrap_or(false);
    let no_evaluation = cli.no_evaluation.or(cfg.no_evaluation).unwrap_or(false);

    let log = cfg.log.unwrap_or_default();

    Ok(Effective {
        search_dir,
        config_root,
        solution,
        projects,
        output,
        format,
        include_generated,
        no_evaluation,
        analysis_mode,
        report,
        log_level: log.level,
        log_json: log.json.unwrap_or(false),
    })
}
