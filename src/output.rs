//! Run report rendering for the `roll` and `projects` commands.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-project fields and a top-level summary.

use crate::models::{ProjectHandle, Severity};
use crate::roll::RollBundle;
use crate::writer::display_path;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::path::Path;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn pretty(v: &JsonVal) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}

pub fn error_prefix() -> String {
    if use_colors("human") {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn warning_prefix() -> String {
    if use_colors("human") {
        "warning:".yellow().bold().to_string()
    } else {
        "warning:".to_string()
    }
}

pub fn note_prefix() -> String {
    if use_colors("human") {
        "note:".blue().bold().to_string()
    } else {
        "note:".to_string()
    }
}

/// Compose the run report JSON object (pure) for testing/snapshot purposes.
pub fn compose_report_json(bundle: &RollBundle, output_path: &Path, sln_dir: &Path) -> JsonVal {
    let projects: Vec<_> = bundle
        .projects
        .iter()
        .map(|p| {
            json!({
                "name": p.handle.name,
                "manifest": display_path(&p.handle.manifest_path, sln_dir),
                "files": p.files.len(),
                "diagnostics": bundle.diagnostics.for_project(&p.handle.manifest_path).len(),
            })
        })
        .collect();
    let summary = json!({
        "projects": bundle.projects.len(),
        "files": bundle.files.len(),
        "errors": bundle.diagnostics.count(Severity::Error),
        "warnings": bundle.diagnostics.count(Severity::Warning),
        "analysisMode": bundle.diagnostics.analysis_mode.as_str(),
        "cancelled": bundle.diagnostics.cancelled,
    });
    json!({
        "output": output_path.to_string_lossy(),
        "solution": bundle.solution.to_string_lossy(),
        "projects": projects,
        "warnings": bundle.warnings,
        "summary": summary,
    })
}

/// Print the run report in the requested format.
pub fn print_report(bundle: &RollBundle, output_path: &Path, sln_dir: &Path, output: &str) {
    match output {
        "json" => println!("{}", pretty(&compose_report_json(bundle, output_path, sln_dir))),
        _ => {
            let color = use_colors(output);
            let out = output_path.to_string_lossy();
            if color {
                println!("{} Output: {}", "Done.".green().bold(), out.cyan());
            } else {
                println!("Done. Output: {}", out);
            }
            println!(
                "Projects: {}, Files: {}",
                bundle.projects.len(),
                bundle.files.len()
            );
            let errors = bundle.diagnostics.count(Severity::Error);
            let warnings = bundle.diagnostics.count(Severity::Warning);
            let summary = format!(
                "Diagnostics: errors={} warnings={} (analysis mode: {})",
                errors, warnings, bundle.diagnostics.analysis_mode
            );
            if color && errors > 0 {
                println!("{}", summary.red());
            } else if color && warnings > 0 {
                println!("{}", summary.yellow());
            } else {
                println!("{}", summary);
            }
            if bundle.diagnostics.cancelled {
                println!("{} analysis was cancelled; diagnostics are partial", note_prefix());
            }
            if !bundle.warnings.is_empty() {
                if color {
                    println!("{}", "Warnings:".yellow().bold());
                } else {
                    println!("Warnings:");
                }
                for w in &bundle.warnings {
                    if color {
                        println!("  {}", format!("- {w}").bright_black());
                    } else {
                        println!("  - {w}");
                    }
                }
            }
        }
    }
}

/// Compose the project listing JSON (pure).
pub fn compose_projects_json(projects: &[ProjectHandle], sln: &Path) -> JsonVal {
    json!({
        "solution": sln.to_string_lossy(),
        "projects": projects,
    })
}

/// Print the projects discovered in a solution.
pub fn print_projects(projects: &[ProjectHandle], sln: &Path, output: &str) {
    match output {
        "json" => println!("{}", pretty(&compose_projects_json(projects, sln))),
        _ => {
            let color = use_colors(output);
            for p in projects {
                if color {
                    println!("{}  {}", p.name.bold(), p.relative_path.bright_black());
                } else {
                    println!("{}  {}", p.name, p.relative_path);
                }
            }
        }
    }
}
