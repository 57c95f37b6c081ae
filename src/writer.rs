//! Rolled artifact rendering.
//!
//! Both formats carry the same content in the same order: header, solution
//! diagnostics, then for each project its manifest, its project-level
//! diagnostics and its files. File-level diagnostics are injected as
//! comments directly above the line they point at. A file shared by several
//! projects is written under the first one and referenced afterwards.

use crate::models::{Diagnostic, OutputFormat};
use crate::paths::PathKey;
use crate::roll::RollBundle;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Render `bundle` in `format`. Paths are shown relative to `sln_dir`.
pub fn render(bundle: &RollBundle, format: OutputFormat, sln_dir: &Path) -> String {
    let mut out = String::new();
    match format {
        OutputFormat::CSharp => render_csharp(bundle, sln_dir, &mut out),
        OutputFormat::Markdown => render_markdown(bundle, sln_dir, &mut out),
    }
    out
}

/// Display path relative to `base`, always with `/` separators.
pub fn display_path(path: &Path, base: &Path) -> String {
    let rel = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    rel.to_string_lossy().replace('\\', "/")
}

fn describe(d: &Diagnostic, sln_dir: &Path) -> String {
    let mut s = format!("{} {}: {}", d.severity, d.id, d.message);
    if let Some(file) = &d.file {
        s.push_str(&format!(" ({}", display_path(file, sln_dir)));
        if let Some(line) = d.line {
            s.push_str(&format!(":{line}"));
            if let Some(col) = d.column {
                s.push_str(&format!(":{col}"));
            }
        }
        s.push(')');
    }
    s
}

fn read_source(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Source text with `// severity ID: message` lines inserted above each
/// referenced line, using that line's indentation. Findings past the last
/// line are appended at the end.
fn inject(text: &str, lines: Option<&BTreeMap<u32, Vec<Diagnostic>>>) -> String {
    let Some(lines) = lines else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0u32;
    for (i, line) in text.lines().enumerate() {
        let n = i as u32 + 1;
        last = n;
        if let Some(found) = lines.get(&n) {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            for d in found {
                out.push_str(&format!("{indent}// {} {}: {}\n", d.severity, d.id, d.message));
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    for (_, found) in lines.range(last + 1..) {
        for d in found {
            out.push_str(&format!("// {} {}: {}\n", d.severity, d.id, d.message));
        }
    }
    out
}

fn header_lines(bundle: &RollBundle, sln_dir: &Path) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Solution: {}",
            bundle
                .solution
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| display_path(&bundle.solution, sln_dir))
        ),
        format!(
            "Projects: {}, Files: {}",
            bundle.projects.len(),
            bundle.files.len()
        ),
        format!("Analysis mode: {}", bundle.diagnostics.analysis_mode),
    ];
    if bundle.diagnostics.cancelled {
        lines.push("Analysis was cancelled; diagnostics are partial.".to_string());
    }
    lines
}

fn render_csharp(bundle: &RollBundle, sln_dir: &Path, out: &mut String) {
    out.push_str("// <csroll>\n");
    for l in header_lines(bundle, sln_dir) {
        out.push_str(&format!("// {l}\n"));
    }
    out.push_str("// </csroll>\n");

    if !bundle.diagnostics.solution.is_empty() {
        out.push_str("\n// Solution diagnostics:\n");
        for d in &bundle.diagnostics.solution {
            out.push_str(&format!("//   {}\n", describe(d, sln_dir)));
        }
    }

    let mut written: HashMap<PathKey, String> = HashMap::new();
    for project in &bundle.projects {
        let manifest = &project.handle.manifest_path;
        out.push_str(&format!(
            "\n// ==== Project: {} ({}) ====\n",
            project.handle.name,
            display_path(manifest, sln_dir)
        ));
        for l in project.manifest_raw.lines() {
            out.push_str(&format!("// {l}\n"));
        }
        let diags = bundle.diagnostics.for_project(manifest);
        if !diags.is_empty() {
            out.push_str("//\n// Project diagnostics:\n");
            for d in diags {
                out.push_str(&format!("//   {}\n", describe(d, sln_dir)));
            }
        }

        for file in &project.files {
            let rel = display_path(file, sln_dir);
            let key = bundle.identity.key(file);
            if let Some(owner) = written.get(&key) {
                out.push_str(&format!("\n// ---- File: {rel} (see project {owner}) ----\n"));
                continue;
            }
            written.insert(key, project.handle.name.clone());
            out.push_str(&format!("\n// ---- File: {rel} ----\n"));
            match read_source(file) {
                Ok(text) => out.push_str(&inject(&text, bundle.diagnostics.for_file(file))),
                Err(e) => out.push_str(&format!("// Failed to read file: {e}\n")),
            }
        }
    }
}

/// Shortest backtick fence that cannot be closed by `text`.
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn push_block(out: &mut String, lang: &str, body: &str) {
    let fence = fence_for(body);
    out.push_str(&format!("{fence}{lang}\n"));
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("{fence}\n\n"));
}

fn render_markdown(bundle: &RollBundle, sln_dir: &Path, out: &mut String) {
    out.push_str("# C# roll\n\n");
    for l in header_lines(bundle, sln_dir) {
        out.push_str(&format!("- {l}\n"));
    }
    out.push('\n');

    if !bundle.diagnostics.solution.is_empty() {
        out.push_str("## Solution diagnostics\n\n");
        for d in &bundle.diagnostics.solution {
            out.push_str(&format!("- `{}`\n", describe(d, sln_dir)));
        }
        out.push('\n');
    }

    let mut written: HashMap<PathKey, String> = HashMap::new();
    for project in &bundle.projects {
        let manifest = &project.handle.manifest_path;
        out.push_str(&format!("## Project: {}\n\n", project.handle.name));
        out.push_str(&format!("`{}`\n\n", display_path(manifest, sln_dir)));
        push_block(out, "xml", &project.manifest_raw);

        let diags = bundle.diagnostics.for_project(manifest);
        if !diags.is_empty() {
            out.push_str("### Project diagnostics\n\n");
            for d in diags {
                out.push_str(&format!("- `{}`\n", describe(d, sln_dir)));
            }
            out.push('\n');
        }

        for file in &project.files {
            let rel = display_path(file, sln_dir);
            let key = bundle.identity.key(file);
            out.push_str(&format!("### {rel}\n\n"));
            if let Some(owner) = written.get(&key) {
                out.push_str(&format!("_See project {owner}._\n\n"));
                continue;
            }
            written.insert(key, project.handle.name.clone());
            match read_source(file) {
                Ok(text) => push_block(out, "csharp", &inject(&text, bundle.diagnostics.for_file(file))),
                Err(e) => out.push_str(&format!("_Failed to read file: {e}_\n\n")),
            }
        }
    }
}
