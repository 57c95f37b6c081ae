//! Build-evaluation interface and the built-in manifest evaluator.
//!
//! The evaluator answers one question: which items does a project manifest
//! produce? `ManifestEvaluator` reads the project XML and applies the parts
//! of item evaluation that decide a source list: SDK default `Compile` items,
//! `Include` wildcards, `Exclude`, `Remove` and `Update`. Imports, conditions
//! and `$(Property)` expansion are not evaluated.

use crate::models::EvaluatedItem;
use crate::paths::clean;
use glob::{glob_with, MatchOptions, Pattern};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Properties passed to evaluation. Keys compare case-insensitively, so they
/// are stored lowercased.
pub type GlobalProperties = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("{0}")]
    Other(String),
}

/// The build-evaluation engine seen by the resolver.
pub trait ProjectEvaluator: Send + Sync {
    fn evaluate(
        &self,
        manifest: &Path,
        properties: &GlobalProperties,
    ) -> Result<Vec<EvaluatedItem>, EvaluationError>;
}

/// Properties that keep evaluation design-time only: no compilation, no
/// builds of referenced projects.
pub fn design_time_properties() -> GlobalProperties {
    [
        ("PreferredUILang", "en-US"),
        ("DesignTimeBuild", "true"),
        ("BuildProjectReferences", "false"),
        ("SkipCompilerExecution", "true"),
        ("ProvideCommandLineArgs", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
    .collect()
}

/// Evaluates items straight from the manifest XML.
///
/// SDK-style projects get the default `**/*.cs` compile glob (minus `bin/`,
/// `obj/` and dot folders) unless `EnableDefaultItems` or
/// `EnableDefaultCompileItems` is `false`. Explicit items are then applied in
/// document order, so a `Remove` only affects items added before it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestEvaluator;

impl ProjectEvaluator for ManifestEvaluator {
    fn evaluate(
        &self,
        manifest: &Path,
        _properties: &GlobalProperties,
    ) -> Result<Vec<EvaluatedItem>, EvaluationError> {
        let text = fs::read_to_string(manifest)?;
        let project_dir = manifest.parent().unwrap_or(Path::new("."));
        evaluate_items(&text, project_dir)
    }
}

const DEFAULT_COMPILE_GLOB: &str = "**/*.cs";

/// Output folders left out of SDK default items.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &["bin", "obj"];

/// Attributes that drive item operations rather than carry metadata.
const OPERATION_ATTRIBUTES: &[&str] = &["Include", "Exclude", "Remove", "Update", "Condition"];

const ITEM_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Evaluate the items of a project document whose manifest lives in
/// `project_dir`. Paths under `project_dir` are reported relative to it.
pub fn evaluate_items(
    text: &str,
    project_dir: &Path,
) -> Result<Vec<EvaluatedItem>, EvaluationError> {
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    let mut items = Vec::new();

    if uses_default_compile_items(root) {
        for path in expand(project_dir, DEFAULT_COMPILE_GLOB)? {
            if !in_default_excluded_dir(&path, project_dir) {
                items.push(EvaluatedItem {
                    item_type: "Compile".to_string(),
                    evaluated_include: relative_include(&path, project_dir),
                    metadata: BTreeMap::new(),
                });
            }
        }
    }

    for node in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "ItemGroup" && !in_target(n))
        .flat_map(|group| group.children().filter(|n| n.is_element()))
    {
        let item_type = node.tag_name().name();
        let metadata = read_metadata(node);

        if let Some(include) = node.attribute("Include") {
            let excluded = matchers(project_dir, node.attribute("Exclude").unwrap_or(""))?;
            for part in split_list(include) {
                let found: Vec<String> = if has_wildcard(part) {
                    expand(project_dir, part)?
                        .into_iter()
                        .map(|p| relative_include(&p, project_dir))
                        .collect()
                } else {
                    vec![to_host_separators(part)]
                };
                for include in found {
                    let full = full_path(project_dir, &include);
                    if excluded.iter().any(|m| m.matches_path_with(&full, ITEM_MATCH)) {
                        continue;
                    }
                    let duplicate = items.iter().any(|i: &EvaluatedItem| {
                        i.item_type == item_type
                            && full_path(project_dir, &i.evaluated_include) == full
                    });
                    if !duplicate {
                        items.push(EvaluatedItem {
                            item_type: item_type.to_string(),
                            evaluated_include: include,
                            metadata: metadata.clone(),
                        });
                    }
                }
            }
        } else if let Some(remove) = node.attribute("Remove") {
            let removed = matchers(project_dir, remove)?;
            items.retain(|i| {
                i.item_type != item_type
                    || !removed.iter().any(|m| {
                        m.matches_path_with(&full_path(project_dir, &i.evaluated_include), ITEM_MATCH)
                    })
            });
        } else if let Some(update) = node.attribute("Update") {
            let updated = matchers(project_dir, update)?;
            for item in items.iter_mut().filter(|i| i.item_type == item_type) {
                let full = full_path(project_dir, &item.evaluated_include);
                if updated.iter().any(|m| m.matches_path_with(&full, ITEM_MATCH)) {
                    item.metadata.extend(metadata.clone());
                }
            }
        }
    }
    Ok(items)
}

fn uses_default_compile_items(root: Node<'_, '_>) -> bool {
    let sdk = root.attribute("Sdk").is_some()
        || root
            .children()
            .any(|n| n.is_element() && n.tag_name().name() == "Sdk");
    sdk && !property_is_false(root, "EnableDefaultItems")
        && !property_is_false(root, "EnableDefaultCompileItems")
}

/// Last assignment of `name` in a `<PropertyGroup>` wins.
fn property_is_false(root: Node<'_, '_>, name: &str) -> bool {
    root.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "PropertyGroup" && !in_target(n))
        .flat_map(|g| g.children().filter(move |n| n.is_element() && n.tag_name().name() == name))
        .last()
        .and_then(|n| n.text())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("false"))
}

/// Items inside targets are created at build time, not at evaluation.
fn in_target(node: &Node<'_, '_>) -> bool {
    node.ancestors().any(|a| a.tag_name().name() == "Target")
}

fn read_metadata(node: Node<'_, '_>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for attr in node.attributes() {
        if !OPERATION_ATTRIBUTES.contains(&attr.name()) {
            metadata.insert(attr.name().to_string(), attr.value().to_string());
        }
    }
    for child in node.children().filter(|n| n.is_element()) {
        metadata.insert(
            child.tag_name().name().to_string(),
            child.text().unwrap_or_default().trim().to_string(),
        );
    }
    metadata
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(';').map(str::trim).filter(|p| !p.is_empty())
}

fn has_wildcard(entry: &str) -> bool {
    entry.contains('*') || entry.contains('?')
}

fn full_path(project_dir: &Path, include: &str) -> PathBuf {
    clean(&project_dir.join(include))
}

/// Glob text for an item entry: the project directory and literal segments
/// are escaped, wildcard segments are kept.
fn pattern_text(project_dir: &Path, entry: &str) -> String {
    let full = full_path(project_dir, &to_host_separators(entry));
    let mut out = PathBuf::new();
    for comp in full.components() {
        match comp {
            Component::Normal(seg) => {
                let seg = seg.to_string_lossy();
                if has_wildcard(&seg) {
                    out.push(seg.as_ref());
                } else {
                    out.push(Pattern::escape(&seg));
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}

fn matchers(project_dir: &Path, list: &str) -> Result<Vec<Pattern>, EvaluationError> {
    split_list(list)
        .map(|entry| {
            Pattern::new(&pattern_text(project_dir, entry))
                .map_err(|e| EvaluationError::Other(format!("bad item pattern '{entry}': {e}")))
        })
        .collect()
}

/// Files matching an item entry, in glob order.
fn expand(project_dir: &Path, entry: &str) -> Result<Vec<PathBuf>, EvaluationError> {
    let pattern = pattern_text(project_dir, entry);
    let entries = glob_with(&pattern, ITEM_MATCH)
        .map_err(|e| EvaluationError::Other(format!("bad item pattern '{entry}': {e}")))?;
    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(p) if p.is_file() => files.push(p),
            Ok(_) => {}
            Err(e) => debug!("skipping unreadable entry: {e}"),
        }
    }
    Ok(files)
}

fn in_default_excluded_dir(path: &Path, project_dir: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(project_dir) else {
        return false;
    };
    let Some(parent) = rel.parent() else {
        return false;
    };
    parent.components().any(|c| {
        let seg = c.as_os_str().to_string_lossy();
        seg.starts_with('.')
            || DEFAULT_EXCLUDED_DIRS
                .iter()
                .any(|d| seg.eq_ignore_ascii_case(d))
    })
}

fn relative_include(path: &Path, project_dir: &Path) -> String {
    path.strip_prefix(project_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Manifests are written with `\`; turn it into the host separator.
fn to_host_separators(include: &str) -> String {
    if std::path::MAIN_SEPARATOR == '\\' {
        include.to_string()
    } else {
        include.replace('\\', "/")
    }
}
