//! Solution discovery, project listing and selection.
//!
//! `.sln` files are read line by line; `.slnx` files are XML. Only `.csproj`
//! entries that exist on disk are returned, ordered by name and then by
//! relative path, both case-insensitively.

use crate::error::{Result, RollError};
use crate::models::{OutputFormat, ProjectHandle};
use crate::paths::{PathIdentity, PathKey};
use regex::Regex;
use roxmltree::Document;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

fn is_solution_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("sln") || e.eq_ignore_ascii_case("slnx"))
        .unwrap_or(false)
}

/// Solution files directly inside `dir`, ordered by file name.
pub fn find_solutions(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_solution_file(&path) {
            found.push(path);
        }
    }
    found.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    Ok(found)
}

/// Pick the solution to roll: the explicit path if given, otherwise the only
/// solution inside `search_dir`.
pub fn resolve_solution(
    explicit: Option<&str>,
    search_dir: &Path,
    identity: &PathIdentity,
) -> Result<PathBuf> {
    if let Some(p) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        let full = identity.normalize(search_dir.join(p));
        if !full.is_file() {
            return Err(RollError::NotFound {
                what: "Solution",
                path: full,
            });
        }
        if !is_solution_file(&full) {
            return Err(RollError::UnsupportedSolution(full));
        }
        return Ok(full);
    }

    let search_dir = identity.normalize(search_dir);
    let mut found = find_solutions(&search_dir)?;
    match found.len() {
        0 => Err(RollError::NotFound {
            what: "Solution (.sln / .slnx)",
            path: search_dir,
        }),
        1 => Ok(identity.normalize(found.remove(0))),
        _ => Err(RollError::AmbiguousSolution {
            names: found
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect(),
            dir: search_dir,
        }),
    }
}

fn sln_project_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*Project\("\{[^}]*\}"\)\s*=\s*"(?P<name>[^"]*)"\s*,\s*"(?P<path>[^"]*)"\s*,\s*"\{[^}]*\}""#,
        )
        .expect("valid solution project regex")
    })
}

/// `(name, relative path)` pairs as written in the solution.
fn parse_entries(path: &Path, text: &str) -> Result<Vec<(String, String)>> {
    let is_slnx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("slnx"));

    if !is_slnx {
        return Ok(text
            .lines()
            .filter_map(|l| sln_project_re().captures(l))
            .map(|c| (c["name"].to_string(), c["path"].to_string()))
            .collect());
    }

    let doc = Document::parse(text).map_err(|e| RollError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Project")
        .filter_map(|n| n.attribute("Path"))
        .map(|rel| (project_name(rel), rel.to_string()))
        .collect())
}

/// File stem of a `.slnx` project path; the `.csproj` suffix matches in any case.
fn project_name(rel: &str) -> String {
    let file = rel.rsplit(['/', '\\']).next().unwrap_or(rel);
    let cut = file.len().saturating_sub(".csproj".len());
    match file.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".csproj") => file[..cut].to_string(),
        _ => file.to_string(),
    }
}

/// List the C# projects of a solution.
pub fn read_projects(sln: &Path, identity: &PathIdentity) -> Result<Vec<ProjectHandle>> {
    if !sln.is_file() {
        return Err(RollError::NotFound {
            what: "Solution",
            path: sln.to_path_buf(),
        });
    }
    let sln_dir = sln.parent().unwrap_or(Path::new("."));
    let text = fs::read_to_string(sln)?;

    let mut projects = Vec::new();
    for (name, rel) in parse_entries(sln, &text)? {
        if !rel.to_ascii_lowercase().ends_with(".csproj") {
            continue;
        }
        let host_rel = if std::path::MAIN_SEPARATOR == '\\' {
            rel.clone()
        } else {
            rel.replace('\\', "/")
        };
        let full = identity.normalize(sln_dir.join(&host_rel));
        if !full.is_file() {
            debug!(project = %full.display(), "skipping solution entry missing on disk");
            continue;
        }
        projects.push(ProjectHandle {
            name,
            manifest_path: full,
            relative_path: rel,
        });
    }

    projects.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| {
                a.relative_path
                    .to_lowercase()
                    .cmp(&b.relative_path.to_lowercase())
            })
    });
    Ok(projects)
}

/// Keep the projects named in `requested` (absolute or solution-relative
/// manifest paths). An empty request selects every project.
pub fn select_projects(
    projects: &[ProjectHandle],
    sln_dir: &Path,
    requested: &[String],
    identity: &PathIdentity,
) -> Result<Vec<ProjectHandle>> {
    let wanted: HashSet<PathKey> = requested
        .iter()
        .flat_map(|r| r.split(','))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| identity.key(identity.normalize(sln_dir.join(r))))
        .collect();

    if wanted.is_empty() {
        return Ok(projects.to_vec());
    }

    let selected: Vec<ProjectHandle> = projects
        .iter()
        .filter(|p| wanted.contains(&identity.key(&p.manifest_path)))
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(RollError::NoProjectsMatched(requested.join(",")));
    }
    Ok(selected)
}

/// Output file location: `out` relative to the solution directory, or the
/// default file name for `format`.
pub fn resolve_output(
    out: Option<&str>,
    format: OutputFormat,
    sln_dir: &Path,
    identity: &PathIdentity,
) -> PathBuf {
    match out.map(str::trim).filter(|o| !o.is_empty()) {
        Some(o) => identity.normalize(sln_dir.join(o)),
        None => identity.normalize(sln_dir.join(format.default_file_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CaseSensitivity;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn identity() -> PathIdentity {
        PathIdentity::new(CaseSensitivity::Sensitive)
    }

    const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Web", "src\Web\Web.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "core", "src\Core\Core.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{33333333-3333-3333-3333-333333333333}"
EndProject
Project("{F2A71F9B-5D33-465A-A702-920D77279786}") = "Fs", "src\Fs\Fs.fsproj", "{44444444-4444-4444-4444-444444444444}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Gone", "src\Gone\Gone.csproj", "{55555555-5555-5555-5555-555555555555}"
EndProject
"#;

    fn fixture(root: &Path) -> PathBuf {
        for p in ["src/Web", "src/Core", "src/Fs"] {
            fs::create_dir_all(root.join(p)).unwrap();
        }
        fs::write(root.join("src/Web/Web.csproj"), "<Project />").unwrap();
        fs::write(root.join("src/Core/Core.csproj"), "<Project />").unwrap();
        fs::write(root.join("src/Fs/Fs.fsproj"), "<Project />").unwrap();
        let sln = root.join("App.sln");
        fs::write(&sln, SLN).unwrap();
        sln
    }

    #[test]
    fn reads_existing_csproj_entries_sorted_by_name() {
        let dir = tempdir().unwrap();
        let sln = fixture(dir.path());
        let projects = read_projects(&sln, &identity()).unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["core", "Web"]);
        assert_eq!(projects[0].relative_path, r"src\Core\Core.csproj");
        assert!(projects[0].manifest_path.is_absolute());
        assert!(projects[0].manifest_path.is_file());
    }

    #[test]
    fn reads_slnx_projects() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fixture(root);
        let slnx = root.join("App.slnx");
        fs::write(
            &slnx,
            r#"<Solution>
  <Folder Name="/src/">
    <Project Path="src/Web/Web.csproj" />
    <Project Path="src/Core/Core.csproj" />
  </Folder>
</Solution>"#,
        )
        .unwrap();
        let projects = read_projects(&slnx, &identity()).unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Core", "Web"]);
    }

    #[test]
    fn slnx_project_names_drop_extension_in_any_case() {
        assert_eq!(project_name("src/App/App.CSPROJ"), "App");
        assert_eq!(project_name(r"src\Lib\Lib.csproj"), "Lib");
        assert_eq!(project_name("Tool.fsproj"), "Tool.fsproj");

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("App")).unwrap();
        fs::write(root.join("App/App.CSPROJ"), "<Project />").unwrap();
        let slnx = root.join("App.slnx");
        fs::write(&slnx, r#"<Solution><Project Path="App/App.CSPROJ" /></Solution>"#).unwrap();
        let projects = read_projects(&slnx, &identity()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "App");
    }

    #[test]
    fn resolves_single_solution_and_rejects_ambiguity() {
        let dir = tempdir().unwrap();
        let sln = fixture(dir.path());
        let found = resolve_solution(None, dir.path(), &identity()).unwrap();
        assert_eq!(found, identity().normalize(&sln));

        fs::write(dir.path().join("Other.slnx"), "<Solution />").unwrap();
        let err = resolve_solution(None, dir.path(), &identity()).unwrap_err();
        assert!(matches!(err, RollError::AmbiguousSolution { ref names, .. } if names.len() == 2));

        let explicit = resolve_solution(Some("App.sln"), dir.path(), &identity()).unwrap();
        assert_eq!(explicit, found);
    }

    #[test]
    fn explicit_solution_must_exist_and_have_solution_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let err = resolve_solution(Some("missing.sln"), dir.path(), &identity()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(err, RollError::NotFound { .. }));
        let err = resolve_solution(Some("notes.txt"), dir.path(), &identity()).unwrap_err();
        assert!(matches!(err, RollError::UnsupportedSolution(_)));
    }

    #[test]
    fn empty_directory_has_no_solution() {
        let dir = tempdir().unwrap();
        let err = resolve_solution(None, dir.path(), &identity()).unwrap_err();
        assert!(matches!(err, RollError::NotFound { .. }));
    }

    #[test]
    fn selects_by_relative_or_absolute_path() {
        let dir = tempdir().unwrap();
        let sln = fixture(dir.path());
        let projects = read_projects(&sln, &identity()).unwrap();

        let all = select_projects(&projects, dir.path(), &[], &identity()).unwrap();
        assert_eq!(all.len(), 2);

        let web_abs = dir.path().join("src/Web/Web.csproj");
        let picked = select_projects(
            &projects,
            dir.path(),
            &[format!("src/Core/Core.csproj, {}", web_abs.display())],
            &identity(),
        )
        .unwrap();
        assert_eq!(picked.len(), 2);

        let err =
            select_projects(&projects, dir.path(), &["nope.csproj".into()], &identity()).unwrap_err();
        assert!(matches!(err, RollError::NoProjectsMatched(_)));
    }

    #[test]
    fn output_defaults_to_solution_directory() {
        let id = identity();
        let dir = Path::new("/repo");
        assert_eq!(
            resolve_output(None, OutputFormat::Markdown, dir, &id),
            PathBuf::from("/repo/CSharpRoll.md")
        );
        assert_eq!(
            resolve_output(Some("out/roll.cs"), OutputFormat::CSharp, dir, &id),
            PathBuf::from("/repo/out/roll.cs")
        );
        assert_eq!(
            resolve_output(Some("/tmp/x.cs"), OutputFormat::CSharp, dir, &id),
            PathBuf::from("/tmp/x.cs")
        );
    }
}
