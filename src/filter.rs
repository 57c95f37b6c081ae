//! Exclusion rules for build artifacts and generated sources.

use std::path::Path;

/// Directory segments that never contribute source files.
const EXCLUDED_DIRS: &[&str] = &[".git", ".vs", "bin", "obj", "node_modules"];

/// File name suffixes produced by code generators and designers.
const GENERATED_SUFFIXES: &[&str] = &[
    ".g.cs",
    ".g.i.cs",
    ".designer.cs",
    "assemblyinfo.cs",
    "globalusings.g.cs",
];

/// Whether `path` should be left out of the roll.
///
/// Directory segments are matched case-insensitively and both `/` and `\`
/// count as separators, so manifest-relative Windows paths are handled on
/// every host. Generated-file suffixes only apply when `include_generated`
/// is false. No filesystem access.
pub fn should_exclude(path: &Path, include_generated: bool) -> bool {
    let text = path.to_string_lossy();
    let segments: Vec<&str> = text.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    let Some((file_name, dirs)) = segments.split_last() else {
        return false;
    };

    if dirs.iter().any(|seg| {
        EXCLUDED_DIRS
            .iter()
            .any(|dir| seg.eq_ignore_ascii_case(dir))
    }) {
        return true;
    }

    if include_generated {
        return false;
    }

    let lowered = file_name.to_ascii_lowercase();
    GENERATED_SUFFIXES.iter().any(|s| lowered.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn excludes_artifact_directories_case_insensitively() {
        for p in [
            "/repo/App/bin/Debug/X.cs",
            "/repo/App/OBJ/X.cs",
            "/repo/.git/hooks/x.cs",
            "/repo/.VS/x.cs",
            "/repo/web/node_modules/pkg/x.cs",
        ] {
            assert!(should_exclude(Path::new(p), true), "{p}");
        }
    }

    #[test]
    fn does_not_match_partial_segment_names() {
        assert!(!should_exclude(Path::new("/repo/binary/X.cs"), false));
        assert!(!should_exclude(Path::new("/repo/objects/X.cs"), false));
        // a file literally named `bin` is not a directory segment
        assert!(!should_exclude(Path::new("/repo/src/bin"), false));
    }

    #[test]
    fn backslash_separated_paths_are_split() {
        assert!(should_exclude(Path::new(r"C:\repo\App\obj\Debug\X.cs"), true));
    }

    #[test]
    fn generated_suffixes_depend_on_flag() {
        for p in [
            "/repo/App/Model.g.cs",
            "/repo/App/View.g.i.cs",
            "/repo/App/Form1.Designer.cs",
            "/repo/App/Properties/AssemblyInfo.cs",
            "/repo/App/GlobalUsings.G.CS",
        ] {
            assert!(should_exclude(Path::new(p), false), "{p}");
            assert!(!should_exclude(Path::new(p), true), "{p}");
        }
        assert!(!should_exclude(Path::new("/repo/App/Program.cs"), false));
    }

    #[test]
    fn is_pure_for_missing_paths() {
        let p = PathBuf::from("/definitely/not/here/obj/x.g.cs");
        let first = should_exclude(&p, false);
        for _ in 0..3 {
            assert_eq!(should_exclude(&p, false), first);
        }
    }
}
