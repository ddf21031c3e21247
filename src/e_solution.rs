//! Visual Studio solution (`.sln`) loading.
//!
//! Only the `Project(...) = "name", "path", "{guid}"` entries matter here;
//! everything else in the file (global sections, configurations, nesting) is
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::e_project::Project;
use crate::e_types::{AnalyzerError, Result};

/// Project type GUID Visual Studio uses for solution folders.
pub const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

/// Descriptor extensions the compiler backend knows how to compile.
pub const SUPPORTED_PROJECT_EXTENSIONS: &[&str] = &["csproj"];

/// A message raised while loading the workspace. These are informational and
/// never fail the run on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDiagnostic {
    pub message: String,
}

impl WorkspaceDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        WorkspaceDiagnostic {
            message: message.into(),
        }
    }
}

/// A raw `Project(...)` line from a solution file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionEntry {
    pub type_guid: String,
    pub name: String,
    /// Path as written in the solution, with `\` normalised to `/`.
    pub relative_path: String,
    pub guid: String,
}

impl SolutionEntry {
    pub fn is_solution_folder(&self) -> bool {
        self.type_guid.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub path: PathBuf,
    pub projects: Vec<Project>,
}

static PROJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*Project\("\{(?P<type>[0-9A-Fa-f-]+)\}"\)\s*=\s*"(?P<name>[^"]*)"\s*,\s*"(?P<path>[^"]*)"\s*,\s*"\{(?P<guid>[0-9A-Fa-f-]+)\}"\s*$"#,
    )
    .unwrap()
});

/// Parses the project entries out of solution text, in file order.
pub fn parse_solution(content: &str) -> Result<Vec<SolutionEntry>, String> {
    let mut entries = Vec::new();
    let mut saw_header = false;
    for line in content.lines() {
        let trimmed = line.trim_start_matches('\u{feff}').trim();
        if trimmed.starts_with("Microsoft Visual Studio Solution File") {
            saw_header = true;
            continue;
        }
        if let Some(caps) = PROJECT_LINE.captures(trimmed) {
            entries.push(SolutionEntry {
                type_guid: caps["type"].to_string(),
                name: caps["name"].to_string(),
                relative_path: caps["path"].replace('\\', "/"),
                guid: caps["guid"].to_string(),
            });
        } else if trimmed.starts_with("Project(") {
            return Err(format!("malformed project line: {}", trimmed));
        }
    }
    if !saw_header {
        return Err("missing 'Microsoft Visual Studio Solution File' header".to_string());
    }
    Ok(entries)
}

/// Loads a solution from disk.
///
/// Solution folders are dropped silently. Entries whose descriptor does not
/// exist or is not a supported language are reported through `sink`; with
/// `skip_unrecognized` they are skipped, otherwise the load fails.
pub fn load_solution(
    path: &Path,
    skip_unrecognized: bool,
    sink: &mut dyn FnMut(&WorkspaceDiagnostic),
) -> Result<Solution> {
    let content = fs::read_to_string(path).map_err(|e| AnalyzerError::io(path, e))?;
    let entries = parse_solution(&content).map_err(|message| AnalyzerError::SolutionFormat {
        path: path.to_path_buf(),
        message,
    })?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));

    let mut projects = Vec::new();
    for entry in entries {
        if entry.is_solution_folder() {
            log::trace!("skipping solution folder {}", entry.name);
            continue;
        }
        let project_path = root.join(&entry.relative_path);
        if let Err(reason) = check_recognized(&project_path) {
            let diag = WorkspaceDiagnostic::new(format!(
                "Cannot open project '{}': {}",
                project_path.display(),
                reason
            ));
            sink(&diag);
            if skip_unrecognized {
                continue;
            }
            return Err(AnalyzerError::UnrecognizedProject {
                path: project_path,
                reason,
            });
        }
        projects.push(Project::new(entry.name, project_path));
    }
    log::debug!(
        "loaded {} projects from {}",
        projects.len(),
        path.display()
    );
    Ok(Solution {
        path: path.to_path_buf(),
        projects,
    })
}

fn check_recognized(project_path: &Path) -> Result<(), String> {
    let ext = project_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_PROJECT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "the file extension '.{}' is not associated with a supported language",
            ext
        ));
    }
    if !project_path.is_file() {
        return Err("the project file does not exist".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SLN: &str = "\u{feff}
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
Project(\"{9A19103F-16F7-4668-BE54-9A1E7A4F7556}\") = \"App\", \"src\\App\\App.csproj\", \"{11111111-1111-1111-1111-111111111111}\"
EndProject
Project(\"{2150E333-8FDC-42A3-9474-1A3956D46DE8}\") = \"docs\", \"docs\", \"{22222222-2222-2222-2222-222222222222}\"
EndProject
Project(\"{F2A71F9B-5D33-465A-A702-920D77279786}\") = \"Fun\", \"src\\Fun\\Fun.fsproj\", \"{33333333-3333-3333-3333-333333333333}\"
EndProject
Project(\"{9A19103F-16F7-4668-BE54-9A1E7A4F7556}\") = \"Lib\", \"src\\Lib\\Lib.csproj\", \"{44444444-4444-4444-4444-444444444444}\"
EndProject
Global
EndGlobal
";

    #[test]
    fn parses_entries_in_order() {
        let entries = parse_solution(SLN).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["App", "docs", "Fun", "Lib"]);
        assert_eq!(entries[0].relative_path, "src/App/App.csproj");
        assert!(entries[1].is_solution_folder());
    }

    #[test]
    fn rejects_files_without_header() {
        assert!(parse_solution("Project(\"{x}\")").is_err());
        assert!(parse_solution("").is_err());
    }

    #[test]
    fn load_skips_unrecognized_and_reports_them() {
        let dir = TempDir::new().unwrap();
        let sln = dir.path().join("All.sln");
        fs::write(&sln, SLN).unwrap();
        for p in ["src/App/App.csproj", "src/Fun/Fun.fsproj"] {
            let path = dir.path().join(p);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "<Project />").unwrap();
        }

        let mut seen = Vec::new();
        let solution = load_solution(&sln, true, &mut |d| seen.push(d.message.clone())).unwrap();
        let names: Vec<_> = solution.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["App"]);
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains(".fsproj"));
        assert!(seen[1].contains("does not exist"));
    }

    #[test]
    fn load_fails_on_unrecognized_when_not_skipping() {
        let dir = TempDir::new().unwrap();
        let sln = dir.path().join("All.sln");
        fs::write(&sln, SLN).unwrap();
        let err = load_solution(&sln, false, &mut |_| {}).unwrap_err();
        assert!(matches!(err, AnalyzerError::UnrecognizedProject { .. }));
    }
}
