use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::e_references::ReferenceSet;
use crate::e_types::{AnalyzerError, Result};

/// A project handle as produced by a solution load.
///
/// After loading, the only mutation a project sees is [`Project::attach_references`]
/// right before it is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    references: Option<ReferenceSet>,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Project {
            name: name.into(),
            path: path.into(),
            references: None,
        }
    }

    /// Directory containing the project descriptor.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Reads the compile-relevant properties and items of the descriptor.
    pub fn properties(&self) -> Result<ProjectProperties> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| AnalyzerError::io(&self.path, e))?;
        Ok(ProjectProperties::parse(&content))
    }

    /// Reads the target framework moniker out of the project descriptor.
    pub fn target_framework(&self) -> Result<String> {
        self.properties()?
            .target_framework
            .ok_or_else(|| AnalyzerError::MissingTargetFramework(self.path.clone()))
    }

    /// Descriptor paths of the projects this one references, resolved
    /// against its directory.
    pub fn referenced_projects(&self, properties: &ProjectProperties) -> Vec<PathBuf> {
        properties
            .project_references
            .iter()
            .map(|include| self.directory().join(include))
            .collect()
    }

    pub fn attach_references(&mut self, references: ReferenceSet) {
        self.references = Some(references);
    }

    pub fn references(&self) -> Option<&ReferenceSet> {
        self.references.as_ref()
    }
}

/// How the project's output is packaged, from `<OutputType>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    #[default]
    Library,
    Exe,
    WinExe,
}

impl OutputKind {
    fn from_property(value: &str) -> Self {
        if value.eq_ignore_ascii_case("exe") {
            OutputKind::Exe
        } else if value.eq_ignore_ascii_case("winexe") {
            OutputKind::WinExe
        } else {
            OutputKind::Library
        }
    }

    /// The value of the compiler's `-target:` option.
    pub fn csc_target(self) -> &'static str {
        match self {
            OutputKind::Library => "library",
            OutputKind::Exe => "exe",
            OutputKind::WinExe => "winexe",
        }
    }
}

/// A `<Using>` item, turned into a `global using` directive when implicit
/// usings are enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsingItem {
    Include {
        namespace: String,
        alias: Option<String>,
        is_static: bool,
    },
    Remove(String),
}

/// The compile-relevant part of a project descriptor.
///
/// Conditions and imports are not evaluated. When a property is set more
/// than once the first element wins, the same rule used for
/// `<TargetFramework>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    pub target_framework: Option<String>,
    pub output_kind: OutputKind,
    pub assembly_name: Option<String>,
    pub implicit_usings: bool,
    pub nullable: Option<String>,
    pub lang_version: Option<String>,
    pub allow_unsafe_blocks: bool,
    pub warnings_as_errors: bool,
    pub no_warn: Vec<String>,
    pub define_constants: Vec<String>,
    pub usings: Vec<UsingItem>,
    /// `Include` paths of `<ProjectReference>` items, with `/` separators,
    /// relative to the project directory.
    pub project_references: Vec<PathBuf>,
}

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?P<open>[A-Za-z_][\w.]*)(?:\s[^>]*)?>(?P<value>[^<]*)</(?P<close>[A-Za-z_][\w.]*)\s*>")
        .unwrap()
});

static ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?P<kind>ProjectReference|Using)\s(?P<attrs>[^>]*?)/?>").unwrap()
});

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?P<key>[A-Za-z_][\w.]*)\s*=\s*"(?P<value>[^"]*)""#).unwrap());

/// Removes `<!-- ... -->` spans so commented-out markup is never read.
pub fn strip_comments(descriptor: &str) -> std::borrow::Cow<'_, str> {
    COMMENT.replace_all(descriptor, "")
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("enable")
}

/// Splits a `;`-separated MSBuild list, dropping empty entries and
/// `$(Property)` self references.
fn split_list(value: &str) -> Vec<String> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("$("))
        .map(str::to_string)
        .collect()
}

impl ProjectProperties {
    pub fn parse(descriptor: &str) -> Self {
        let text = strip_comments(descriptor);
        let mut props = ProjectProperties::default();
        let mut target_frameworks: Option<String> = None;
        let mut seen = std::collections::HashSet::new();

        for caps in ELEMENT.captures_iter(&text) {
            let name = &caps["open"];
            if name != &caps["close"] {
                continue;
            }
            let value = caps["value"].trim();
            if value.is_empty() || !seen.insert(name.to_string()) {
                continue;
            }
            match name {
                "TargetFramework" => props.target_framework = Some(value.to_string()),
                "TargetFrameworks" => target_frameworks = Some(value.to_string()),
                "OutputType" => props.output_kind = OutputKind::from_property(value),
                "AssemblyName" => props.assembly_name = Some(value.to_string()),
                "ImplicitUsings" => props.implicit_usings = is_true(value),
                "Nullable" => props.nullable = Some(value.to_ascii_lowercase()),
                "LangVersion" => props.lang_version = Some(value.to_string()),
                "AllowUnsafeBlocks" => props.allow_unsafe_blocks = is_true(value),
                "TreatWarningsAsErrors" => props.warnings_as_errors = is_true(value),
                "NoWarn" => props.no_warn = split_list(value),
                "DefineConstants" => props.define_constants = split_list(value),
                _ => {}
            }
        }
        if props.target_framework.is_none() {
            props.target_framework = target_frameworks.and_then(|list| {
                list.split(';')
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            });
        }

        for caps in ITEM.captures_iter(&text) {
            let attrs: Vec<(&str, &str)> = ATTRIBUTE
                .captures_iter(&caps["attrs"])
                .filter_map(|a| Some((a.name("key")?.as_str(), a.name("value")?.as_str())))
                .collect();
            let attr = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.trim())
                    .filter(|v| !v.is_empty())
            };
            match &caps["kind"] {
                "ProjectReference" => {
                    if let Some(include) = attr("Include") {
                        props
                            .project_references
                            .push(PathBuf::from(include.replace('\\', "/")));
                    }
                }
                _ => {
                    if let Some(namespace) = attr("Include") {
                        props.usings.push(UsingItem::Include {
                            namespace: namespace.to_string(),
                            alias: attr("Alias").map(str::to_string),
                            is_static: attr("Static").map_or(false, is_true),
                        });
                    } else if let Some(namespace) = attr("Remove") {
                        props.usings.push(UsingItem::Remove(namespace.to_string()));
                    }
                }
            }
        }
        props
    }
}

/// Returns the text of the first `<TargetFramework>` element outside XML
/// comments. Multi-targeted projects only carry `<TargetFrameworks>`; for
/// those the first listed moniker is used.
pub fn find_target_framework(descriptor: &str) -> Option<String> {
    ProjectProperties::parse(descriptor).target_framework
}
