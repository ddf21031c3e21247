//! The compiler service capability and its C# compiler backend.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

use crate::e_command_builder::CscCommandBuilder;
use crate::e_diagnostics::{
    parse_diagnostic_line, parse_diagnostics, Compilation, Diagnostic, Severity,
};
use crate::e_locator::{self, Toolchain, ToolchainOverrides};
use crate::e_project::{OutputKind, Project, UsingItem};
use crate::e_references::{framework_defines, ReferenceAssembly, ReferenceSet};
use crate::e_solution::{self, Solution, WorkspaceDiagnostic};
use crate::e_types::{AnalyzerError, Result};

/// What the driver needs from a compiler: open a solution and compile one of
/// its projects.
pub trait CompilerService {
    /// One-time setup run before the first solution load. Must be safe to
    /// call more than once.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Loads the solution at `path`, reporting load problems to `sink`.
    fn open_solution(
        &mut self,
        path: &Path,
        sink: &mut dyn FnMut(&WorkspaceDiagnostic),
    ) -> Result<Solution>;

    /// Compiles `project`, whose reference set is already attached.
    /// `Ok(None)` means the service could not produce a compilation at all.
    fn compile(&mut self, project: &Project) -> Result<Option<Compilation>>;
}

#[derive(Debug, Clone)]
pub struct CscOptions {
    pub toolchain: ToolchainOverrides,
    pub skip_unrecognized_projects: bool,
    pub extra_args: Vec<String>,
}

impl Default for CscOptions {
    fn default() -> Self {
        CscOptions {
            toolchain: ToolchainOverrides::default(),
            skip_unrecognized_projects: true,
            extra_args: Vec::new(),
        }
    }
}

/// Compiles projects with the .NET SDK's `csc.dll`.
///
/// Referenced projects are compiled first, into a build directory that lives
/// as long as the service, and their assemblies are passed as references.
#[derive(Debug)]
pub struct CscCompilerService {
    options: CscOptions,
    toolchain: Option<Toolchain>,
    build_dir: Option<TempDir>,
    builds: usize,
    /// Emitted assembly per canonical descriptor path, `None` when the
    /// compiler produced nothing.
    outputs: HashMap<PathBuf, Option<PathBuf>>,
}

/// One compiler run.
struct Build {
    compilation: Option<Compilation>,
    output: Option<PathBuf>,
}

/// Namespaces the SDK imports for `Microsoft.NET.Sdk` projects with
/// `<ImplicitUsings>` enabled.
pub const IMPLICIT_USINGS: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.IO",
    "System.Linq",
    "System.Net.Http",
    "System.Threading",
    "System.Threading.Tasks",
];

impl CscCompilerService {
    pub fn new(options: CscOptions) -> Self {
        CscCompilerService {
            options,
            toolchain: None,
            build_dir: None,
            builds: 0,
            outputs: HashMap::new(),
        }
    }

    /// Uses `toolchain` as is instead of the process-wide registration.
    pub fn with_toolchain(options: CscOptions, toolchain: Toolchain) -> Self {
        CscCompilerService {
            toolchain: Some(toolchain),
            ..CscCompilerService::new(options)
        }
    }

    fn toolchain(&mut self) -> Result<Toolchain> {
        match &self.toolchain {
            Some(t) => Ok(t.clone()),
            None => {
                let t = e_locator::register(&self.options.toolchain)?.clone();
                self.toolchain = Some(t.clone());
                Ok(t)
            }
        }
    }

    /// A fresh directory for one compiler run's output.
    fn next_output_dir(&mut self, assembly: &str) -> Result<PathBuf> {
        let root = match &self.build_dir {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("sln-analyzer")
                    .tempdir()
                    .map_err(|e| AnalyzerError::io(std::env::temp_dir(), e))?;
                let root = dir.path().to_path_buf();
                self.build_dir = Some(dir);
                root
            }
        };
        self.builds += 1;
        let dir = root.join(format!("{}-{}", self.builds, assembly));
        fs::create_dir_all(&dir).map_err(|e| AnalyzerError::io(&dir, e))?;
        Ok(dir)
    }

    /// Builds the project at `descriptor` for use as a reference, reusing an
    /// earlier build from this run.
    fn referenced_output(
        &mut self,
        descriptor: &Path,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        let key = match fs::canonicalize(descriptor) {
            Ok(key) => key,
            Err(e) => {
                log::warn!("skipping project reference {}: {}", descriptor.display(), e);
                return Ok(None);
            }
        };
        if let Some(output) = self.outputs.get(&key) {
            return Ok(output.clone());
        }
        if visiting.contains(&key) {
            log::warn!("skipping circular project reference {}", key.display());
            return Ok(None);
        }

        let name = key
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dependency = Project::new(name, &key);
        let references = ReferenceSet::for_framework(&dependency.target_framework()?)?;
        let build = self.build(&dependency, &references, visiting)?;
        if build.compilation.as_ref().map_or(true, Compilation::has_errors) {
            log::warn!(
                "referenced project {} did not compile cleanly",
                dependency.name
            );
        }
        Ok(build.output)
    }

    fn build(
        &mut self,
        project: &Project,
        references: &ReferenceSet,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<Build> {
        let toolchain = self.toolchain()?;
        let props = project.properties()?;
        let key = fs::canonicalize(&project.path).unwrap_or_else(|_| project.path.clone());

        let mut assemblies = references.assemblies(&toolchain.dotnet_root)?;
        visiting.push(key.clone());
        for descriptor in project.referenced_projects(&props) {
            let dependency = self.referenced_output(&descriptor, visiting);
            if let Some(path) = dependency? {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                assemblies.push(ReferenceAssembly { name, path });
            }
        }
        visiting.pop();

        let assembly = props
            .assembly_name
            .clone()
            .unwrap_or_else(|| project.name.clone());
        let out_dir = self.next_output_dir(&assembly)?;
        let extension = match props.output_kind {
            OutputKind::Library => "dll",
            OutputKind::Exe | OutputKind::WinExe => "exe",
        };
        let output = out_dir.join(format!("{}.{}", assembly, extension));

        let mut sources = collect_sources(project.directory());
        if props.implicit_usings {
            let generated = out_dir.join(format!("{}.GlobalUsings.g.cs", assembly));
            fs::write(&generated, implicit_usings_source(&props.usings))
                .map_err(|e| AnalyzerError::io(&generated, e))?;
            sources.push(generated);
        }

        let mut defines = framework_defines(&references.framework);
        defines.extend(["DEBUG".to_string(), "TRACE".to_string()]);
        defines.extend(props.define_constants.iter().cloned());

        log::debug!(
            "compiling {} ({} sources, {} references)",
            project.name,
            sources.len(),
            assemblies.len()
        );
        let mut cmd = CscCommandBuilder::new()
            .with_project_properties(&props)
            .with_defines(&defines)
            .with_output(&output)
            .with_references(&assemblies)
            .with_extra_args(&self.options.extra_args)
            .with_sources(&sources)
            .build_command(&toolchain);
        cmd.current_dir(project.directory())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::trace!("running {:?}", cmd);

        let result = cmd
            .output()
            .map_err(|e| AnalyzerError::io(&toolchain.dotnet, e))?;
        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr);
        let compilation = classify_output(&project.name, result.status.code(), &stdout, &stderr);

        let output = output.is_file().then_some(output);
        self.outputs.insert(key, output.clone());
        Ok(Build {
            compilation,
            output,
        })
    }
}

impl CompilerService for CscCompilerService {
    fn prepare(&mut self) -> Result<()> {
        self.toolchain().map(|_| ())
    }

    fn open_solution(
        &mut self,
        path: &Path,
        sink: &mut dyn FnMut(&WorkspaceDiagnostic),
    ) -> Result<Solution> {
        e_solution::load_solution(path, self.options.skip_unrecognized_projects, sink)
    }

    fn compile(&mut self, project: &Project) -> Result<Option<Compilation>> {
        let references = project
            .references()
            .ok_or_else(|| AnalyzerError::ReferencesNotAttached(project.name.clone()))?
            .clone();
        let build = self.build(project, &references, &mut Vec::new())?;
        Ok(build.compilation)
    }
}

/// Turns one compiler run into a compilation.
///
/// `exit_code` is `None` when the compiler was killed by a signal. A
/// non-zero exit always yields either no compilation or one with an error,
/// so the exit status and the classification cannot disagree.
fn classify_output(
    name: &str,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Option<Compilation> {
    let mut diagnostics = parse_diagnostics(stdout);
    diagnostics.extend(parse_diagnostics(stderr));

    let Some(code) = exit_code else {
        log::warn!("compiler for {} was terminated by a signal", name);
        return None;
    };
    if code != 0 && diagnostics.is_empty() {
        log::warn!(
            "compiler for {} exited with {} without diagnostics: {}",
            name,
            code,
            stderr.trim()
        );
        return None;
    }
    if code != 0 && !diagnostics.iter().any(Diagnostic::is_error) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            format!(
                "compiler exited with code {}: {}",
                code,
                output_tail(stdout, stderr)
            ),
        ));
    }
    Some(Compilation::new(diagnostics))
}

/// The last few lines of output that were not parsed as diagnostics,
/// preferring stderr.
fn output_tail(stdout: &str, stderr: &str) -> String {
    const TAIL_LINES: usize = 3;
    let unparsed = |text: &str| -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && parse_diagnostic_line(l).is_none())
            .map(str::to_string)
            .collect()
    };
    let mut lines = unparsed(stderr);
    if lines.is_empty() {
        lines = unparsed(stdout);
    }
    if lines.is_empty() {
        return "no further output".to_string();
    }
    let skip = lines.len().saturating_sub(TAIL_LINES);
    lines[skip..].join("; ")
}

/// The `global using` file the SDK generates for `<ImplicitUsings>`:
/// [`IMPLICIT_USINGS`] with the project's `<Using>` items applied.
pub fn implicit_usings_source(items: &[UsingItem]) -> String {
    let mut directives: Vec<String> = IMPLICIT_USINGS
        .iter()
        .map(|ns| format!("global using global::{};", ns))
        .collect();
    let mut namespaces: Vec<String> = IMPLICIT_USINGS.iter().map(|s| s.to_string()).collect();
    for item in items {
        match item {
            UsingItem::Remove(namespace) => {
                if let Some(i) = namespaces.iter().position(|n| n == namespace) {
                    namespaces.remove(i);
                    directives.remove(i);
                }
            }
            UsingItem::Include {
                namespace,
                alias,
                is_static,
            } => {
                let directive = match (alias, is_static) {
                    (Some(alias), _) => format!("global using {} = global::{};", alias, namespace),
                    (None, true) => format!("global using static global::{};", namespace),
                    (None, false) => format!("global using global::{};", namespace),
                };
                namespaces.push(namespace.clone());
                directives.push(directive);
            }
        }
    }
    let mut source = String::from("// <auto-generated/>\n");
    for directive in directives {
        source.push_str(&directive);
        source.push('\n');
    }
    source
}

fn is_build_output(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && matches!(entry.file_name().to_str(), Some("bin") | Some("obj"))
}

/// Every `*.cs` file under `dir`, skipping `bin/` and `obj/`, sorted by path.
pub fn collect_sources(dir: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_build_output(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| p.extension().map_or(false, |ext| ext == "cs"))
        .collect();
    sources.sort();
    sources
}
