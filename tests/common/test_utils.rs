#![allow(dead_code)]
use std::collections::HashMap;
use std::fs;
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};

use sln_analyzer::e_solution::{self, Solution, WorkspaceDiagnostic};
use sln_analyzer::{AnalyzerError, Compilation, CompilerService, Diagnostic, Project};
use tempfile::{tempdir, TempDir};

const CSHARP_PROJECT_TYPE: &str = "FAE04EC0-301F-11D3-BF4B-00C04F79EFBC";

/// A throw-away solution on disk. Dropping it removes the directory.
pub struct TestSolution {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestSolution {
    /// Creates `name.sln` with one C# project per `(project, target framework)`
    /// pair, in the given order. Each project gets a `Class1.cs`.
    pub fn new(name: &str, projects: &[(&str, &str)]) -> IoResult<Self> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        let mut sln = String::from(
            "Microsoft Visual Studio Solution File, Format Version 12.00\n# Visual Studio Version 17\n",
        );
        for (i, (project, tfm)) in projects.iter().enumerate() {
            let dir = root.join(project);
            fs::create_dir_all(&dir)?;
            fs::write(
                dir.join(format!("{}.csproj", project)),
                format!(
                    "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <TargetFramework>{}</TargetFramework>\n  </PropertyGroup>\n</Project>\n",
                    tfm
                ),
            )?;
            fs::write(
                dir.join("Class1.cs"),
                format!("namespace {0};\npublic class Class1 {{ }}\n", project),
            )?;
            sln.push_str(&format!(
                "Project(\"{{{}}}\") = \"{}\", \"{}\\{}.csproj\", \"{{00000000-0000-0000-0000-{:012}}}\"\nEndProject\n",
                CSHARP_PROJECT_TYPE, project, project, project, i
            ));
        }
        sln.push_str("Global\nEndGlobal\n");
        let path = root.join(format!("{}.sln", name));
        fs::write(&path, sln)?;
        Ok(TestSolution { temp_dir, path })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Appends a raw `Project(...)` entry to the solution file.
    pub fn add_entry(&self, type_guid: &str, name: &str, relative_path: &str) -> IoResult<()> {
        let content = fs::read_to_string(&self.path)?;
        let entry = format!(
            "Project(\"{{{}}}\") = \"{}\", \"{}\", \"{{99999999-0000-0000-0000-000000000000}}\"\nEndProject\n",
            type_guid, name, relative_path
        );
        let content = content.replacen("Global\n", &format!("{}Global\n", entry), 1);
        fs::write(&self.path, content)
    }
}

/// What the fake compiler does for one project.
#[derive(Debug, Clone)]
pub enum FakeResult {
    Compiled(Vec<Diagnostic>),
    NoCompilation,
    Fail(String),
    Panic(String),
}

/// A compiler service that loads real solution files but returns scripted
/// compilations.
#[derive(Debug, Default)]
pub struct FakeCompiler {
    pub results: HashMap<String, FakeResult>,
    pub prepared: usize,
    /// `(project name, attached framework)` for every compile request.
    pub compiled: Vec<(String, String)>,
    /// Extra workspace diagnostics emitted at load time.
    pub load_messages: Vec<String>,
}

impl FakeCompiler {
    pub fn with(mut self, project: &str, result: FakeResult) -> Self {
        self.results.insert(project.to_string(), result);
        self
    }
}

impl CompilerService for FakeCompiler {
    fn prepare(&mut self) -> Result<(), AnalyzerError> {
        self.prepared += 1;
        Ok(())
    }

    fn open_solution(
        &mut self,
        path: &Path,
        sink: &mut dyn FnMut(&WorkspaceDiagnostic),
    ) -> Result<Solution, AnalyzerError> {
        for message in &self.load_messages {
            sink(&WorkspaceDiagnostic::new(message.clone()));
        }
        e_solution::load_solution(path, true, sink)
    }

    fn compile(&mut self, project: &Project) -> Result<Option<Compilation>, AnalyzerError> {
        let framework = project
            .references()
            .map(|r| r.moniker().to_string())
            .unwrap_or_default();
        self.compiled.push((project.name.clone(), framework));
        match self
            .results
            .get(&project.name)
            .cloned()
            .unwrap_or(FakeResult::Compiled(Vec::new()))
        {
            FakeResult::Compiled(diagnostics) => Ok(Some(Compilation::new(diagnostics))),
            FakeResult::NoCompilation => Ok(None),
            FakeResult::Fail(message) => Err(AnalyzerError::Toolchain(message)),
            FakeResult::Panic(message) => panic!("{}", message),
        }
    }
}

/// Output lines of a run, for order-sensitive assertions.
pub fn lines(output: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(output)
        .lines()
        .map(str::to_string)
        .collect()
}
