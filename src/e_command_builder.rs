use std::path::{Path, PathBuf};
use std::process::Command;

use crate::e_locator::Toolchain;
use crate::e_project::{OutputKind, ProjectProperties};
use crate::e_references::ReferenceAssembly;

/// A builder that constructs a C# compiler command for one project.
///
/// The compiler is run through the `dotnet` host (`dotnet csc.dll <args>`),
/// so `build` returns only the arguments following `csc.dll`.
#[derive(Debug, Clone, Default)]
pub struct CscCommandBuilder {
    args: Vec<String>,
    sources: Vec<PathBuf>,
}

impl CscCommandBuilder {
    /// Creates a builder with the flags every compilation uses: no banner,
    /// no implicit `csc.rsp`, and no implicit mscorlib, so only the attached
    /// reference set is visible to the compiler.
    pub fn new() -> Self {
        CscCommandBuilder {
            args: vec![
                "-nologo".into(),
                "-noconfig".into(),
                "-nostdlib+".into(),
                "-fullpaths".into(),
                "-utf8output".into(),
                "-target:library".into(),
                "-deterministic+".into(),
            ],
            sources: Vec::new(),
        }
    }

    pub fn with_assembly_name(mut self, name: &str) -> Self {
        self.args.push(format!("-out:{}.dll", name));
        self
    }

    /// Replaces the default `-target:library`.
    pub fn with_target(mut self, kind: OutputKind) -> Self {
        self.args.retain(|a| !a.starts_with("-target:"));
        self.args.push(format!("-target:{}", kind.csc_target()));
        self
    }

    /// Maps the descriptor's compile properties to their compiler options.
    pub fn with_project_properties(mut self, props: &ProjectProperties) -> Self {
        self = self.with_target(props.output_kind);
        if let Some(nullable) = &props.nullable {
            self.args.push(format!("-nullable:{}", nullable));
        }
        if let Some(lang_version) = &props.lang_version {
            self.args.push(format!("-langversion:{}", lang_version));
        }
        if props.allow_unsafe_blocks {
            self.args.push("-unsafe+".into());
        }
        if props.warnings_as_errors {
            self.args.push("-warnaserror+".into());
        }
        if !props.no_warn.is_empty() {
            self.args.push(format!("-nowarn:{}", props.no_warn.join(",")));
        }
        self
    }

    /// Adds the preprocessor symbols, e.g. `NET6_0_OR_GREATER`.
    pub fn with_defines(mut self, defines: &[String]) -> Self {
        if !defines.is_empty() {
            self.args.push(format!("-define:{}", defines.join(";")));
        }
        self
    }

    /// Sets the output assembly path; overrides `with_assembly_name`.
    pub fn with_output(mut self, output: &Path) -> Self {
        self.args.retain(|a| !a.starts_with("-out:"));
        self.args.push(format!("-out:{}", output.display()));
        self
    }

    pub fn with_references(mut self, references: &[ReferenceAssembly]) -> Self {
        for reference in references {
            self.args
                .push(format!("-reference:{}", reference.path.display()));
        }
        self
    }

    pub fn with_sources(mut self, sources: &[PathBuf]) -> Self {
        self.sources.extend(sources.iter().cloned());
        self
    }

    /// Appends extra compiler arguments verbatim.
    pub fn with_extra_args(mut self, extra: &[String]) -> Self {
        self.args.extend(extra.iter().cloned());
        self
    }

    /// Builds the final vector of compiler arguments, sources last.
    pub fn build(self) -> Vec<String> {
        let mut args = self.args;
        args.extend(self.sources.iter().map(|s| s.display().to_string()));
        args
    }

    /// Builds a `std::process::Command` running the compiler through the
    /// toolchain's `dotnet` host.
    pub fn build_command(self, toolchain: &Toolchain) -> Command {
        let mut cmd = Command::new(&toolchain.dotnet);
        cmd.arg(&toolchain.compiler);
        cmd.args(self.build());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_csc() {
        let refs = vec![ReferenceAssembly {
            name: "System.Runtime".to_string(),
            path: PathBuf::from("/dotnet/packs/ref/System.Runtime.dll"),
        }];
        let args = CscCommandBuilder::new()
            .with_assembly_name("App")
            .with_output(Path::new("/tmp/out/App.dll"))
            .with_references(&refs)
            .with_sources(&[PathBuf::from("App/Program.cs")])
            .with_extra_args(&["-langversion:latest".to_string()])
            .build();

        assert!(args.contains(&"-nologo".to_string()));
        assert!(args.contains(&"-nostdlib+".to_string()));
        assert!(args.contains(&"-out:/tmp/out/App.dll".to_string()));
        assert!(!args.contains(&"-out:App.dll".to_string()));
        assert!(args.contains(&"-reference:/dotnet/packs/ref/System.Runtime.dll".to_string()));
        assert!(args.contains(&"-langversion:latest".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("App/Program.cs"));
    }

    #[test]
    fn project_properties_become_compiler_options() {
        let props = ProjectProperties::parse(
            r#"<Project Sdk="Microsoft.NET.Sdk"><PropertyGroup>
                 <OutputType>WinExe</OutputType>
                 <Nullable>enable</Nullable>
                 <LangVersion>10.0</LangVersion>
                 <AllowUnsafeBlocks>true</AllowUnsafeBlocks>
                 <TreatWarningsAsErrors>true</TreatWarningsAsErrors>
                 <NoWarn>CS1591;CS0168</NoWarn>
               </PropertyGroup></Project>"#,
        );
        let args = CscCommandBuilder::new()
            .with_project_properties(&props)
            .with_defines(&["NET".to_string(), "NET6_0_OR_GREATER".to_string()])
            .build();

        assert!(args.contains(&"-target:winexe".to_string()));
        assert!(!args.contains(&"-target:library".to_string()));
        assert!(args.contains(&"-nullable:enable".to_string()));
        assert!(args.contains(&"-langversion:10.0".to_string()));
        assert!(args.contains(&"-unsafe+".to_string()));
        assert!(args.contains(&"-warnaserror+".to_string()));
        assert!(args.contains(&"-nowarn:CS1591,CS0168".to_string()));
        assert!(args.contains(&"-define:NET;NET6_0_OR_GREATER".to_string()));
    }

    #[test]
    fn library_is_the_default_target() {
        let args = CscCommandBuilder::new()
            .with_project_properties(&ProjectProperties::default())
            .with_defines(&[])
            .build();
        assert_eq!(args.iter().filter(|a| a.starts_with("-target:")).count(), 1);
        assert!(args.contains(&"-target:library".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-define:")));
        assert!(!args.iter().any(|a| a.starts_with("-nullable:")));
    }

    #[test]
    fn command_runs_through_dotnet_host() {
        let toolchain = Toolchain {
            dotnet_root: PathBuf::from("/dotnet"),
            dotnet: PathBuf::from("/dotnet/dotnet"),
            compiler: PathBuf::from("/dotnet/sdk/8.0.100/Roslyn/bincore/csc.dll"),
        };
        let cmd = CscCommandBuilder::new().build_command(&toolchain);
        assert_eq!(cmd.get_program(), "/dotnet/dotnet");
        let first = cmd.get_args().next().unwrap();
        assert_eq!(first, "/dotnet/sdk/8.0.100/Roslyn/bincore/csc.dll");
    }
}
