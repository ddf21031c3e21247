use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::e_cli::Cli;
use crate::e_compiler::CscOptions;
use crate::e_locator::ToolchainOverrides;
use crate::e_types::{AnalyzerError, Result};

/// Contents of the optional `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub dotnet_root: Option<PathBuf>,
    pub compiler: Option<PathBuf>,
    pub skip_unrecognized_projects: Option<bool>,
    #[serde(default)]
    pub extra_compiler_args: Vec<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AnalyzerError::io(path, e))?;
        Self::parse(&content)
            .map_err(|e| AnalyzerError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merges the file with command line flags; flags win, extra compiler
    /// args are concatenated (file first).
    pub fn into_options(self, cli: &Cli) -> CscOptions {
        let skip = if cli.no_skip_unrecognized {
            false
        } else {
            self.skip_unrecognized_projects.unwrap_or(true)
        };
        let mut extra_args = self.extra_compiler_args;
        extra_args.extend(cli.extra.iter().cloned());
        CscOptions {
            toolchain: ToolchainOverrides {
                dotnet_root: cli.dotnet_root.clone().or(self.dotnet_root),
                compiler: cli.compiler.clone().or(self.compiler),
            },
            skip_unrecognized_projects: skip,
            extra_args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_full_config() {
        let config = Config::parse(
            r#"
dotnet_root = "/usr/share/dotnet"
skip_unrecognized_projects = false
extra_compiler_args = ["-langversion:latest"]
"#,
        )
        .unwrap();
        assert_eq!(config.dotnet_root, Some(PathBuf::from("/usr/share/dotnet")));
        assert_eq!(config.skip_unrecognized_projects, Some(false));
        assert!(config.compiler.is_none());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::parse("dotnet = \"x\"").is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let config = Config {
            dotnet_root: Some(PathBuf::from("/from/file")),
            compiler: Some(PathBuf::from("/from/file/csc.dll")),
            skip_unrecognized_projects: Some(true),
            extra_compiler_args: vec!["-warn:4".to_string()],
        };
        let cli = Cli::parse_from([
            "sln-analyzer",
            "All.sln",
            "--dotnet-root",
            "/from/cli",
            "--no-skip-unrecognized",
            "--",
            "-nowarn:CS1591",
        ]);
        let options = config.into_options(&cli);
        assert_eq!(options.toolchain.dotnet_root, Some(PathBuf::from("/from/cli")));
        assert_eq!(
            options.toolchain.compiler,
            Some(PathBuf::from("/from/file/csc.dll"))
        );
        assert!(!options.skip_unrecognized_projects);
        assert_eq!(options.extra_args, vec!["-warn:4", "-nowarn:CS1591"]);
    }

    #[test]
    fn defaults_skip_unrecognized() {
        let cli = Cli::parse_from(["sln-analyzer", "All.sln"]);
        assert!(Config::default().into_options(&cli).skip_unrecognized_projects);
    }
}
