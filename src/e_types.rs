use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading a solution or compiling one of
/// its projects.
///
/// Project-level variants are caught by the driver's per-project boundary and
/// turned into a `Compilation failed for: <name>` line; they never abort the
/// whole run.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid solution file {}: {message}", .path.display())]
    SolutionFormat { path: PathBuf, message: String },

    #[error("Unrecognized project {}: {reason}", .path.display())]
    UnrecognizedProject { path: PathBuf, reason: String },

    #[error("No TargetFramework element found in {}", .0.display())]
    MissingTargetFramework(PathBuf),

    #[error("Unsupported target framework: {0}")]
    UnsupportedTargetFramework(String),

    #[error("Targeting pack {pack} {band}.x is not installed under {}", .root.display())]
    MissingTargetingPack {
        pack: String,
        band: String,
        root: PathBuf,
    },

    #[error("Project {0} has no reference set attached")]
    ReferencesNotAttached(String),

    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compiler backend panicked: {0}")]
    Panic(String),
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;
