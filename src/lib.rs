#![doc = include_str!("../README.md")]

pub mod e_analyzer;
pub use e_analyzer::{analyse, AnalysisReport, OutcomeStatus, ProjectOutcome};
pub mod e_cli;
pub use e_cli::Cli;
pub mod e_command_builder;
pub mod e_compiler;
pub use e_compiler::{CompilerService, CscCompilerService, CscOptions};
pub mod e_config;
pub mod e_diagnostics;
pub use e_diagnostics::{Compilation, Diagnostic, Severity};
pub mod e_locator;
pub mod e_project;
pub use e_project::{OutputKind, Project, ProjectProperties};
pub mod e_references;
pub mod e_reports;
pub mod e_solution;
pub use e_solution::{Solution, WorkspaceDiagnostic};
pub mod e_types;
pub use e_types::AnalyzerError;
