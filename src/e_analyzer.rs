//! The solution compile driver.
//!
//! [`analyse`] loads a solution through a [`CompilerService`], compiles each
//! project in solution order and writes one line per visible diagnostic plus
//! one terminal line per project. Any failure inside a project (an error or a
//! panic in the backend) is confined to that project.

use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;

use crate::e_compiler::CompilerService;
use crate::e_diagnostics::{Compilation, Severity};
use crate::e_project::Project;
use crate::e_references::ReferenceSet;
use crate::e_types::{AnalyzerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Succeeded,
    /// At least one Error diagnostic.
    Failed,
    /// The compiler service produced no compilation.
    NotCompilable,
    /// The per-project step raised an error.
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectOutcome {
    pub name: String,
    pub status: OutcomeStatus,
    pub target_framework: Option<String>,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    /// The error text for `Errored` outcomes.
    pub error: Option<String>,
}

impl ProjectOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub solution: String,
    pub outcomes: Vec<ProjectOutcome>,
}

impl AnalysisReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Report line output. Write failures (a closed pipe, say) do not stop the
/// run; the first one is logged.
struct ReportWriter<'a, W: Write + ?Sized> {
    out: &'a mut W,
    failed: bool,
}

impl<'a, W: Write + ?Sized> ReportWriter<'a, W> {
    fn new(out: &'a mut W) -> Self {
        ReportWriter { out, failed: false }
    }

    fn line(&mut self, line: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            self.report_failure(e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            self.report_failure(e);
        }
    }

    fn report_failure(&mut self, e: std::io::Error) {
        if !self.failed {
            log::warn!("report output is not writable, further lines are lost: {}", e);
            self.failed = true;
        }
    }
}

/// What the per-project step hands back to the driver on success.
struct StepResult {
    target_framework: String,
    compilation: Option<Compilation>,
}

/// Compiles every project of the solution at `path`, writing the report
/// lines to `out`.
///
/// Only a failure to prepare the service or to load the solution is
/// returned as an error; project-level failures are reported and counted.
pub fn analyse<S, W>(service: &mut S, path: &Path, out: &mut W) -> Result<AnalysisReport>
where
    S: CompilerService + ?Sized,
    W: Write + ?Sized,
{
    service.prepare()?;
    let mut out = ReportWriter::new(out);

    let solution = {
        let mut sink = |diag: &crate::e_solution::WorkspaceDiagnostic| {
            out.line(format_args!("Workspace diagnostic: {}", diag.message));
        };
        service.open_solution(path, &mut sink)?
    };
    log::info!(
        "analysing {} projects in {}",
        solution.projects.len(),
        path.display()
    );

    let mut report = AnalysisReport {
        solution: path.display().to_string(),
        outcomes: Vec::with_capacity(solution.projects.len()),
    };
    for project in solution.projects {
        let name = project.name.clone();
        let step = panic::catch_unwind(AssertUnwindSafe(|| {
            compile_project(&mut *service, project, &mut out)
        }))
        .unwrap_or_else(|payload| Err(AnalyzerError::Panic(panic_message(payload.as_ref()))));

        let outcome = match step {
            Ok(step) => {
                let outcome = outcome_for(&name, step);
                if outcome.succeeded() {
                    out.line(format_args!("Compilation succeeded for: {}", name));
                } else {
                    out.line(format_args!("Compilation failed for: {}", name));
                }
                outcome
            }
            Err(err) => {
                log::debug!("project {} errored: {}", name, err);
                let detail = format!("{:?}", anyhow::Error::new(err));
                out.line(format_args!("{}", detail));
                out.line(format_args!("Compilation failed for: {}", name));
                ProjectOutcome {
                    name,
                    status: OutcomeStatus::Errored,
                    target_framework: None,
                    errors: 0,
                    warnings: 0,
                    infos: 0,
                    error: Some(detail),
                }
            }
        };
        report.outcomes.push(outcome);
    }
    out.flush();
    Ok(report)
}

/// Resolves references for `project`, compiles it and prints its visible
/// diagnostics. The compilation is returned whether or not it has errors;
/// `None` means the service produced none.
fn compile_project<S, W>(
    service: &mut S,
    mut project: Project,
    out: &mut ReportWriter<'_, W>,
) -> Result<StepResult>
where
    S: CompilerService + ?Sized,
    W: Write + ?Sized,
{
    let target_framework = project.target_framework()?;
    let references = ReferenceSet::for_framework(&target_framework)?;
    project.attach_references(references);

    let Some(compilation) = service.compile(&project)? else {
        out.line(format_args!("Can not compile project: {}", project.name));
        return Ok(StepResult {
            target_framework,
            compilation: None,
        });
    };

    for diagnostic in compilation.visible_diagnostics() {
        out.line(format_args!(
            "Compilation diagnostic: [{}] {}",
            diagnostic.severity(),
            diagnostic.message()
        ));
    }
    Ok(StepResult {
        target_framework,
        compilation: Some(compilation),
    })
}

fn outcome_for(name: &str, step: StepResult) -> ProjectOutcome {
    let mut outcome = ProjectOutcome {
        name: name.to_string(),
        status: OutcomeStatus::NotCompilable,
        target_framework: Some(step.target_framework),
        errors: 0,
        warnings: 0,
        infos: 0,
        error: None,
    };
    if let Some(compilation) = step.compilation {
        for diagnostic in compilation.diagnostics() {
            match diagnostic.severity() {
                Severity::Error => outcome.errors += 1,
                Severity::Warning => outcome.warnings += 1,
                Severity::Info => outcome.infos += 1,
                Severity::Hidden => {}
            }
        }
        outcome.status = if compilation.has_errors() {
            OutcomeStatus::Failed
        } else {
            OutcomeStatus::Succeeded
        };
    }
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
