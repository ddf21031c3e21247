use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use comfy_table::{Cell, ContentArrangement, Row, Table};

use crate::e_analyzer::{AnalysisReport, OutcomeStatus};

fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Succeeded => "succeeded",
        OutcomeStatus::Failed => "failed",
        OutcomeStatus::NotCompilable => "not compilable",
        OutcomeStatus::Errored => "error",
    }
}

/// Renders the run as a table: one row per project, then a totals line.
pub fn generate_summary(report: &AnalysisReport) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(100);
    table.set_header(Row::from(vec![
        Cell::new("Project"),
        Cell::new("Framework"),
        Cell::new("Result"),
        Cell::new("Errors"),
        Cell::new("Warnings"),
        Cell::new("Info"),
    ]));
    for outcome in &report.outcomes {
        table.add_row(Row::from(vec![
            Cell::new(&outcome.name),
            Cell::new(outcome.target_framework.as_deref().unwrap_or("-")),
            Cell::new(status_label(outcome.status)),
            Cell::new(outcome.errors),
            Cell::new(outcome.warnings),
            Cell::new(outcome.infos),
        ]));
    }

    let mut summary = format!("Solution: {}\n", report.solution);
    summary.push_str(&table.to_string());
    summary.push_str(&format!(
        "\n{} project(s): {} succeeded, {} failed\n",
        report.outcomes.len(),
        report.succeeded(),
        report.failed()
    ));
    summary
}

pub fn write_json_report(report: &AnalysisReport, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer_pretty(&mut file, report)?;
    file.write_all(b"\n")?;
    Ok(())
}
