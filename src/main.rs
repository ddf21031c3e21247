//! # sln-analyzer
//!
//! Compiles every project of a .NET solution with the SDK's C# compiler and
//! prints one line per diagnostic and one outcome line per project.
//!
//! ```sh
//! sln-analyzer path/to/All.sln
//! sln-analyzer path/to/All.sln --summary -- -langversion:latest
//! ```

use anyhow::Context;
use clap::Parser;
use sln_analyzer::e_config::Config;
use sln_analyzer::e_reports;
use sln_analyzer::{analyse, Cli, CscCompilerService};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    log::debug!("CLI options: {:?}", cli);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let mut service = CscCompilerService::new(config.into_options(&cli));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = analyse(&mut service, &cli.solution, &mut out)
        .with_context(|| format!("failed to analyse {}", cli.solution.display()))?;
    drop(out);

    if cli.summary {
        println!("{}", e_reports::generate_summary(&report));
    }
    if let Some(path) = &cli.json_report {
        e_reports::write_json_report(&report, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(())
}
