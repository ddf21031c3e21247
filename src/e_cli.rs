use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compile every project of a .NET solution and report the diagnostics.",
    long_about = None
)]
pub struct Cli {
    /// Path to the solution (.sln) file.
    pub solution: PathBuf,

    #[arg(long, short = 'c', help = "TOML configuration file.")]
    pub config: Option<PathBuf>,

    #[arg(
        long = "dotnet-root",
        help = ".NET installation root (default: located from `dotnet` on PATH)."
    )]
    pub dotnet_root: Option<PathBuf>,

    #[arg(long, help = "Path to csc.dll (default: newest installed SDK).")]
    pub compiler: Option<PathBuf>,

    #[arg(
        long = "no-skip-unrecognized",
        help = "Fail the solution load on projects that cannot be compiled."
    )]
    pub no_skip_unrecognized: bool,

    #[arg(long, help = "Print a summary table after the run.")]
    pub summary: bool,

    #[arg(long = "json-report", help = "Write per-project outcomes as JSON.")]
    pub json_report: Option<PathBuf>,

    /// Extra arguments passed to the compiler verbatim.
    #[arg(last = true)]
    pub extra: Vec<String>,
}
