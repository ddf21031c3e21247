//! Diagnostics and compilations as reported by the compiler backend.
//!
//! The compiler prints one diagnostic per line in the MSBuild-style format
//! `file(line,col): <severity> <ID>: <message>`; diagnostics that are not
//! tied to a source file drop the location prefix. [`parse_diagnostics`] turns
//! that output into [`Diagnostic`] values, keeping emission order.

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Diagnostic severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Hidden,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Maps the lowercase keyword used in compiler output to a severity.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "hidden" => Some(Severity::Hidden),
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Hidden => "Hidden",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Source position a diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    severity: Severity,
    message: String,
    pub id: Option<String>,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            id: None,
            location: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// The result of compiling one project: every diagnostic the compiler
/// reported, in the order it reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compilation {
    diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Compilation { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics worth showing to a user, i.e. everything but `Hidden`.
    pub fn visible_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() != Severity::Hidden)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

// The file part may itself contain parentheses; it ends at the first
// `(line,col)` that is followed by `: <level>`.
static DIAGNOSTIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?P<file>\S.*?)\((?P<line>\d+),(?P<col>\d+)(?:,\d+,\d+)?\)\s*:\s*)?(?P<level>hidden|info|warning|error)\s+(?P<id>[A-Za-z]+\d+)\s*:\s*(?P<msg>.*?)\s*$",
    )
    .expect("diagnostic regex")
});

/// Parses a single line of compiler output, returning `None` for lines that
/// are not diagnostics (banners, blank lines, progress output).
pub fn parse_diagnostic_line(line: &str) -> Option<Diagnostic> {
    let caps = DIAGNOSTIC_LINE.captures(line)?;
    let severity = Severity::from_keyword(&caps["level"])?;
    let mut diag = Diagnostic::new(severity, &caps["msg"]).with_id(&caps["id"]);
    if let Some(file) = caps.name("file") {
        let line = caps["line"].parse().unwrap_or(0);
        let column = caps["col"].parse().unwrap_or(0);
        diag = diag.with_location(Location {
            file: PathBuf::from(file.as_str().trim()),
            line,
            column,
        });
    }
    Some(diag)
}

/// Parses all diagnostics out of a block of compiler output.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output.lines().filter_map(parse_diagnostic_line).collect()
}
