use citecheck_core::{Analysis, CheckStats};
use serde::Serialize;

/// Output format for a validation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

/// A finished analysis together with the name of the document it came from.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub document: &'a str,
    pub passed: bool,
    pub stats: CheckStats,
    #[serde(flatten)]
    pub analysis: &'a Analysis,
}

impl<'a> Report<'a> {
    pub fn new(document: &'a str, analysis: &'a Analysis) -> Self {
        Self {
            document,
            passed: analysis.passed(),
            stats: analysis.result.stats(),
            analysis,
        }
    }

    /// Process exit status: 0 when every citation was found, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.passed { 0 } else { 1 }
    }
}
