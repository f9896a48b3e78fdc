use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod citations;
pub mod matching;
pub mod references;
pub mod validate;

use serde::Serialize;

// Re-export for convenience
pub use citations::{CitationIdentity, CitationScan, InlineCitation, RuleHits, extract_citations};
pub use citecheck_docx::{Conversion, ConvertError};
pub use references::{
    DEFAULT_REFERENCE_HEADINGS, EntryKey, Heading, ReferenceEntry, ReferenceSection,
    extract_reference_list,
};
pub use validate::{CheckStats, CitationMatch, MatchKind, ValidationResult, validate};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot read {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("conversion error: {0}")]
    Conversion(#[from] ConvertError),
}

/// Configuration for a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Heading titles that mark the reference section (case-insensitive).
    pub reference_headings: Vec<String>,
    /// Also scan the reference section itself for inline citations.
    pub scan_reference_section: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_headings: DEFAULT_REFERENCE_HEADINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scan_reference_section: false,
        }
    }
}

impl Config {
    /// Add extra reference-section titles, skipping ones already present.
    pub fn add_headings<I, S>(&mut self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for title in titles {
            let title = title.into().trim().to_string();
            let known = self
                .reference_headings
                .iter()
                .any(|h| matching::normalize_key(h) == matching::normalize_key(&title));
            if !title.is_empty() && !known {
                self.reference_headings.push(title);
            }
        }
    }
}

/// Everything a single run derives from one document.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    #[serde(skip)]
    pub markdown: String,
    pub conversion_warnings: Vec<String>,
    /// Distinct inline citations in first-occurrence order.
    pub citations: Vec<InlineCitation>,
    pub rule_hits: Vec<RuleHits>,
    pub section: Option<ReferenceSection>,
    pub result: ValidationResult,
    /// Non-fatal findings, e.g. a missing reference section.
    pub warnings: Vec<String>,
    /// Titles the reference section was searched for.
    #[serde(skip)]
    pub searched_headings: Vec<String>,
}

impl Analysis {
    pub fn passed(&self) -> bool {
        self.result.passed()
    }

    /// All headings in the converted document.
    pub fn headings(&self) -> Vec<Heading> {
        references::headings(&self.markdown)
    }
}

/// Run extraction and validation over converted Markdown.
pub fn analyze(markdown: String, conversion_warnings: Vec<String>, config: &Config) -> Analysis {
    let section = extract_reference_list(&markdown, &config.reference_headings);

    let mut warnings = Vec::new();
    if section.is_none() {
        let warning = format!(
            "no reference section found (looked for headings: {})",
            config.reference_headings.join(", ")
        );
        log::warn!("{warning}");
        warnings.push(warning);
    }

    let excluded = section
        .as_ref()
        .filter(|_| !config.scan_reference_section)
        .map(ReferenceSection::line_range);
    let scan = extract_citations(&markdown, excluded);

    let entries = section
        .as_ref()
        .map(|s| s.entries.as_slice())
        .unwrap_or_default();
    if section.as_ref().is_some_and(|s| !s.is_numbered())
        && scan.citations.iter().any(InlineCitation::is_numeric)
    {
        warnings.push(
            "numeric citations found but the reference list is not numbered; they cannot be matched"
                .to_string(),
        );
    }
    let result = validate(&scan.citations, entries);

    Analysis {
        markdown,
        conversion_warnings,
        citations: scan.citations,
        rule_hits: scan.rule_hits,
        section,
        result,
        warnings,
        searched_headings: config.reference_headings.clone(),
    }
}

/// Convert document bytes and analyze them. `path` selects the converter.
pub fn check_bytes(path: &Path, bytes: &[u8], config: &Config) -> Result<Analysis, CoreError> {
    let converter = citecheck_docx::converter_for(path)?;
    let Conversion { markdown, warnings } = converter.convert(bytes)?;
    Ok(analyze(markdown, warnings, config))
}

/// Read, convert and validate a document.
///
/// Fails only when the file cannot be read or converted; a missing
/// reference section or missing citations are part of the [`Analysis`].
pub fn check_document(path: &Path, config: &Config) -> Result<Analysis, CoreError> {
    let bytes = std::fs::read(path).map_err(|source| CoreError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("read {} ({} bytes)", path.display(), bytes.len());
    check_bytes(path, &bytes, config)
}
