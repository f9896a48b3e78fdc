//! Reconciles inline citations with reference-list entries.

use serde::Serialize;

use crate::citations::{CitationIdentity, InlineCitation};
use crate::matching::{contains_folded, normalize_key};
use crate::references::ReferenceEntry;

/// How a citation was tied to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    /// First surname and year equal the entry key.
    Exact,
    /// Every surname occurs in the entry text and the year appears verbatim.
    Fallback,
    /// Numeric citation equal to the entry's list label.
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationMatch {
    pub citation: InlineCitation,
    /// Index into [`ValidationResult::entries`].
    pub entry: usize,
    pub kind: MatchKind,
}

/// Summary counts for a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    pub citations: usize,
    pub entries: usize,
    pub matched: usize,
    pub missing: usize,
    pub exact: usize,
    pub fallback: usize,
    pub numeric: usize,
}

/// Partition of the extracted citations into matched and missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Matched citations in first-occurrence order.
    pub matched: Vec<CitationMatch>,
    /// Citations without any entry, in first-occurrence order.
    pub missing: Vec<InlineCitation>,
    /// All reference entries in document order.
    pub entries: Vec<ReferenceEntry>,
}

impl ValidationResult {
    /// True when every inline citation has an entry.
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn total_citations(&self) -> usize {
        self.matched.len() + self.missing.len()
    }

    pub fn stats(&self) -> CheckStats {
        let count = |kind: MatchKind| self.matched.iter().filter(|m| m.kind == kind).count();
        CheckStats {
            citations: self.total_citations(),
            entries: self.entries.len(),
            matched: self.matched.len(),
            missing: self.missing.len(),
            exact: count(MatchKind::Exact),
            fallback: count(MatchKind::Fallback),
            numeric: count(MatchKind::Number),
        }
    }
}

/// Validate citations against entries.
///
/// Each citation lands in exactly one of `matched` / `missing`.
pub fn validate(citations: &[InlineCitation], entries: &[ReferenceEntry]) -> ValidationResult {
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for citation in citations {
        match match_citation(citation, entries) {
            Some((entry, kind)) => {
                log::debug!(
                    "{} matched entry {} ({kind:?})",
                    citation.display,
                    entry + 1
                );
                matched.push(CitationMatch {
                    citation: citation.clone(),
                    entry,
                    kind,
                });
            }
            None => missing.push(citation.clone()),
        }
    }

    ValidationResult {
        matched,
        missing,
        entries: entries.to_vec(),
    }
}

/// Find the entry a citation refers to.
///
/// Exact identity matches win over fallback matches anywhere in the list;
/// among equals the first entry in document order wins.
pub fn match_citation(
    citation: &InlineCitation,
    entries: &[ReferenceEntry],
) -> Option<(usize, MatchKind)> {
    match &citation.identity {
        CitationIdentity::Numeric { number } => entries
            .iter()
            .position(|e| e.label == Some(*number))
            .map(|i| (i, MatchKind::Number)),
        CitationIdentity::AuthorYear { surnames, year, .. } => {
            let first = surnames.first().map(|s| normalize_key(s));
            let exact = entries.iter().position(|e| {
                first.is_some()
                    && e.key.surname == first
                    && e.key.year.as_deref() == Some(year.as_str())
            });
            if let Some(i) = exact {
                return Some((i, MatchKind::Exact));
            }
            entries
                .iter()
                .position(|e| {
                    e.raw.contains(year.as_str())
                        && surnames.iter().all(|s| contains_folded(&e.raw, s))
                })
                .map(|i| (i, MatchKind::Fallback))
        }
    }
}
