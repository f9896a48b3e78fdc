use std::fmt::Write;

use citecheck_core::{Analysis, MatchKind, ReferenceEntry};

use crate::types::{ExportFormat, Report};

const WIDTH: usize = 70;

fn rule(out: &mut String, ch: char) {
    out.extend(std::iter::repeat_n(ch, WIDTH));
    out.push('\n');
}

fn section(out: &mut String, title: &str) {
    out.push('\n');
    rule(out, '-');
    out.push_str(title);
    out.push('\n');
    rule(out, '-');
}

fn entry_number(index: usize, entry: &ReferenceEntry) -> String {
    entry
        .label
        .map_or_else(|| (index + 1).to_string(), |label| label.to_string())
}

fn kind_label(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Exact => "exact",
        MatchKind::Fallback => "fallback",
        MatchKind::Number => "number",
    }
}

/// Render the plain-text validation report.
///
/// The output depends only on its inputs, so the same document always
/// produces the same bytes.
pub fn render_text(document: &str, analysis: &Analysis) -> String {
    let report = Report::new(document, analysis);
    let result = &analysis.result;
    let mut out = String::new();

    rule(&mut out, '=');
    out.push_str("CITATION VALIDATION REPORT\n");
    rule(&mut out, '=');
    out.push('\n');

    let _ = writeln!(out, "Document: {}", report.document);
    let _ = writeln!(out, "Total inline citations: {}", report.stats.citations);
    let _ = writeln!(out, "Total reference entries: {}", report.stats.entries);
    let _ = writeln!(out, "Missing references: {}", report.stats.missing);
    match &analysis.section {
        Some(s) => {
            let _ = writeln!(
                out,
                "Reference section: \"{}\" (lines {}-{})",
                s.heading, s.heading_line, s.end_line
            );
        }
        None => out.push_str("WARNING: No reference section found\n"),
    }

    if !analysis.warnings.is_empty() || !analysis.conversion_warnings.is_empty() {
        section(&mut out, "WARNINGS:");
        for warning in &analysis.warnings {
            let _ = writeln!(out, "  ! {warning}");
        }
        for warning in &analysis.conversion_warnings {
            let _ = writeln!(out, "  ! conversion: {warning}");
        }
    }

    if !analysis.citations.is_empty() {
        section(&mut out, "INLINE CITATIONS FOUND:");
        for citation in &analysis.citations {
            let _ = write!(out, "  • {} (line {}", citation.display, citation.line);
            if citation.occurrences > 1 {
                let _ = write!(out, ", {} occurrences", citation.occurrences);
            }
            out.push_str(")\n");
        }
    }

    if !result.matched.is_empty() {
        section(&mut out, "MATCHED CITATIONS:");
        for m in &result.matched {
            let entry = &result.entries[m.entry];
            let _ = writeln!(
                out,
                "  ✓ {} -> entry {} [{}]",
                m.citation.display,
                entry_number(m.entry, entry),
                kind_label(m.kind)
            );
        }
    }

    if !result.missing.is_empty() {
        section(&mut out, "⚠ MISSING REFERENCES (not found in reference list):");
        for citation in &result.missing {
            let _ = writeln!(out, "  ✗ {}", citation.display);
        }
    }

    if !result.entries.is_empty() {
        section(&mut out, "REFERENCE LIST ENTRIES:");
        for (i, entry) in result.entries.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", entry_number(i, entry), entry.text);
        }
    }

    out.push('\n');
    rule(&mut out, '=');
    if report.passed {
        out.push_str("✓ VALIDATION PASSED: All inline citations are accounted for\n");
    } else {
        out.push_str("✗ VALIDATION FAILED: Some inline citations are missing\n");
    }
    rule(&mut out, '=');

    out
}

/// Serialize the analysis as pretty-printed JSON.
pub fn export_json(document: &str, analysis: &Analysis) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Report::new(document, analysis))
}

/// Render the report in the requested format.
pub fn export_results(
    document: &str,
    analysis: &Analysis,
    format: ExportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Text => Ok(render_text(document, analysis)),
        ExportFormat::Json => export_json(document, analysis),
    }
}
