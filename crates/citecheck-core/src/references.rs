//! Reference-list extraction.
//!
//! The bibliography is the first Markdown heading whose title is one of the
//! configured reference-section titles. It runs until the next heading of
//! the same or a higher level; every non-blank line in between is one entry.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::matching::{NAME_WORD_RE, YEAR_RE, normalize_key};

/// Section titles recognised out of the box.
pub const DEFAULT_REFERENCE_HEADINGS: &[&str] = &[
    "References",
    "Reference",
    "Bibliography",
    "Works Cited",
    "Literature Cited",
];

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").unwrap());
/// `1.`, `1)`, `[1]` and the escaped `1\.` some converters emit.
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\[(\d{1,3})\]|(\d{1,3})\\?[.)])\s*").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+").unwrap());

/// An ATX heading: level and title text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: usize,
    pub title: String,
    /// 1-based line number.
    pub line: usize,
}

/// Parse a Markdown ATX heading line.
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();
    Some((level, title.to_string()))
}

/// All headings of a document, in order.
pub fn headings(text: &str) -> Vec<Heading> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            parse_heading(line).map(|(level, title)| Heading {
                level,
                title,
                line: i + 1,
            })
        })
        .collect()
}

/// Strip emphasis markers and trailing colons so `**References:**` compares
/// as `References`.
fn clean_title(title: &str) -> String {
    let trimmed = title
        .trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .trim_end_matches([':', '.'])
        .trim();
    normalize_key(trimmed)
}

/// Whether a heading title names a reference section.
pub fn is_reference_heading(title: &str, headings: &[String]) -> bool {
    let title = clean_title(title);
    !title.is_empty() && headings.iter().any(|h| normalize_key(h) == title)
}

/// Normalized identity of a reference entry: leading surname and first year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EntryKey {
    pub surname: Option<String>,
    pub year: Option<String>,
}

impl EntryKey {
    /// Key from entry text with its label already removed.
    pub fn from_text(text: &str) -> Self {
        let year = YEAR_RE.find(text);
        let prefix = match year {
            Some(m) => &text[..m.start()],
            None => text,
        };
        Self {
            surname: NAME_WORD_RE.find(prefix).map(|m| normalize_key(m.as_str())),
            year: year.map(|m| m.as_str().to_lowercase()),
        }
    }
}

/// One bibliography item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    /// The line as written, label included.
    pub raw: String,
    /// Leading number label (`1.`, `[1]`), when the list is numbered.
    pub label: Option<u32>,
    /// Entry text without label or bullet marker.
    pub text: String,
    /// 1-based line number.
    pub line: usize,
    pub key: EntryKey,
}

impl ReferenceEntry {
    pub fn parse(line: &str, line_number: usize) -> Self {
        let raw = line.trim().to_string();
        let unbulleted = BULLET_RE
            .find(&raw)
            .map_or(raw.as_str(), |m| &raw[m.end()..]);

        let (label, text) = match LABEL_RE.captures(unbulleted) {
            Some(caps) => {
                let number = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|m| m.as_str().parse::<u32>().ok());
                let rest = caps.get(0).map_or(unbulleted, |m| &unbulleted[m.end()..]);
                (number, rest)
            }
            None => (None, unbulleted),
        };

        let text = text.trim().to_string();
        let key = EntryKey::from_text(&text);
        Self {
            raw,
            label,
            text,
            line: line_number,
            key,
        }
    }
}

/// The located bibliography and its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSection {
    /// Heading title as written.
    pub heading: String,
    pub level: usize,
    /// 1-based line of the heading.
    pub heading_line: usize,
    /// 1-based line of the last line belonging to the section.
    pub end_line: usize,
    pub entries: Vec<ReferenceEntry>,
}

impl ReferenceSection {
    /// 0-based, end-exclusive line range covering heading and body.
    pub fn line_range(&self) -> Range<usize> {
        (self.heading_line - 1)..self.end_line
    }

    pub fn is_numbered(&self) -> bool {
        self.entries.iter().any(|e| e.label.is_some())
    }
}

/// Locate the bibliography section and split it into entries.
///
/// Returns `None` when no heading matches; the first matching heading wins.
pub fn extract_reference_list(text: &str, titles: &[String]) -> Option<ReferenceSection> {
    let lines: Vec<&str> = text.lines().collect();

    let (start, level, heading) = lines.iter().enumerate().find_map(|(i, line)| {
        let (level, title) = parse_heading(line)?;
        is_reference_heading(&title, titles).then_some((i, level, title))
    })?;
    log::debug!(
        "reference section '{heading}' at line {} (level {level})",
        start + 1
    );

    let mut end = lines.len();
    let mut entries = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if let Some((next_level, _)) = parse_heading(line) {
            if next_level <= level {
                end = i;
                break;
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        entries.push(ReferenceEntry::parse(line, i + 1));
    }

    Some(ReferenceSection {
        heading,
        level,
        heading_line: start + 1,
        end_line: end,
        entries,
    })
}
