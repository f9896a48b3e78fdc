//! Inline citation extraction.
//!
//! Citations are recognised by an ordered list of named [`CitationRule`]s.
//! Every rule runs over the whole text independently; matches are then put
//! in document order and collapsed by normalized identity, so overlapping
//! rules never produce duplicates.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::matching::{collapse_whitespace, normalize_key, strip_emphasis};

/// Author surname: uppercase initial, then letters, apostrophes or hyphens.
const NAME: &str = r"\p{Lu}[\p{L}'’\-]+";
const YEAR: &str = r"\d{4}[a-z]?";
/// One to three digits, optionally grouped: `1`, `1,2`, `3-5`, `1, 4–6`.
const NUMBERS: &str = r"\d{1,3}(?:\s*[,\x{2013}-]\s*\d{1,3})*";
/// Wider ranges keep only their endpoints.
const MAX_RANGE: u32 = 100;

/// Which identity space a rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Numeric,
    AuthorYear,
}

/// One named citation pattern. Capture group 1 is the citation body
/// without its delimiters.
#[derive(Debug)]
pub struct CitationRule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub example: &'static str,
    regex: Regex,
}

impl CitationRule {
    fn new(name: &'static str, kind: RuleKind, example: &'static str, pattern: &str) -> Self {
        Self {
            name,
            kind,
            example,
            regex: Regex::new(pattern).unwrap(),
        }
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Normalize one match of this rule into its identities. A grouped
    /// numeric citation such as `[1,3-5]` names several entries.
    fn identities(&self, body: &str) -> Vec<CitationIdentity> {
        match self.kind {
            RuleKind::Numeric => expand_numbers(body)
                .into_iter()
                .map(|number| CitationIdentity::Numeric { number })
                .collect(),
            RuleKind::AuthorYear => normalize_author_year(body).into_iter().collect(),
        }
    }
}

/// Expand `1, 3-5` into `[1, 3, 4, 5]`.
fn expand_numbers(body: &str) -> Vec<u32> {
    let mut numbers = Vec::new();
    for part in body.split(',') {
        let mut ends = part
            .split(['-', '\u{2013}'])
            .map(|n| n.trim().parse::<u32>());
        match (ends.next(), ends.next()) {
            (Some(Ok(a)), None) => numbers.push(a),
            (Some(Ok(a)), Some(Ok(b))) if a <= b && b - a <= MAX_RANGE => {
                numbers.extend(a..=b)
            }
            (Some(Ok(a)), Some(Ok(b))) => numbers.extend([a, b]),
            _ => {}
        }
    }
    numbers
}

static RULES: Lazy<Vec<CitationRule>> = Lazy::new(|| {
    vec![
        CitationRule::new(
            "numeric-bracket",
            RuleKind::Numeric,
            "[12]",
            &format!(r"\[({NUMBERS})\]"),
        ),
        CitationRule::new(
            "numeric-superscript",
            RuleKind::Numeric,
            "^3",
            &format!(r"\^({NUMBERS})\b"),
        ),
        CitationRule::new(
            "numeric-paren",
            RuleKind::Numeric,
            "(4)",
            r"\((\d{1,3})\)",
        ),
        CitationRule::new(
            "author-year-paren",
            RuleKind::AuthorYear,
            "(Smith et al., 2020)",
            &format!(r"\(({NAME}(?:\s+et\s+al\.?)?[,\s]+{YEAR})\)"),
        ),
        CitationRule::new(
            "author-year-bracket",
            RuleKind::AuthorYear,
            "[Smith, 2020]",
            &format!(r"\[({NAME}(?:\s+et\s+al\.?)?[,\s]+{YEAR})\]"),
        ),
        CitationRule::new(
            "two-authors-and",
            RuleKind::AuthorYear,
            "(Jones and Brown, 2019)",
            &format!(r"\(({NAME}\s+and\s+{NAME}[,\s]+{YEAR})\)"),
        ),
        CitationRule::new(
            "two-authors-ampersand",
            RuleKind::AuthorYear,
            "(Jones & Brown, 2019)",
            &format!(r"\(({NAME}\s*&\s*{NAME}[,\s]+{YEAR})\)"),
        ),
        CitationRule::new(
            "many-authors",
            RuleKind::AuthorYear,
            "(Adams, Baker, and Clark, 2017)",
            &format!(r"\(({NAME}(?:,\s*{NAME})+,?\s+(?:and|&)\s+{NAME}[,\s]+{YEAR})\)"),
        ),
        CitationRule::new(
            "author-initials",
            RuleKind::AuthorYear,
            "(Smith J., 2020)",
            &format!(r"\(({NAME}\s+\p{{Lu}}\.(?:\s*\p{{Lu}}\.)*[,\s]+{YEAR})\)"),
        ),
    ]
});

/// The citation rules in the order they are applied.
pub fn rules() -> &'static [CitationRule] {
    &RULES
}

static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"[,\s]*({YEAR})$")).unwrap());
static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bet\s+al\b\.?").unwrap());
static CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+|\s*&\s*").unwrap());

/// Normalized identity of an inline citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CitationIdentity {
    Numeric {
        number: u32,
    },
    AuthorYear {
        /// Author part as displayed: `Smith et al.`, `Jones & Brown`.
        authors: String,
        /// Surnames named in the citation, in order.
        surnames: Vec<String>,
        year: String,
    },
}

impl CitationIdentity {
    /// Human-readable identity, e.g. `Smith, 2020` or `[12]`.
    pub fn display(&self) -> String {
        match self {
            Self::Numeric { number } => format!("[{number}]"),
            Self::AuthorYear { authors, year, .. } => format!("{authors}, {year}"),
        }
    }

    /// Comparison key: case- and accent-insensitive.
    pub fn key(&self) -> String {
        match self {
            Self::Numeric { number } => format!("#{number}"),
            Self::AuthorYear { .. } => normalize_key(&self.display()),
        }
    }
}

/// Turn the body of an author-year match (`Smith  et al 2020`) into its
/// identity (`Smith et al.`, `2020`).
pub fn normalize_author_year(body: &str) -> Option<CitationIdentity> {
    let body = collapse_whitespace(body);
    let caps = TRAILING_YEAR_RE.captures(&body)?;
    let year = caps[1].to_lowercase();
    let author_end = caps.get(0)?.start();

    let authors = ET_AL_RE.replace_all(&body[..author_end], "et al.");
    let authors = CONNECTOR_RE.replace_all(&authors, " & ");
    let authors = collapse_whitespace(&authors)
        .trim_end_matches([',', ';', ':'])
        .trim()
        .to_string();

    let surnames: Vec<String> = authors
        .split([',', '&'])
        .filter_map(|segment| {
            let segment = segment.trim().trim_end_matches("et al.").trim();
            let word = segment.split_whitespace().next()?;
            let is_name = word.chars().count() > 1
                && word.chars().next().is_some_and(char::is_uppercase)
                && !word.ends_with('.');
            is_name.then(|| word.to_string())
        })
        .collect();

    if authors.is_empty() || surnames.is_empty() {
        return None;
    }
    Some(CitationIdentity::AuthorYear {
        authors,
        surnames,
        year,
    })
}

/// One distinct inline citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineCitation {
    pub identity: CitationIdentity,
    pub display: String,
    /// The first matched text, delimiters included.
    pub raw: String,
    /// Name of the rule that produced the first occurrence.
    pub rule: &'static str,
    /// 1-based line of the first occurrence.
    pub line: usize,
    pub occurrences: usize,
}

impl InlineCitation {
    pub fn is_numeric(&self) -> bool {
        matches!(self.identity, CitationIdentity::Numeric { .. })
    }
}

/// Number of matches a rule contributed (before deduplication).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHits {
    pub rule: &'static str,
    pub count: usize,
}

/// Result of scanning a document for inline citations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationScan {
    /// Distinct citations in first-occurrence order.
    pub citations: Vec<InlineCitation>,
    /// Hit counts in rule order.
    pub rule_hits: Vec<RuleHits>,
}

struct Hit {
    offset: usize,
    rule_index: usize,
    citation: InlineCitation,
}

/// Scan `text` for inline citations.
///
/// Lines in `excluded_lines` (0-based, end exclusive) are skipped; this is
/// how the bibliography keeps its own numbering out of the scan. Emphasis
/// markers are dropped first, so `(Wilson *et al.*, 2022)` is still found.
pub fn extract_citations(text: &str, excluded_lines: Option<Range<usize>>) -> CitationScan {
    let text = strip_emphasis(text);
    let text = text.as_str();
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&start| start <= offset) - 1;
    let excluded = excluded_lines.unwrap_or(0..0);

    let mut hits = Vec::new();
    let mut rule_hits = Vec::with_capacity(RULES.len());

    for (rule_index, rule) in RULES.iter().enumerate() {
        let mut count = 0;
        for caps in rule.regex.captures_iter(text) {
            let Some((whole, body)) = whole_and_body(&caps) else {
                continue;
            };
            let line = line_of(whole.start());
            if excluded.contains(&line) {
                continue;
            }
            for identity in rule.identities(body) {
                count += 1;
                hits.push(Hit {
                    offset: whole.start(),
                    rule_index,
                    citation: InlineCitation {
                        display: identity.display(),
                        identity,
                        raw: whole.as_str().to_string(),
                        rule: rule.name,
                        line: line + 1,
                        occurrences: 1,
                    },
                });
            }
        }
        if count > 0 {
            log::debug!("rule {} matched {count} time(s)", rule.name);
        }
        rule_hits.push(RuleHits {
            rule: rule.name,
            count,
        });
    }

    hits.sort_by_key(|h| (h.offset, h.rule_index));

    let mut citations: Vec<InlineCitation> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<(String, usize)> = HashSet::new();
    for hit in hits {
        let key = hit.citation.identity.key();
        // two rules matching the same span count once
        if !seen.insert((key.clone(), hit.offset)) {
            continue;
        }
        match index.get(&key) {
            Some(&i) => citations[i].occurrences += 1,
            None => {
                index.insert(key, citations.len());
                citations.push(hit.citation);
            }
        }
    }

    CitationScan {
        citations,
        rule_hits,
    }
}

fn whole_and_body<'t>(caps: &Captures<'t>) -> Option<(regex::Match<'t>, &'t str)> {
    Some((caps.get(0)?, caps.get(1)?.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> &'static CitationRule {
        rules().iter().find(|r| r.name == name).unwrap()
    }

    fn bodies(name: &str, text: &str) -> Vec<String> {
        rule(name)
            .regex()
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect()
    }

    fn displays(text: &str) -> Vec<String> {
        extract_citations(text, None)
            .citations
            .into_iter()
            .map(|c| c.display)
            .collect()
    }

    #[test]
    fn every_rule_matches_its_example() {
        for rule in rules() {
            assert!(
                rule.regex().is_match(rule.example),
                "{} does not match {}",
                rule.name,
                rule.example
            );
        }
    }

    #[test]
    fn numeric_rules() {
        assert_eq!(bodies("numeric-bracket", "see [1] and [23]"), vec!["1", "23"]);
        assert_eq!(bodies("numeric-superscript", "shown^4^ and x^12"), vec!["4", "12"]);
        assert_eq!(bodies("numeric-paren", "step (3) of (42)"), vec!["3", "42"]);
    }

    #[test]
    fn grouped_numbers_name_every_entry() {
        assert_eq!(displays("shown^1,2^ here"), vec!["[1]", "[2]"]);
        assert_eq!(displays("see [3-5]"), vec!["[3]", "[4]", "[5]"]);
        assert_eq!(displays("see [1, 4–5] and [4]"), vec!["[1]", "[4]", "[5]"]);
        let scan = extract_citations("see [2,2] and [9-1]", None);
        let raws: Vec<_> = scan
            .citations
            .iter()
            .map(|c| (c.display.as_str(), c.raw.as_str(), c.occurrences))
            .collect();
        assert_eq!(
            raws,
            vec![("[2]", "[2,2]", 1), ("[9]", "[9-1]", 1), ("[1]", "[9-1]", 1)]
        );
        assert_eq!(expand_numbers("1-500"), vec![1, 500]);
    }

    #[test]
    fn emphasised_citations_are_found() {
        assert_eq!(
            displays("As shown (Wilson *et al.*, 2022) and (*Lee*, 2018).\n(__Park__ 2019)"),
            vec!["Wilson et al., 2022", "Lee, 2018", "Park, 2019"]
        );
        let scan = extract_citations("Intro.\n\nSee (_Smith_, 2020).", None);
        assert_eq!(scan.citations[0].line, 3);
        assert_eq!(scan.citations[0].raw, "(Smith, 2020)");
    }

    #[test]
    fn parenthesised_year_is_not_numeric() {
        assert!(bodies("numeric-paren", "Smith (2020) argued").is_empty());
        assert!(bodies("numeric-bracket", "[2020]").is_empty());
        assert!(bodies("numeric-superscript", "x^2020").is_empty());
    }

    #[test]
    fn single_author_variants() {
        let text = "(Smith, 2020) (Smith 2021) (Smith et al., 2019) (Smith et al. 2018) (Lee-Park 2021a)";
        assert_eq!(
            bodies("author-year-paren", text),
            vec![
                "Smith, 2020",
                "Smith 2021",
                "Smith et al., 2019",
                "Smith et al. 2018",
                "Lee-Park 2021a"
            ]
        );
    }

    #[test]
    fn apostrophes_in_names() {
        assert_eq!(
            displays("(O'Brien, 2018) and (O’Neil 2017)"),
            vec!["O'Brien, 2018", "O’Neil, 2017"]
        );
    }

    #[test]
    fn bracketed_author_year() {
        assert_eq!(bodies("author-year-bracket", "[Smith, 2020]"), vec!["Smith, 2020"]);
        assert_eq!(displays("[Smith et al 2020]"), vec!["Smith et al., 2020"]);
    }

    #[test]
    fn two_and_many_authors() {
        assert_eq!(bodies("two-authors-and", "(Jones and Brown, 2019)"), vec!["Jones and Brown, 2019"]);
        assert_eq!(bodies("two-authors-ampersand", "(Jones & Brown 2019)"), vec!["Jones & Brown 2019"]);
        assert_eq!(
            bodies("many-authors", "(Adams, Baker, and Clark, 2017) (Adams, Baker, Clark & Dunn 2016)"),
            vec!["Adams, Baker, and Clark, 2017", "Adams, Baker, Clark & Dunn 2016"]
        );
    }

    #[test]
    fn author_with_initials() {
        assert_eq!(bodies("author-initials", "(Smith J., 2020) (Smith J. K. 2021)"), vec!["Smith J., 2020", "Smith J. K. 2021"]);
        let scan = extract_citations("(Smith J., 2020)", None);
        match &scan.citations[0].identity {
            CitationIdentity::AuthorYear { surnames, .. } => assert_eq!(surnames, &["Smith"]),
            other => panic!("unexpected identity {other:?}"),
        }
    }

    #[test]
    fn normalization_collapses_variants() {
        assert_eq!(
            displays("(Smith, 2020) then (Smith 2020) then (Smith,  2020) then [Smith, 2020]"),
            vec!["Smith, 2020"]
        );
        assert_eq!(
            displays("(Jones and Brown, 2019) (Jones & Brown 2019)"),
            vec!["Jones & Brown, 2019"]
        );
        assert_eq!(
            displays("(Smith et al 2020) (Smith et al., 2020)"),
            vec!["Smith et al., 2020"]
        );
    }

    #[test]
    fn et_al_is_a_distinct_identity() {
        assert_eq!(
            displays("(Smith, 2020) (Smith et al., 2020)"),
            vec!["Smith, 2020", "Smith et al., 2020"]
        );
    }

    #[test]
    fn surnames_of_many_authors() {
        let id = normalize_author_year("Adams, Baker, and Clark, 2017").unwrap();
        assert_eq!(
            id,
            CitationIdentity::AuthorYear {
                authors: "Adams, Baker, & Clark".to_string(),
                surnames: vec!["Adams".into(), "Baker".into(), "Clark".into()],
                year: "2017".to_string(),
            }
        );
    }

    #[test]
    fn first_occurrence_order_and_counts() {
        let text = "Intro [2] and (Wilson, 2022).\nLater [1], again [2] and (Wilson 2022).\n";
        let scan = extract_citations(text, None);
        let summary: Vec<_> = scan
            .citations
            .iter()
            .map(|c| (c.display.as_str(), c.line, c.occurrences))
            .collect();
        assert_eq!(
            summary,
            vec![("[2]", 1, 2), ("Wilson, 2022", 1, 2), ("[1]", 2, 1)]
        );
    }

    #[test]
    fn numeric_and_author_year_spaces_are_separate() {
        let scan = extract_citations("[1] (Smith, 2020)", None);
        assert!(scan.citations[0].is_numeric());
        assert!(!scan.citations[1].is_numeric());
    }

    #[test]
    fn excluded_lines_are_skipped() {
        let text = "Body (Smith, 2020).\n# References\n[1] Jones (2019).\n(Lee, 2018)\n";
        let scan = extract_citations(text, Some(1..4));
        assert_eq!(scan.citations.len(), 1);
        assert_eq!(scan.citations[0].display, "Smith, 2020");
    }

    #[test]
    fn rule_hits_cover_every_rule() {
        let scan = extract_citations("[1] [1] (Smith, 2020)", None);
        assert_eq!(scan.rule_hits.len(), rules().len());
        assert_eq!(scan.rule_hits[0], RuleHits { rule: "numeric-bracket", count: 2 });
        assert_eq!(scan.rule_hits[3].count, 1);
    }

    #[test]
    fn empty_text_has_no_citations() {
        let scan = extract_citations("", None);
        assert!(scan.citations.is_empty());
        assert!(scan.rule_hits.iter().all(|h| h.count == 0));
    }
}
