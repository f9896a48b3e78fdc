//! Text normalization shared by citation identities and reference-entry keys.
//!
//! Both sides of a comparison go through [`normalize_key`], so "Müller" in
//! the body and "Muller" in a hand-typed bibliography compare equal.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A 4-digit year with an optional disambiguation suffix (`2020a`).
pub(crate) static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}[a-z]?\b").unwrap());

/// A name-like word: a letter followed by letters, apostrophes or hyphens.
pub(crate) static NAME_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{L}[\p{L}'’\-]*").unwrap());

/// Collapse runs of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop Markdown emphasis markers: every `*`, and `_` unless it sits
/// between two alphanumerics. `(Wilson *et al.*, 2022)` reads as
/// `(Wilson et al., 2022)`. Newlines are untouched, so line numbers hold.
pub fn strip_emphasis(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let is_word = |j: Option<usize>| {
        j.and_then(|j| chars.get(j))
            .is_some_and(|c| c.is_alphanumeric())
    };
    chars
        .iter()
        .enumerate()
        .filter_map(|(i, &c)| {
            let keep = match c {
                '*' => false,
                '_' => is_word(i.checked_sub(1)) && is_word(Some(i + 1)),
                _ => true,
            };
            keep.then_some(c)
        })
        .collect()
}

/// Lowercase, strip diacritics and collapse whitespace.
pub fn normalize_key(s: &str) -> String {
    let folded: String = s
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace('’', "'");
    collapse_whitespace(&folded)
}

/// Case- and accent-insensitive substring test.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = normalize_key(needle);
    !needle.is_empty() && normalize_key(haystack).contains(&needle)
}
