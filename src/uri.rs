use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid non-word pattern"));

/// Converts an entry name into a URL path segment.
///
/// Each run of non-word characters collapses to one hyphen and hyphens are
/// trimmed from both ends, so the result is empty for names made only of
/// symbols.
pub fn uri_format(name: &str) -> String {
    NON_WORD_RUN
        .replace_all(name, "-")
        .trim_matches('-')
        .to_string()
}
