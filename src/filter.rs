use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

pub const DEFAULT_ANCHOR: &str = "Mark";
pub const DEFAULT_STATUS: &str = "data-seen";
/// Wiki-style `[[term]]` references.
pub const DEFAULT_TERM_PATTERN: &str = r"\[\[(?P<term>[^\[\]]+)\]\]";

const TERM_GROUP: &str = "term";

static DEFAULT_MATCHER: Lazy<TermMatcher> = Lazy::new(|| {
    TermMatcher::new(DEFAULT_TERM_PATTERN).expect("default term pattern compiles")
});

#[derive(Debug)]
pub enum FilterError {
    Pattern(regex::Error),
    EmptyAnchor,
    EmptyStatus,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Pattern(err) => write!(f, "invalid term pattern: {err}"),
            FilterError::EmptyAnchor => write!(f, "highlight anchor cannot be empty"),
            FilterError::EmptyStatus => write!(f, "highlight status attribute cannot be empty"),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Pattern(err) => Some(err),
            _ => None,
        }
    }
}

impl From<regex::Error> for FilterError {
    fn from(value: regex::Error) -> Self {
        FilterError::Pattern(value)
    }
}

/// Finds the terms inside an entry body.
///
/// The term of a match is its `term` named group when the pattern has one,
/// otherwise its last participating capture group, otherwise the whole
/// match. A pattern like `(\[\[)([^\]]+)\]\]` therefore yields the text
/// after the opening delimiter.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    regex: Regex,
}

impl TermMatcher {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }

    pub(crate) fn term<'h>(&self, caps: &Captures<'h>) -> &'h str {
        caps.name(TERM_GROUP)
            .or_else(|| caps.iter().skip(1).flatten().last())
            .or_else(|| caps.get(0))
            .map(|m| m.as_str())
            .unwrap_or_default()
    }

    /// Terms found in `body`, in order of appearance.
    pub fn terms<'h>(&self, body: &'h str) -> Vec<&'h str> {
        self.regex
            .captures_iter(body)
            .map(|caps| self.term(&caps))
            .collect()
    }
}

impl Default for TermMatcher {
    fn default() -> Self {
        DEFAULT_MATCHER.clone()
    }
}

/// Describes how matched terms are marked up.
#[derive(Debug, Clone)]
pub struct Filter {
    anchor: String,
    status: String,
    matcher: TermMatcher,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            anchor: DEFAULT_ANCHOR.to_string(),
            status: DEFAULT_STATUS.to_string(),
            matcher: TermMatcher::default(),
        }
    }
}

impl Filter {
    pub fn new(
        anchor: impl Into<String>,
        status: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, FilterError> {
        let anchor = anchor.into();
        let status = status.into();
        if anchor.trim().is_empty() {
            return Err(FilterError::EmptyAnchor);
        }
        if status.trim().is_empty() {
            return Err(FilterError::EmptyStatus);
        }
        Ok(Self {
            anchor,
            status,
            matcher: TermMatcher::new(pattern)?,
        })
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn matcher(&self) -> &TermMatcher {
        &self.matcher
    }

    /// Tag name emitted around highlighted terms.
    pub fn tag(&self) -> String {
        self.anchor.to_lowercase()
    }

    pub fn wrap(&self, term: &str) -> String {
        let tag = self.tag();
        format!(r#"<{tag} {status}="false">{term}</{tag}>"#, status = self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_lowercased_anchor() {
        let filter = Filter::new("Term", "data-open", DEFAULT_TERM_PATTERN).unwrap();
        assert_eq!(
            filter.wrap("rust"),
            r#"<term data-open="false">rust</term>"#
        );
    }

    #[test]
    fn default_filter_uses_mark() {
        let filter = Filter::default();
        assert_eq!(filter.tag(), "mark");
        assert_eq!(filter.wrap("x"), r#"<mark data-seen="false">x</mark>"#);
    }

    #[test]
    fn named_group_is_the_term() {
        let matcher = TermMatcher::default();
        assert_eq!(
            matcher.terms("see [[Rust]] and [[Cargo book]] or [single]"),
            vec!["Rust", "Cargo book"]
        );
    }

    #[test]
    fn falls_back_to_last_group_then_whole_match() {
        let grouped = TermMatcher::new(r"\{(\w+)\}").unwrap();
        assert_eq!(grouped.terms("a {b} c"), vec!["b"]);

        let delimited = TermMatcher::new(r"(\[\[)([^\]]+)\]\]").unwrap();
        assert_eq!(delimited.terms("see [[Rust]] and [[Go]]"), vec!["Rust", "Go"]);

        let optional = TermMatcher::new(r"(\w+)(!)?").unwrap();
        assert_eq!(optional.terms("hey!"), vec!["!"]);
        assert_eq!(optional.terms("hey"), vec!["hey"]);

        let bare = TermMatcher::new(r"[A-Z]\w+").unwrap();
        assert_eq!(bare.terms("see Rust and Go"), vec!["Rust", "Go"]);
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            Filter::new("mark", "seen", "(unclosed"),
            Err(FilterError::Pattern(_))
        ));
        assert!(matches!(
            Filter::new(" ", "seen", DEFAULT_TERM_PATTERN),
            Err(FilterError::EmptyAnchor)
        ));
        assert!(matches!(
            Filter::new("mark", "", DEFAULT_TERM_PATTERN),
            Err(FilterError::EmptyStatus)
        ));
    }
}
