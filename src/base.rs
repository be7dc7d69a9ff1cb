use crate::entry::{Entry, EntryContent, HighlightState, View};
use crate::uri::uri_format;

/// Reserved key of the landing entry.
pub const START: &str = "start";
/// Reserved key of the entry shown when a route resolves to nothing.
pub const ERROR: &str = "error";
/// Number of reserved entries at the head of every index.
pub const BASE_COUNT: usize = 2;

/// The reserved entries a store starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEntries {
    pub start: EntryContent,
    pub error: EntryContent,
}

impl Default for BaseEntries {
    fn default() -> Self {
        Self {
            start: EntryContent::new("Get started", "Start browsing..."),
            error: EntryContent::new("Oops", "Something seems off..."),
        }
    }
}

impl BaseEntries {
    pub fn with_start(mut self, start: EntryContent) -> Self {
        self.start = start;
        self
    }

    pub fn with_error(mut self, error: EntryContent) -> Self {
        self.error = error;
        self
    }

    /// Base entries in index order. They never go through highlighting.
    pub(crate) fn into_entries(self) -> [(String, Entry); BASE_COUNT] {
        let reserved = |key: &str, index: usize, content: EntryContent| {
            let view = View {
                index,
                route: uri_format(key),
                state: HighlightState::Highlighted,
            };
            (
                key.to_string(),
                Entry::from_content(key.to_string(), content, view, None),
            )
        };
        [
            reserved(START, 0, self.start),
            reserved(ERROR, 1, self.error),
        ]
    }
}
