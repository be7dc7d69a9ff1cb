mod base;
mod entry;
mod filter;
mod source;
mod store;
mod uri;

#[cfg(feature = "web")]
pub mod web;

pub use base::{BASE_COUNT, BaseEntries, ERROR, START};
pub use entry::{Entry, EntryContent, EntryRecord, HighlightState, RawEntry, START_META, View};
pub use filter::{
    DEFAULT_ANCHOR, DEFAULT_STATUS, DEFAULT_TERM_PATTERN, Filter, FilterError, TermMatcher,
};
pub use source::{SourceError, bundled_records, load_records, open_store, records_from_json};
pub use store::{EntryIndex, EntryStore, RouteTable, SharedStore};
pub use uri::uri_format;
