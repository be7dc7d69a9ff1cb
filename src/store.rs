use crate::base::{BASE_COUNT, BaseEntries, ERROR, START};
use crate::entry::{Entry, EntryContent, HighlightState, RawEntry, View};
use crate::filter::Filter;
use crate::uri::uri_format;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// Entries keyed by lower-cased name; the reserved entries come first.
pub type EntryIndex = IndexMap<String, Entry>;
/// Route slug to entry name.
pub type RouteTable = IndexMap<String, String>;

/// In-memory index of site entries.
///
/// Records are normalized on construction. Bodies are rewritten to
/// highlight terms the first time their entry is resolved through
/// [`EntryStore::get_entry`].
#[derive(Debug, Clone)]
pub struct EntryStore {
    records: Vec<RawEntry>,
    base: BaseEntries,
    filter: Filter,
    entries: EntryIndex,
}

enum Resolution<'a> {
    Error,
    Start,
    Cached(&'a str),
    Pending(&'a str),
}

impl EntryStore {
    pub fn new(records: impl IntoIterator<Item = RawEntry>) -> Self {
        Self::with_filter(records, Filter::default())
    }

    pub fn with_filter(records: impl IntoIterator<Item = RawEntry>, filter: Filter) -> Self {
        Self::with_base(records, filter, BaseEntries::default())
    }

    pub fn with_base(
        records: impl IntoIterator<Item = RawEntry>,
        filter: Filter,
        base: BaseEntries,
    ) -> Self {
        let mut store = Self {
            records: records.into_iter().collect(),
            base,
            filter,
            entries: EntryIndex::new(),
        };
        store.finalize();
        store
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Queues more records. They are indexed by the next [`EntryStore::finalize`].
    pub fn extend(&mut self, records: impl IntoIterator<Item = RawEntry>) {
        self.records.extend(records);
    }

    /// Rebuilds the index from the records.
    ///
    /// Entries whose source record is unchanged keep their route, highlight
    /// state and body, so running this again on a normalized store is a no-op.
    pub fn finalize(&mut self) -> &EntryIndex {
        let (start, keyed) = self.key_entries_by_name();
        let overridden = start.is_some();
        let base = match start {
            Some(content) => self.base.clone().with_start(content),
            None => self.base.clone(),
        };

        let mut previous = std::mem::take(&mut self.entries);
        let mut viewed = EntryIndex::with_capacity(keyed.len());
        for (name, (origin, content)) in keyed {
            let entry = match previous.swap_remove(&name) {
                Some(existing) if existing.origin() == Some(origin) => existing,
                _ => {
                    let view = View {
                        index: 0,
                        route: uri_format(&name),
                        state: HighlightState::Unset,
                    };
                    Entry::from_content(name.clone(), content, view, Some(origin))
                }
            };
            viewed.insert(name, entry);
        }

        // Records named after a reserved key land in that key's slot.
        let mut entries = EntryIndex::with_capacity(viewed.len() + BASE_COUNT);
        entries.extend(base.into_entries());
        entries.extend(viewed);
        assign_indices(&mut entries);
        self.entries = entries;

        debug!(
            records = self.records.len(),
            entries = self.entries.len() - BASE_COUNT,
            start_override = overridden,
            "Normalized entry index"
        );
        &self.entries
    }

    /// Keys regular records by lower-cased name, last record winning, and
    /// returns the last start override separately.
    fn key_entries_by_name(
        &self,
    ) -> (Option<EntryContent>, IndexMap<String, (usize, EntryContent)>) {
        let mut start = None;
        let mut keyed = IndexMap::with_capacity(self.records.len());
        for (origin, record) in self.records.iter().enumerate() {
            match record {
                RawEntry::StartOverride(content) => start = Some(content.clone()),
                RawEntry::Regular(content) => {
                    keyed.insert(content.name.to_lowercase(), (origin, content.clone()));
                }
            }
        }
        (start, keyed)
    }

    /// Full index, reserved entries included.
    pub fn entries(&self) -> &EntryIndex {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Non-reserved entries whose names contain every query,
    /// case-insensitively. No queries matches everything.
    pub fn matches<S: AsRef<str>>(&self, queries: &[S]) -> Vec<&Entry> {
        let queries: Vec<String> = queries
            .iter()
            .map(|query| query.as_ref().to_lowercase())
            .collect();
        non_base(&self.entries)
            .filter(|entry| {
                queries
                    .iter()
                    .all(|query| entry.name().contains(query.as_str()))
            })
            .collect()
    }

    /// Route slug to name for every non-reserved entry.
    pub fn compute_routes(&self) -> RouteTable {
        non_base(&self.entries)
            .map(|entry| (entry.route().to_string(), entry.name().to_string()))
            .collect()
    }

    /// Wraps each term of the entry's body that names at least one entry,
    /// then marks the entry highlighted.
    fn replace_terms(&mut self, name: &str) -> Option<&Entry> {
        let body = self.entries.get_mut(name)?.take_body();
        let mut wrapped = 0usize;
        let replaced = {
            let entries = &self.entries;
            let filter = &self.filter;
            filter
                .matcher()
                .regex()
                .replace_all(&body, |caps: &regex::Captures<'_>| {
                    let term = filter.matcher().term(caps);
                    if names_term(entries, term) {
                        wrapped += 1;
                        filter.wrap(term)
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned()
        };
        trace!(entry = name, wrapped, "Highlighted entry terms");
        let entry = self.entries.get_mut(name)?;
        entry.set_highlighted_body(replaced);
        Some(entry)
    }

    fn resolve<'a>(&self, route: &str, routes: &'a RouteTable) -> Resolution<'a> {
        let name = routes.get(route).map(String::as_str).unwrap_or(START);
        match self.entries.get(name) {
            None => Resolution::Error,
            Some(_) if name == START => Resolution::Start,
            Some(entry) if entry.is_highlighted() => Resolution::Cached(name),
            Some(_) => Resolution::Pending(name),
        }
    }

    /// Resolves a route to an entry, highlighting it on first access.
    ///
    /// Unknown routes resolve to the `start` entry; routes naming an entry
    /// missing from the index resolve to the `error` entry.
    pub fn get_entry(&mut self, route: &str, routes: &RouteTable) -> &Entry {
        match self.resolve(route, routes) {
            Resolution::Error => {
                debug!(route, "Route names no entry, serving error entry");
                &self.entries[ERROR]
            }
            Resolution::Start => &self.entries[START],
            Resolution::Cached(name) => &self.entries[name],
            Resolution::Pending(name) => {
                self.replace_terms(name);
                &self.entries[name]
            }
        }
    }

    /// Resolves a route without mutating, if no highlighting is needed.
    fn peek_entry(&self, route: &str, routes: &RouteTable) -> Option<&Entry> {
        match self.resolve(route, routes) {
            Resolution::Error => Some(&self.entries[ERROR]),
            Resolution::Start => Some(&self.entries[START]),
            Resolution::Cached(name) => Some(&self.entries[name]),
            Resolution::Pending(_) => None,
        }
    }
}

// The reserved entries always occupy the first `BASE_COUNT` positions.
// Names are stored lower-cased, so queries only need lowering themselves.
fn non_base(entries: &EntryIndex) -> impl Iterator<Item = &Entry> {
    entries.values().skip(BASE_COUNT)
}

fn names_term(entries: &EntryIndex, term: &str) -> bool {
    let term = term.to_lowercase();
    non_base(entries).any(|entry| entry.name().contains(term.as_str()))
}

/// Reserved slots are numbered by position, everything else by sorted name.
fn assign_indices(entries: &mut EntryIndex) {
    for (position, entry) in entries.values_mut().take(BASE_COUNT).enumerate() {
        entry.set_index(position);
    }
    let mut names: Vec<String> = entries.keys().skip(BASE_COUNT).cloned().collect();
    names.sort();
    for (index, name) in names.iter().enumerate() {
        if let Some(entry) = entries.get_mut(name) {
            entry.set_index(index);
        }
    }
}

/// An [`EntryStore`] shared across threads.
///
/// Cached resolutions take a read lock. Entries that still need
/// highlighting are resolved under the write lock, where their state is
/// checked again, so every body is rewritten exactly once.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<EntryStore>>,
}

impl SharedStore {
    pub fn new(store: EntryStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn compute_routes(&self) -> RouteTable {
        self.inner.read().compute_routes()
    }

    pub fn filter(&self) -> Filter {
        self.inner.read().filter().clone()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.inner.read().entries().values().cloned().collect()
    }

    pub fn matches<S: AsRef<str>>(&self, queries: &[S]) -> Vec<Entry> {
        self.inner
            .read()
            .matches(queries)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_entry(&self, route: &str, routes: &RouteTable) -> Entry {
        if let Some(entry) = self.inner.read().peek_entry(route, routes) {
            return entry.clone();
        }
        self.inner.write().get_entry(route, routes).clone()
    }

    /// Adds records and rebuilds the index. Returns the new route table.
    pub fn extend(&self, records: impl IntoIterator<Item = RawEntry>) -> RouteTable {
        let mut store = self.inner.write();
        store.extend(records);
        store.finalize();
        store.compute_routes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DEFAULT_TERM_PATTERN;
    use std::thread;

    fn sample() -> EntryStore {
        EntryStore::new(vec![
            RawEntry::regular("Rust", "A language. See [[Cargo]] and [[Haskell]]."),
            RawEntry::regular("Cargo", "The [[rust]] build tool."),
            RawEntry::regular("Borrow Checker", "Part of [[Rust]], unlike [[GC]]."),
            RawEntry::regular("async Rust", "Futures in [[Rust]]."),
        ])
    }

    #[test]
    fn index_starts_with_reserved_entries() {
        let store = sample();
        let keys: Vec<&str> = store.entries().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![START, ERROR, "rust", "cargo", "borrow checker", "async rust"]
        );
    }

    #[test]
    fn view_indices_follow_sorted_names() {
        let store = sample();
        let mut names: Vec<&str> = non_base(store.entries()).map(Entry::name).collect();
        names.sort();
        for (expected, name) in names.iter().enumerate() {
            assert_eq!(store.entry(name).unwrap().view().index, expected);
        }
    }

    #[test]
    fn names_are_lowercased_and_titles_kept() {
        let store = sample();
        let entry = store.entry("borrow checker").unwrap();
        assert_eq!(entry.title(), "Borrow Checker");
        assert_eq!(entry.route(), "borrow-checker");
        assert!(store.entry("Borrow Checker").is_none());
    }

    #[test]
    fn later_records_win_on_collision() {
        let store = EntryStore::new(vec![
            RawEntry::regular("Rust", "first"),
            RawEntry::regular("Go", "go"),
            RawEntry::regular("RUST", "second"),
        ]);
        let keys: Vec<&str> = store.entries().keys().map(String::as_str).collect();
        assert_eq!(keys, vec![START, ERROR, "rust", "go"]);
        assert_eq!(store.entry("rust").unwrap().body(), "second");
        assert_eq!(store.entry("rust").unwrap().title(), "RUST");
    }

    #[test]
    fn start_override_replaces_content_only() {
        let store = EntryStore::new(vec![
            RawEntry::regular("Rust", "A language."),
            RawEntry::start_override("Welcome", "Hello there"),
        ]);
        let start = store.entry(START).unwrap();
        assert_eq!(start.name(), START);
        assert_eq!(start.title(), "Welcome");
        assert_eq!(start.body(), "Hello there");
        assert!(store.entry("welcome").is_none());
        assert_eq!(store.entries().get_index_of(START), Some(0));
    }

    #[test]
    fn last_start_override_wins() {
        let store = EntryStore::new(vec![
            RawEntry::start_override("Hello", "first"),
            RawEntry::regular("Rust", "A language."),
            RawEntry::start_override("Welcome", "second"),
        ]);
        let start = store.entry(START).unwrap();
        assert_eq!(start.title(), "Welcome");
        assert_eq!(start.body(), "second");
        assert_eq!(store.entries().len(), BASE_COUNT + 1);
    }

    #[test]
    fn reserved_names_replace_base_entries_in_place() {
        let store = EntryStore::new(vec![
            RawEntry::regular("Apple", "a"),
            RawEntry::regular("Error", "Custom failure page"),
            RawEntry::regular("Zoo", "z"),
        ]);
        let keys: Vec<&str> = store.entries().keys().map(String::as_str).collect();
        assert_eq!(keys, vec![START, ERROR, "apple", "zoo"]);

        let error = store.entry(ERROR).unwrap();
        assert_eq!(error.body(), "Custom failure page");
        assert_eq!(error.view().index, 1);

        let names: Vec<&str> = store.matches(&[""]).into_iter().map(Entry::name).collect();
        assert_eq!(names, vec!["apple", "zoo"]);
        assert!(!store.compute_routes().values().any(|name| name == ERROR));

        let indices: Vec<(&str, usize)> = non_base(store.entries())
            .map(|entry| (entry.name(), entry.view().index))
            .collect();
        assert_eq!(indices, vec![("apple", 0), ("zoo", 1)]);
    }

    #[test]
    fn later_entry_owns_a_shared_route() {
        let store = EntryStore::new(vec![
            RawEntry::regular("a b", "spaced"),
            RawEntry::regular("a-b", "hyphenated"),
        ]);
        let routes = store.compute_routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.get("a-b").map(String::as_str), Some("a-b"));
    }

    #[test]
    fn overrides_do_not_leak_between_stores() {
        let _overridden = EntryStore::new(vec![RawEntry::start_override("Home", "Custom")]);
        let plain = EntryStore::new(Vec::<RawEntry>::new());
        assert_eq!(plain.entry(START).unwrap().body(), "Start browsing...");
    }

    #[test]
    fn matches_exclude_reserved_entries() {
        let store = sample();
        let all = store.matches(&[""]);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|e| e.name() != START && e.name() != ERROR));

        let none: [&str; 0] = [];
        assert_eq!(store.matches(&none).len(), 4);

        let empty = EntryStore::new(vec![RawEntry::regular("Start here", "x")]);
        assert_eq!(empty.matches(&["start"]).len(), 1);
    }

    #[test]
    fn matches_intersect_queries_case_insensitively() {
        let store = sample();
        let names: Vec<&str> = store.matches(&["RUST"]).into_iter().map(Entry::name).collect();
        assert_eq!(names, vec!["rust", "async rust"]);
        let names: Vec<&str> = store
            .matches(&["rust", "sync"])
            .into_iter()
            .map(Entry::name)
            .collect();
        assert_eq!(names, vec!["async rust"]);
        assert!(store.matches(&["rust", "cargo"]).is_empty());
    }

    #[test]
    fn highlights_terms_that_name_entries() {
        let mut store = sample();
        let routes = store.compute_routes();
        let entry = store.get_entry("rust", &routes);
        assert_eq!(
            entry.body(),
            r#"A language. See <mark data-seen="false">Cargo</mark> and [[Haskell]]."#
        );
        assert!(entry.is_highlighted());
    }

    #[test]
    fn partial_name_terms_are_wrapped_once() {
        let mut store = sample();
        let routes = store.compute_routes();
        // "Rust" names two entries but is wrapped once.
        let entry = store.get_entry("borrow-checker", &routes);
        assert_eq!(
            entry.body(),
            r#"Part of <mark data-seen="false">Rust</mark>, unlike [[GC]]."#
        );
    }

    #[test]
    fn highlighting_is_idempotent() {
        let mut store = sample();
        let routes = store.compute_routes();
        let first = store.get_entry("cargo", &routes).body().to_string();
        let second = store.get_entry("cargo", &routes).body().to_string();
        assert_eq!(first, second);
        assert_eq!(first.matches("<mark").count(), 1);
    }

    #[test]
    fn only_resolved_entries_are_highlighted() {
        let mut store = sample();
        let routes = store.compute_routes();
        store.get_entry("rust", &routes);
        assert!(store.entry("rust").unwrap().is_highlighted());
        assert!(!store.entry("cargo").unwrap().is_highlighted());
        assert_eq!(store.entry("cargo").unwrap().body(), "The [[rust]] build tool.");
    }

    #[test]
    fn unknown_route_falls_back_to_start() {
        let mut store = sample();
        let routes = store.compute_routes();
        assert_eq!(store.get_entry("/nonexistent", &routes).name(), START);
        assert_eq!(store.get_entry("", &routes).name(), START);
    }

    #[test]
    fn stale_route_falls_back_to_error() {
        let mut store = sample();
        let mut routes = store.compute_routes();
        routes.insert("gone".into(), "deleted entry".into());
        let entry = store.get_entry("gone", &routes);
        assert_eq!(entry.name(), ERROR);
        assert_eq!(entry.title(), "Oops");
    }

    #[test]
    fn start_entry_is_never_highlighted() {
        let mut store = EntryStore::new(vec![
            RawEntry::regular("Rust", "x"),
            RawEntry::start_override("Home", "Read about [[Rust]]."),
        ]);
        let routes = store.compute_routes();
        assert_eq!(store.get_entry("", &routes).body(), "Read about [[Rust]].");
    }

    #[test]
    fn routes_round_trip() {
        let mut store = sample();
        let routes = store.compute_routes();
        assert_eq!(routes.len(), 4);
        let names: Vec<(String, String)> = non_base(store.entries())
            .map(|e| (e.route().to_string(), e.name().to_string()))
            .collect();
        for (route, name) in names {
            assert_eq!(routes[&route], name);
            assert_eq!(store.get_entry(&route, &routes).name(), name);
        }
        assert!(!routes.values().any(|name| name == START || name == ERROR));
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut store = sample();
        let routes = store.compute_routes();
        let highlighted = store.get_entry("rust", &routes).clone();
        let before = store.entries().clone();
        store.finalize();
        assert_eq!(store.entries(), &before);
        assert_eq!(store.entry("rust"), Some(&highlighted));
    }

    #[test]
    fn extend_reindexes_and_resets_replaced_records() {
        let mut store = sample();
        let routes = store.compute_routes();
        store.get_entry("rust", &routes);
        store.get_entry("cargo", &routes);
        store.extend(vec![
            RawEntry::regular("Abacus", "tiny"),
            RawEntry::regular("cargo", "Builds [[Abacus]]."),
        ]);
        store.finalize();

        assert_eq!(store.entry("abacus").unwrap().view().index, 0);
        assert_eq!(store.entry("rust").unwrap().view().index, 4);
        assert!(store.entry("rust").unwrap().is_highlighted());
        let cargo = store.entry("cargo").unwrap();
        assert!(!cargo.is_highlighted());
        assert_eq!(cargo.body(), "Builds [[Abacus]].");
    }

    #[test]
    fn custom_filter_controls_markup() {
        let filter = Filter::new("Term", "data-open", r"\{(\w+)\}").unwrap();
        let mut store = EntryStore::with_filter(
            vec![
                RawEntry::regular("alpha", "uses {alpha} and {beta}"),
                RawEntry::regular("gamma", "g"),
            ],
            filter,
        );
        let routes = store.compute_routes();
        assert_eq!(
            store.get_entry("alpha", &routes).body(),
            r#"uses <term data-open="false">alpha</term> and {beta}"#
        );
    }

    #[test]
    fn custom_base_entries_are_used() {
        let base = BaseEntries::default().with_error(EntryContent::new("Lost", "Nothing here"));
        let mut store = EntryStore::with_base(Vec::<RawEntry>::new(), Filter::default(), base);
        let mut routes = RouteTable::new();
        routes.insert("x".into(), "missing".into());
        assert_eq!(store.get_entry("x", &routes).body(), "Nothing here");
    }

    #[test]
    fn default_pattern_is_wiki_links() {
        assert_eq!(Filter::default().matcher().as_str(), DEFAULT_TERM_PATTERN);
    }

    #[test]
    fn shared_store_highlights_once_under_contention() {
        let shared = SharedStore::new(sample());
        let routes = Arc::new(shared.compute_routes());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                let routes = Arc::clone(&routes);
                thread::spawn(move || shared.get_entry("borrow-checker", &routes))
            })
            .collect();
        let bodies: Vec<String> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().body().to_string())
            .collect();
        for body in &bodies {
            assert_eq!(body, &bodies[0]);
            assert_eq!(body.matches("<mark").count(), 1);
        }
    }

    #[test]
    fn shared_store_extend_returns_fresh_routes() {
        let shared = SharedStore::new(sample());
        let routes = shared.extend(vec![RawEntry::regular("Zig", "z")]);
        assert_eq!(routes.get("zig").map(String::as_str), Some("zig"));
        assert_eq!(shared.get_entry("zig", &routes).name(), "zig");
        assert_eq!(shared.entries().len(), 7);
    }
}
