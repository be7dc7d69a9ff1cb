use serde::{Deserialize, Serialize};

/// `meta` value marking a record that replaces the landing entry.
pub const START_META: &str = "start";

/// An entry as it appears in a JSON source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

/// Content shared by every kind of input entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryContent {
    pub name: String,
    pub body: String,
    pub date: Option<String>,
    pub edit: Option<String>,
    pub team: Option<String>,
}

impl EntryContent {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            ..Self::default()
        }
    }
}

/// Input accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEntry {
    /// Indexed under its lower-cased name.
    Regular(EntryContent),
    /// Replaces the landing entry's content; never indexed under its own name.
    StartOverride(EntryContent),
}

impl RawEntry {
    pub fn regular(name: impl Into<String>, body: impl Into<String>) -> Self {
        RawEntry::Regular(EntryContent::new(name, body))
    }

    pub fn start_override(name: impl Into<String>, body: impl Into<String>) -> Self {
        RawEntry::StartOverride(EntryContent::new(name, body))
    }

    pub fn content(&self) -> &EntryContent {
        match self {
            RawEntry::Regular(content) | RawEntry::StartOverride(content) => content,
        }
    }
}

impl From<EntryRecord> for RawEntry {
    fn from(record: EntryRecord) -> Self {
        let is_start = record.meta.as_deref() == Some(START_META);
        let content = EntryContent {
            name: record.name,
            body: record.body,
            date: record.date,
            edit: record.edit,
            team: record.team,
        };
        if is_start {
            RawEntry::StartOverride(content)
        } else {
            RawEntry::Regular(content)
        }
    }
}

/// Whether an entry body has been through the term highlighting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightState {
    #[default]
    Unset,
    Highlighted,
}

/// Presentation metadata derived during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub index: usize,
    pub route: String,
    pub state: HighlightState,
}

impl View {
    pub fn is_set(&self) -> bool {
        self.state == HighlightState::Highlighted
    }
}

/// A normalized entry owned by an [`crate::EntryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    name: String,
    title: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team: Option<String>,
    view: View,
    /// Position of the source record; `None` for base entries.
    #[serde(skip)]
    origin: Option<usize>,
}

impl Entry {
    pub(crate) fn from_content(
        name: String,
        content: EntryContent,
        view: View,
        origin: Option<usize>,
    ) -> Self {
        Self {
            name,
            title: content.name,
            body: content.body,
            date: content.date,
            edit: content.edit,
            team: content.team,
            view,
            origin,
        }
    }

    /// Lower-cased identifier the entry is keyed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as originally supplied.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn edit(&self) -> Option<&str> {
        self.edit.as_deref()
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn route(&self) -> &str {
        &self.view.route
    }

    pub fn is_highlighted(&self) -> bool {
        self.view.is_set()
    }

    pub(crate) fn origin(&self) -> Option<usize> {
        self.origin
    }

    pub(crate) fn take_body(&mut self) -> String {
        std::mem::take(&mut self.body)
    }

    pub(crate) fn set_highlighted_body(&mut self, body: String) {
        self.body = body;
        self.view.state = HighlightState::Highlighted;
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.view.index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(meta: Option<&str>) -> EntryRecord {
        EntryRecord {
            name: "Welcome".into(),
            body: "hello".into(),
            meta: meta.map(str::to_string),
            ..EntryRecord::default()
        }
    }

    #[test]
    fn start_meta_becomes_override() {
        let raw = RawEntry::from(record(Some("start")));
        assert!(matches!(raw, RawEntry::StartOverride(_)));
        assert_eq!(raw.content().body, "hello");
    }

    #[test]
    fn other_meta_stays_regular() {
        for meta in [None, Some(""), Some("Start"), Some("draft")] {
            let raw = RawEntry::from(record(meta));
            assert!(matches!(raw, RawEntry::Regular(_)), "meta {meta:?}");
        }
    }

    #[test]
    fn record_optional_fields_default() {
        let record: EntryRecord =
            serde_json::from_str(r#"{"name":"Rust","body":"A language."}"#).unwrap();
        assert_eq!(record.meta, None);
        assert_eq!(record.team, None);
    }

    #[test]
    fn entry_serializes_view_without_origin() {
        let entry = Entry::from_content(
            "rust".into(),
            EntryContent::new("Rust", "body"),
            View {
                index: 0,
                route: "rust".into(),
                state: HighlightState::Unset,
            },
            Some(3),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["name"], "rust");
        assert_eq!(value["title"], "Rust");
        assert_eq!(value["view"]["state"], "unset");
        assert!(value.get("origin").is_none());
    }
}
