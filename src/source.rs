use crate::entry::{EntryRecord, RawEntry};
use crate::filter::Filter;
use crate::store::EntryStore;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use zstd::stream::decode_all;

static BUNDLED_BYTES: &[u8] = include_bytes!(env!("ENTRYFRONT_DATA"));

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io(err) => write!(f, "io error: {err}"),
            SourceError::Json(err) => write!(f, "invalid entry data: {err}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(err) => Some(err),
            SourceError::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(value: std::io::Error) -> Self {
        SourceError::Io(value)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(value: serde_json::Error) -> Self {
        SourceError::Json(value)
    }
}

/// Parses a JSON array of entry records.
pub fn records_from_json(bytes: &[u8]) -> Result<Vec<EntryRecord>, SourceError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<EntryRecord>, SourceError> {
    let bytes = fs::read(path.as_ref())?;
    records_from_json(&bytes)
}

/// Records compiled into the binary from `data/entries.json`.
pub fn bundled_records() -> Result<Vec<EntryRecord>, SourceError> {
    let decompressed = decode_all(Cursor::new(BUNDLED_BYTES))?;
    records_from_json(&decompressed)
}

/// Builds a store from `path`, or from the bundled records when no path is given.
pub fn open_store(path: Option<&Path>, filter: Filter) -> Result<EntryStore, SourceError> {
    let records = match path {
        Some(path) => load_records(path)?,
        None => bundled_records()?,
    };
    Ok(EntryStore::with_filter(
        records.into_iter().map(RawEntry::from),
        filter,
    ))
}
