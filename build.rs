use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zstd::bulk::compress as zstd_compress;

// Entries are small; favour ratio since this runs once per data change.
const ENTRY_COMPRESSION_LEVEL: i32 = 9;
const ENTRIES_ENV: &str = "ENTRYFRONT_ENTRIES";

#[derive(Deserialize, Serialize)]
struct EntryRow {
    name: String,
    body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    println!("cargo:rerun-if-env-changed={ENTRIES_ENV}");
    let source = env::var_os(ENTRIES_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("data/entries.json"));
    let rows = load_entries(&source)?;
    check_entries(&rows);
    build_entry_blob(&rows, &out_dir)?;
    Ok(())
}

fn load_entries(path: &Path) -> Result<Vec<EntryRow>, Box<dyn Error>> {
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!(
            "Missing {}. Provide a JSON array of entries or set {ENTRIES_ENV}.",
            path.display()
        );
    }
    let raw = fs::read(path)?;
    let rows: Vec<EntryRow> = serde_json::from_slice(&raw)
        .map_err(|err| format!("Failed to parse {}: {err}", path.display()))?;
    Ok(rows)
}

fn check_entries(rows: &[EntryRow]) {
    let mut seen = HashSet::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.meta.as_deref() == Some("start") {
            continue;
        }
        let key = row.name.to_lowercase();
        if key.trim().is_empty() {
            println!("cargo:warning=entry #{idx} has an empty name");
        }
        if !seen.insert(key) {
            println!(
                "cargo:warning=entry #{idx} ({:?}) shadows an earlier entry with the same name",
                row.name
            );
        }
    }
}

fn build_entry_blob(rows: &[EntryRow], out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let compact = serde_json::to_vec(rows)?;
    let compressed = zstd_compress(&compact, ENTRY_COMPRESSION_LEVEL)
        .map_err(|err| format!("Failed to compress entries: {err}"))?;
    let blob_path = out_dir.join("entries.json.zst");
    fs::write(&blob_path, compressed)?;
    println!("cargo:rustc-env=ENTRYFRONT_DATA={}", blob_path.display());
    Ok(())
}
