//! Run manifests.
//!
//! A manifest is the authoritative list of filing ids a run must
//! download, written once at enumeration time before any download is
//! dispatched. Completion is judged by comparing the number of stored
//! XML artifacts against the manifest length.

use std::collections::BTreeSet;
use tracing::info;

use crate::error::Result;
use crate::storage::BlobStorage;

pub fn manifest_key(run_id: &str) -> String {
    format!("{run_id}/manifest.txt")
}

pub fn xml_prefix(run_id: &str) -> String {
    format!("{run_id}/xml")
}

pub fn xml_key(run_id: &str, filing_id: &str) -> String {
    format!("{run_id}/xml/{filing_id}.xml")
}

pub fn csv_key(run_id: &str, table: &str) -> String {
    format!("{run_id}/csv/{table}.csv")
}

/// Writes the manifest for a run: one filing id per line, sorted, with
/// a trailing newline. Must happen before the first download dispatch.
pub async fn write_manifest(
    storage: &dyn BlobStorage,
    run_id: &str,
    filing_ids: &BTreeSet<String>,
) -> Result<()> {
    let mut body = String::new();
    for id in filing_ids {
        body.push_str(id);
        body.push('\n');
    }
    storage
        .put(&manifest_key(run_id), body.as_bytes(), "text/plain")
        .await?;
    info!(run_id, count = filing_ids.len(), "wrote run manifest");
    Ok(())
}

/// Reads a run's manifest back into the set of expected filing ids.
/// A missing manifest means the run was never enumerated.
pub async fn read_manifest(
    storage: &dyn BlobStorage,
    run_id: &str,
) -> Result<Option<BTreeSet<String>>> {
    let bytes = match storage.get(&manifest_key(run_id)).await? {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    let text = String::from_utf8_lossy(&bytes);
    Ok(Some(
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

/// A run is complete when it has at least as many stored XML artifacts
/// as manifest entries.
///
/// Two downloads finishing at the same time can both observe the full
/// count and both report completion; the transform stage tolerates
/// being triggered more than once because it rebuilds the store from
/// scratch each time.
pub async fn is_complete(storage: &dyn BlobStorage, run_id: &str) -> Result<bool> {
    let expected = match read_manifest(storage, run_id).await? {
        Some(ids) => ids.len(),
        None => return Ok(false),
    };
    let stored = storage.list(&xml_prefix(run_id)).await?.len();
    Ok(stored >= expected)
}
