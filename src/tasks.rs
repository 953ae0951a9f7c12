//! Batch orchestration.
//!
//! A run moves through three stages: enumeration writes the manifest
//! and dispatches one download task per filing, each finished download
//! checks the run for completion, and the completed run is transformed
//! as one batch (store rebuild, parse, export, warehouse refresh).
//! Stages communicate only through dispatched tasks and blob storage,
//! so each one can execute on a different worker.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};
use crate::manifest;
use crate::netfile::client::NetfileClient;
use crate::netfile::parser::parse_filing_document;
use crate::netfile::store::Store;
use crate::storage::BlobStorage;
use crate::warehouse::Warehouse;

static XML_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\.xml$").expect("xml key pattern is valid")
});

/// Where a run currently stands. Orchestration state is derived from
/// storage, not persisted separately; this enum names the phases for
/// logs and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Enumerating,
    Downloading,
    Complete,
    Transforming,
    Done,
    Failed,
}

/// Work items handed between stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Download { run_id: String, filing_id: String },
    Transform { run_id: String },
}

/// Dispatches follow-on work. The queue implementation below runs
/// everything in-process; a deployment against a real message bus
/// implements the same trait.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch_download(&self, run_id: &str, filing_id: &str) -> Result<()>;
    async fn dispatch_transform(&self, run_id: &str) -> Result<()>;
}

/// In-process dispatcher over an unbounded channel. The receiving half
/// is drained by the caller.
pub struct QueueDispatcher {
    sender: mpsc::UnboundedSender<Task>,
}

impl QueueDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskDispatcher for QueueDispatcher {
    async fn dispatch_download(&self, run_id: &str, filing_id: &str) -> Result<()> {
        self.sender
            .send(Task::Download {
                run_id: run_id.to_string(),
                filing_id: filing_id.to_string(),
            })
            .map_err(|e| PipelineError::Dispatch(e.to_string()))
    }

    async fn dispatch_transform(&self, run_id: &str) -> Result<()> {
        self.sender
            .send(Task::Transform {
                run_id: run_id.to_string(),
            })
            .map_err(|e| PipelineError::Dispatch(e.to_string()))
    }
}

/// Fresh run identifier derived from the wall clock, so runs sort
/// chronologically in storage listings.
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Enumeration stage: lists every matching filing id, writes the run
/// manifest, then dispatches one download per filing. The manifest is
/// durable before the first dispatch, so the completion check never
/// races an unwritten manifest.
pub async fn enumerate_run(
    client: &NetfileClient,
    storage: &dyn BlobStorage,
    dispatcher: &dyn TaskDispatcher,
    run_id: &str,
) -> Result<usize> {
    info!(run_id, state = ?RunState::Enumerating, "enumerating run");
    let filing_ids = client.list_filing_ids().await?;
    manifest::write_manifest(storage, run_id, &filing_ids).await?;

    for filing_id in &filing_ids {
        dispatcher.dispatch_download(run_id, filing_id).await?;
    }
    info!(run_id, count = filing_ids.len(), state = ?RunState::Downloading, "dispatched downloads");
    Ok(filing_ids.len())
}

/// Download stage: fetches one filing's XML, stores it under the run,
/// and triggers the transform if this download completed the run.
///
/// Simultaneous final downloads can both observe completion and both
/// dispatch a transform; the transform rebuilds the store from scratch,
/// so a duplicate trigger redoes work but never corrupts it.
pub async fn handle_download(
    client: &NetfileClient,
    storage: &dyn BlobStorage,
    dispatcher: &dyn TaskDispatcher,
    run_id: &str,
    filing_id: &str,
) -> Result<()> {
    let content = client.download_filing(filing_id).await?;
    storage
        .put(
            &manifest::xml_key(run_id, filing_id),
            content.as_bytes(),
            "text/xml",
        )
        .await?;

    if manifest::is_complete(storage, run_id).await? {
        info!(run_id, state = ?RunState::Complete, "run download complete");
        dispatcher.dispatch_transform(run_id).await?;
    }
    Ok(())
}

/// Outcome counts from one transform pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub parsed: usize,
    pub failed_filings: usize,
    pub exported_tables: usize,
    pub failed_tables: usize,
}

/// Transform stage: rebuilds the store, parses every stored XML
/// artifact, exports the CSV extracts, and refreshes the warehouse.
///
/// An unreachable warehouse fails the run before the rebuild touches
/// anything. A filing that fails to parse is logged and skipped; a
/// table that fails to load is logged and skipped. Neither aborts the
/// rest of the batch.
pub async fn process_run(
    storage: &dyn BlobStorage,
    warehouse: &dyn Warehouse,
    store: &mut Store,
    run_id: &str,
) -> Result<TransformSummary> {
    info!(run_id, state = ?RunState::Transforming, "processing run");

    if !warehouse.is_connected().await {
        error!(run_id, state = ?RunState::Failed, "warehouse is unreachable");
        return Err(PipelineError::Warehouse(
            "warehouse is unreachable".to_string(),
        ));
    }

    store.rebuild()?;

    let mut summary = TransformSummary::default();
    let keys = storage.list(&manifest::xml_prefix(run_id)).await?;
    for key in keys {
        let filing_id = match XML_KEY_PATTERN.captures(&key) {
            Some(captures) => captures[1].to_string(),
            None => {
                warn!(key, "artifact name does not match the expected format");
                continue;
            }
        };
        let bytes = match storage.get(&key).await? {
            Some(bytes) => bytes,
            None => {
                warn!(key, "artifact disappeared between list and read");
                continue;
            }
        };
        let raw_xml = String::from_utf8_lossy(&bytes);

        match parse_filing_document(&filing_id, &raw_xml) {
            Ok(forest) => match store.commit_forest(&forest) {
                Ok(()) => summary.parsed += 1,
                Err(e) => {
                    error!(filing_id, error = %e, "failed to commit filing");
                    summary.failed_filings += 1;
                }
            },
            Err(e) => {
                error!(filing_id, error = %e, "failed to parse filing");
                summary.failed_filings += 1;
            }
        }
    }

    for (entity, extract) in store.export_all()? {
        let result = async {
            storage
                .put(
                    &manifest::csv_key(run_id, entity.table),
                    extract.as_bytes(),
                    "text/csv",
                )
                .await?;
            warehouse.refresh_table(entity, &extract).await
        }
        .await;

        match result {
            Ok(()) => summary.exported_tables += 1,
            Err(e) => {
                error!(table = entity.table, error = %e, "failed to load table into warehouse");
                summary.failed_tables += 1;
            }
        }
    }

    info!(
        run_id,
        parsed = summary.parsed,
        failed_filings = summary.failed_filings,
        exported_tables = summary.exported_tables,
        failed_tables = summary.failed_tables,
        state = ?RunState::Done,
        "finished processing run"
    );
    Ok(summary)
}
