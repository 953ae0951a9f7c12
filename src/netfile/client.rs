//! HTTP client for the NetFile public registry.
//!
//! Two endpoints matter: a paged filing listing (form-encoded POST) and
//! a per-filing download that returns a zip archive whose single
//! `Efile.txt` entry holds the raw XML document.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use tracing::{error, info};

use crate::config::NetfileConfig;
use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize, Default)]
struct FilingListPage {
    #[serde(default)]
    filings: Vec<FilingSummary>,
}

#[derive(Debug, Deserialize)]
struct FilingSummary {
    id: serde_json::Value,
    #[serde(rename = "isEfiled", default)]
    is_efiled: bool,
}

/// Splits one listing page into (kept, ignored) filing ids. Only
/// electronically filed entries are kept; ids arrive as either JSON
/// numbers or strings and are normalized to strings.
fn partition_page(page: &FilingListPage) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut ignored = Vec::new();
    for summary in &page.filings {
        let id = match &summary.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if summary.is_efiled {
            kept.push(id);
        } else {
            ignored.push(id);
        }
    }
    (kept, ignored)
}

pub struct NetfileClient {
    http: reqwest::Client,
    config: NetfileConfig,
}

impl NetfileClient {
    pub fn new(config: NetfileConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_root, path)
    }

    /// Walks the paged listing endpoint until an empty page and returns
    /// the distinct ids of every electronically filed filing of the
    /// configured form type. Paper filings have no XML document and are
    /// logged and skipped.
    pub async fn list_filing_ids(&self) -> Result<BTreeSet<String>> {
        let url = self.build_url("public/list/filing");
        let mut page_index: u32 = 0;
        let mut filing_ids = BTreeSet::new();
        let mut ignored_count: usize = 0;

        loop {
            info!(page = page_index, form = self.config.form_type, "retrieving filing list page");
            let response = self
                .http
                .post(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .form(&[
                    ("AID", self.config.aid.clone()),
                    ("Form", self.config.form_type.to_string()),
                    ("CurrentPageIndex", page_index.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                error!(status, page = page_index, "filing list request failed");
                return Err(PipelineError::Download { status, body });
            }

            let page: FilingListPage = response.json().await?;
            if page.filings.is_empty() {
                break;
            }

            let (kept, ignored) = partition_page(&page);
            for id in &ignored {
                info!(filing_id = %id, "ignoring filing that was not filed electronically");
            }
            ignored_count += ignored.len();
            filing_ids.extend(kept);
            page_index += 1;
        }

        info!(
            count = filing_ids.len(),
            ignored = ignored_count,
            "finished retrieving filing ids"
        );
        Ok(filing_ids)
    }

    /// Downloads one filing's XML. The endpoint serves a zip archive;
    /// the document is its `Efile.txt` entry, returned with edge
    /// whitespace trimmed.
    pub async fn download_filing(&self, filing_id: &str) -> Result<String> {
        info!(filing_id, "downloading filing");
        let url = self.build_url(&format!("public/efile/{filing_id}"));
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, filing_id, "filing download failed");
            return Err(PipelineError::Download { status, body });
        }

        let bytes = response.bytes().await?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_ref()))?;
        let mut entry = archive.by_name("Efile.txt")?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;

        info!(filing_id, "successfully downloaded filing");
        Ok(text.trim().to_string())
    }
}
