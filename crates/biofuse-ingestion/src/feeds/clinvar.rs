//! ClinVar feed: variant clinical significance assertions.
//!
//! NCBI variation API, clinvar collection. Query defaults to the run query,
//! then `clinvar_query` from config, then BRCA1.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const CLINVAR_URL: &str = "https://api.ncbi.nlm.nih.gov/variation/v0/clinvar";

pub struct ClinVarFeed {
    client: Client,
}

impl ClinVarFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }
}

impl Default for ClinVarFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for ClinVarFeed {
    fn name(&self) -> &'static str {
        "clinvar"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let query = params
            .query
            .as_deref()
            .or_else(|| params.config.get_str("clinvar_query"))
            .unwrap_or("BRCA1");

        let resp: serde_json::Value = self
            .client
            .get(CLINVAR_URL)?
            .query(&[("q", query), ("rows", &params.max_results.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rows = resp["data"].as_array().cloned().unwrap_or_default();
        debug!(n = rows.len(), query, "ClinVar assertions retrieved");

        let records: Vec<Record> = rows
            .iter()
            .map(|r| {
                let mut rec = Record::new("clinvar");
                if let Some(id) = r.get("variation_id").cloned() {
                    rec.set("variation_id", id);
                }
                if let Some(gene) = r["gene"].as_str() {
                    rec.set("gene", gene);
                }
                if let Some(sig) = r["clinical_significance"].as_str() {
                    rec.set("clinical_significance", sig);
                }
                if let Some(conditions) = r.get("conditions").cloned() {
                    rec.set("conditions", conditions);
                }
                rec
            })
            .collect();

        Ok(write_ndjson(output, &records)?)
    }
}
