//! dbSNP variant feed.
//!
//! Fetches refSNP metadata from the NCBI variation API, one rsID at a time
//! from the configured `dbsnp_rsid_list`. Genomic class: always run
//! sequentially, never in the parallel partition.

use async_trait::async_trait;
use std::path::Path;
use tracing::{instrument, warn};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const REFSNP_URL: &str = "https://api.ncbi.nlm.nih.gov/variation/v0/refsnp";

pub struct DbSnpFeed {
    client: Client,
}

impl DbSnpFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }

    async fn fetch_rsid(&self, rsid: &str) -> anyhow::Result<Option<Record>> {
        let id = rsid.trim_start_matches("rs");
        let resp = self.client.get(&format!("{REFSNP_URL}/{id}"))?.send().await?;
        if !resp.status().is_success() {
            warn!(rsid, status = %resp.status(), "dbSNP lookup failed, skipping");
            return Ok(None);
        }
        let data: serde_json::Value = resp.json().await?;

        let mut rec = Record::new("dbsnp");
        rec.set("rsid", rsid);
        if let Some(seq_id) = data["primary_snapshot_data"]["placements_with_allele"][0]["seq_id"].as_str()
        {
            rec.set("chrom", seq_id);
        }
        if let Some(annotations) = data["primary_snapshot_data"]["allele_annotations"].as_array() {
            rec.set("n_allele_annotations", annotations.len() as i64);
        }
        Ok(Some(rec))
    }
}

impl Default for DbSnpFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for DbSnpFeed {
    fn name(&self) -> &'static str {
        "dbsnp"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let default_rsids = ["rs7412".to_string(), "rs429358".to_string()];
        let rsids: Vec<String> = params
            .config
            .get_list("dbsnp_rsid_list")
            .map(|l| l.to_vec())
            .unwrap_or_else(|| default_rsids.to_vec());

        let mut records = Vec::new();
        for rsid in rsids.iter().take(params.max_results) {
            if let Some(rec) = self.fetch_rsid(rsid).await? {
                records.push(rec);
            }
        }

        Ok(write_ndjson(output, &records)?)
    }
}
