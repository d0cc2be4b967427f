//! 1000 Genomes feed, via the Ensembl region-overlap API.
//!
//! Registered as "1000genomes" so the suffix rule lands it in the genomic
//! partition. Region bounds come from config (`thousand_genomes_chrom` /
//! `_start` / `_end`), defaulting to a small chr1 window.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const ENSEMBL_API: &str = "https://rest.ensembl.org";

pub struct ThousandGenomesFeed {
    client: Client,
}

impl ThousandGenomesFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }
}

impl Default for ThousandGenomesFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for ThousandGenomesFeed {
    fn name(&self) -> &'static str {
        "1000genomes"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let chrom = params.config.get_str("thousand_genomes_chrom").unwrap_or("1");
        let start = params.config.get_i64("thousand_genomes_start").unwrap_or(1_000_000);
        let end = params.config.get_i64("thousand_genomes_end").unwrap_or(1_001_000);

        let url =
            format!("{ENSEMBL_API}/overlap/region/human/{chrom}:{start}-{end}?feature=variation");

        let variants: Vec<serde_json::Value> = self
            .client
            .get(&url)?
            .header("Content-Type", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(n = variants.len(), chrom, start, end, "Ensembl variants retrieved");

        let records: Vec<Record> = variants
            .iter()
            .take(params.max_results)
            .map(|v| {
                let mut rec = Record::new("1000genomes");
                if let Some(id) = v["id"].as_str() {
                    rec.set("id", id);
                }
                rec.set("chromosome", chrom);
                if let Some(s) = v["start"].as_i64() {
                    rec.set("start", s);
                }
                if let Some(e) = v["end"].as_i64() {
                    rec.set("end", e);
                }
                if let Some(strand) = v["strand"].as_i64() {
                    rec.set("strand", strand);
                }
                if let Some(csq) = v.get("consequence_type").cloned() {
                    rec.set("consequence", csq);
                }
                rec
            })
            .collect();

        Ok(write_ndjson(output, &records)?)
    }
}
