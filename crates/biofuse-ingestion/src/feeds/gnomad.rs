//! gnomAD variant feed (GraphQL API).
//!
//! Region query against the gnomAD GraphQL endpoint. Region bounds come
//! from config (`gnomad_chrom` / `gnomad_start` / `gnomad_stop`), defaulting
//! to a small chr1 window.

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const GNOMAD_URL: &str = "https://gnomad.broadinstitute.org/api";

const VARIANT_QUERY: &str = r#"
query Variants($chrom: String!, $start: Int!, $stop: Int!, $dataset: DatasetId!) {
  region(chrom: $chrom, start: $start, stop: $stop, reference_genome: GRCh38) {
    variants(dataset: $dataset) {
      variant_id
      chrom
      pos
      ref
      alt
      consequence
    }
  }
}
"#;

pub struct GnomadFeed {
    client: Client,
}

impl GnomadFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }
}

impl Default for GnomadFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for GnomadFeed {
    fn name(&self) -> &'static str {
        "gnomad"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let chrom = params.config.get_str("gnomad_chrom").unwrap_or("1");
        let start = params.config.get_i64("gnomad_start").unwrap_or(1_000_000);
        let stop = params.config.get_i64("gnomad_stop").unwrap_or(1_001_000);
        let dataset = params.config.get_str("gnomad_dataset").unwrap_or("gnomad_r4");

        let body = json!({
            "query": VARIANT_QUERY,
            "variables": {
                "chrom": chrom,
                "start": start,
                "stop": stop,
                "dataset": dataset,
            }
        });

        let resp: serde_json::Value = self
            .client
            .post(GNOMAD_URL)?
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let variants = resp["data"]["region"]["variants"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        debug!(n = variants.len(), chrom, start, stop, "gnomAD variants retrieved");

        let records: Vec<Record> = variants
            .iter()
            .take(params.max_results)
            .filter_map(|v| v.as_object().cloned())
            .map(|fields| Record::from_map("gnomad", fields))
            .collect();

        Ok(write_ndjson(output, &records)?)
    }
}
