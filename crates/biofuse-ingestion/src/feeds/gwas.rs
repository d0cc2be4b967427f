//! GWAS Catalog feed (EBI REST API).
//!
//! Fetches trait associations: SNP, p-value, odds ratio per association.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const GWAS_URL: &str = "https://www.ebi.ac.uk/gwas/rest/api/associations";

pub struct GwasFeed {
    client: Client,
}

impl GwasFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }
}

impl Default for GwasFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for GwasFeed {
    fn name(&self) -> &'static str {
        "gwas"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let trait_query = params
            .query
            .as_deref()
            .or_else(|| params.config.get_str("gwas_trait"))
            .unwrap_or("diabetes");

        let resp: serde_json::Value = self
            .client
            .get(GWAS_URL)?
            .query(&[
                ("diseaseTrait", trait_query),
                ("size", &params.max_results.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let associations = resp["_embedded"]["associations"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        debug!(n = associations.len(), trait_query, "GWAS associations retrieved");

        let records: Vec<Record> = associations
            .iter()
            .map(|a| {
                let mut rec = Record::new("gwas");
                rec.set("trait", trait_query);
                if let Some(rsid) = a["loci"][0]["rsId"].as_str() {
                    rec.set("snp", rsid);
                }
                if let Some(p) = a.get("pvalue").cloned() {
                    rec.set("pvalue", p);
                }
                if let Some(or) = a.get("orPerCopyNum").cloned() {
                    rec.set("odds_ratio", or);
                }
                rec
            })
            .collect();

        Ok(write_ndjson(output, &records)?)
    }
}
