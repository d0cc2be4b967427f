//! WHO Global Health Observatory (GHO) feed.
//!
//! OData API: https://ghoapi.azureedge.net/api
//! Indicators are fetched one at a time from the configured
//! `who_gho_indicators` list; with no list configured the feed pulls the
//! indicator catalogue itself and walks it up to the result cap.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const WHO_GHO_BASE: &str = "https://ghoapi.azureedge.net/api";

pub struct WhoGhoFeed {
    client: Client,
}

impl WhoGhoFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }

    /// List all indicator codes from the GHO catalogue.
    async fn list_indicators(&self) -> anyhow::Result<Vec<String>> {
        let resp: serde_json::Value = self
            .client
            .get(&format!("{WHO_GHO_BASE}/Indicator"))?
            .send()
            .await?
            .json()
            .await?;

        Ok(resp["value"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v["IndicatorCode"].as_str().map(String::from))
            .collect())
    }

    async fn fetch_indicator(
        &self,
        indicator: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<Record>> {
        let resp: serde_json::Value = self
            .client
            .get(&format!("{WHO_GHO_BASE}/{indicator}"))?
            .send()
            .await?
            .json()
            .await?;

        let rows = resp["value"].as_array().cloned().unwrap_or_default();
        let records = rows
            .iter()
            .take(max_results)
            .map(|r| {
                let mut rec = Record::new("who_gho");
                rec.set("indicator", indicator);
                if let Some(country) = r["SpatialDim"].as_str() {
                    rec.set("country", country);
                }
                if let Some(year) = r["TimeDim"].as_i64() {
                    rec.set("year", year);
                }
                if let Some(value) = r.get("Value").cloned() {
                    rec.set("value", value);
                }
                rec
            })
            .collect();
        Ok(records)
    }
}

impl Default for WhoGhoFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for WhoGhoFeed {
    fn name(&self) -> &'static str {
        "who_gho"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let indicators: Vec<String> = match params.config.get_list("who_gho_indicators") {
            Some(list) => list.to_vec(),
            None => self.list_indicators().await?,
        };

        let mut records = Vec::new();
        for indicator in &indicators {
            debug!(indicator, "Fetching WHO GHO indicator");
            let batch = self.fetch_indicator(indicator, params.max_results).await?;
            records.extend(batch);
            if records.len() >= params.max_results {
                records.truncate(params.max_results);
                break;
            }
        }

        Ok(write_ndjson(output, &records)?)
    }
}
