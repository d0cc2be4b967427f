//! ClinicalTrials.gov v2 API feed.
//!
//! API docs: https://clinicaltrials.gov/data-api/api
//! Endpoint: https://clinicaltrials.gov/api/v2/studies

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const CT_API_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

pub struct ClinicalTrialsFeed {
    client: Client,
}

impl ClinicalTrialsFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }

    async fn search_studies(
        &self,
        query: Option<&str>,
        max_results: usize,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut params = vec![
            ("format", "json".to_string()),
            ("pageSize", max_results.to_string()),
            (
                "fields",
                "NCTId,BriefTitle,BriefSummary,OverallStatus,Phase,Condition,\
                 InterventionName,LeadSponsorName,StartDate,CompletionDate"
                    .to_string(),
            ),
        ];
        if let Some(q) = query {
            params.push(("query.term", q.to_string()));
        }

        let resp = self
            .client
            .get(CT_API_URL)?
            .query(&params)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        Ok(resp["studies"].as_array().cloned().unwrap_or_default())
    }
}

impl Default for ClinicalTrialsFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for ClinicalTrialsFeed {
    fn name(&self) -> &'static str {
        "clinicaltrials"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let studies = self.search_studies(params.query.as_deref(), params.max_results).await?;
        debug!(n = studies.len(), "ClinicalTrials.gov studies retrieved");

        let records: Vec<Record> = studies
            .iter()
            .map(|s| {
                let proto = &s["protocolSection"];
                let id_mod = &proto["identificationModule"];
                let desc_mod = &proto["descriptionModule"];
                let status_mod = &proto["statusModule"];
                let design_mod = &proto["designModule"];
                let cond_mod = &proto["conditionsModule"];
                let sponsor_mod = &proto["sponsorCollaboratorsModule"];

                let mut rec = Record::new("clinicaltrials");
                if let Some(nct) = id_mod["nctId"].as_str() {
                    rec.set("nct_id", nct);
                }
                if let Some(title) = id_mod["briefTitle"].as_str() {
                    rec.set("title", title);
                }
                if let Some(summary) = desc_mod["briefSummary"]["textBlock"].as_str() {
                    rec.set("summary", summary);
                }
                if let Some(status) = status_mod["overallStatus"].as_str() {
                    rec.set("status", status);
                }
                if let Some(phase) = design_mod["phases"]
                    .as_array()
                    .and_then(|p| p.first())
                    .and_then(|p| p.as_str())
                {
                    rec.set("phase", phase);
                }
                if let Some(conditions) = cond_mod["conditions"].as_array() {
                    let list: Vec<String> = conditions
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect();
                    rec.set("conditions", list);
                }
                if let Some(sponsor) = sponsor_mod["leadSponsor"]["name"].as_str() {
                    rec.set("sponsor", sponsor);
                }
                if let Some(start) = status_mod["startDateStruct"]["date"].as_str() {
                    rec.set("start_date", start);
                }
                rec
            })
            .collect();

        Ok(write_ndjson(output, &records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_is_medical() {
        use crate::models::{classify, FeedClass};
        let feed = ClinicalTrialsFeed::default();
        assert_eq!(classify(feed.name()), FeedClass::Medical);
    }
}
