//! FHIR (R4) bundle feed.
//!
//! Pulls resources of the configured types from a FHIR endpoint, following
//! the bundle `next` link for pagination. The base URL host is added to the
//! sandbox allowlist at run time since EHR endpoints are deployment-specific.
//!
//! Config keys: `fhir_base_url` (required), `fhir_auth_token`,
//! `fhir_resources` (default Patient/Condition/Observation/MedicationRequest).

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const DEFAULT_RESOURCES: &[&str] = &["Patient", "Condition", "Observation", "MedicationRequest"];

pub struct FhirFeed;

impl FhirFeed {
    pub fn new() -> Self {
        Self
    }

    /// Fetch one resource type, following `next` links until a page yields
    /// no entries or `budget` records have been taken.
    async fn fetch_resources(
        &self,
        client: &Client,
        base_url: &str,
        resource_type: &str,
        auth_token: Option<&str>,
        budget: usize,
    ) -> anyhow::Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut next: Option<String> =
            Some(format!("{base_url}/{resource_type}?_count={budget}"));

        while let Some(url) = next.take() {
            debug!(%url, resource_type, "Fetching FHIR bundle page");
            let mut req = client.get(&url)?.header("Accept", "application/fhir+json");
            if let Some(token) = auth_token {
                req = req.header("Authorization", format!("Bearer {token}"));
            }
            let bundle: Value = req.send().await?.error_for_status()?.json().await?;

            let remaining = budget - records.len();
            let taken = take_bundle_entries(&bundle, &mut records, remaining);
            if records.len() >= budget {
                break;
            }
            // An entry-less page that still advertises a next link would
            // otherwise loop forever.
            if taken == 0 {
                break;
            }
            next = next_page_url(&bundle);
        }

        Ok(records)
    }
}

impl Default for FhirFeed {
    fn default() -> Self { Self::new() }
}

/// Pull resources out of one bundle page, taking at most `budget` more.
/// Returns how many records were taken from this page.
fn take_bundle_entries(bundle: &Value, records: &mut Vec<Record>, budget: usize) -> usize {
    let mut taken = 0;
    if let Some(entries) = bundle["entry"].as_array() {
        for entry in entries {
            if taken >= budget {
                break;
            }
            if let Some(resource) = entry["resource"].as_object() {
                records.push(Record::from_map("fhir", resource.clone()));
                taken += 1;
            }
        }
    }
    taken
}

/// FHIR pagination: the link with relation `next` carries the follow-up URL.
fn next_page_url(bundle: &Value) -> Option<String> {
    bundle["link"].as_array().and_then(|links| {
        links
            .iter()
            .find(|l| l["relation"].as_str() == Some("next"))
            .and_then(|l| l["url"].as_str().map(String::from))
    })
}

#[async_trait]
impl Feed for FhirFeed {
    fn name(&self) -> &'static str {
        "fhir"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let base_url = params
            .config
            .get_str("fhir_base_url")
            .ok_or_else(|| anyhow::anyhow!("fhir feed requires fhir_base_url in config"))?
            .trim_end_matches('/')
            .to_string();
        let auth_token = params.config.get_str("fhir_auth_token");

        let mut client = Client::new()?;
        if let Some(host) = Url::parse(&base_url).ok().and_then(|u| u.host_str().map(String::from)) {
            client.allow_domain(&host);
        }

        let resources: Vec<String> = params
            .config
            .get_list("fhir_resources")
            .map(|l| l.to_vec())
            .unwrap_or_else(|| DEFAULT_RESOURCES.iter().map(|s| s.to_string()).collect());

        // max_results caps the whole feed, not each resource type.
        let mut records = Vec::new();
        for resource_type in &resources {
            if records.len() >= params.max_results {
                break;
            }
            let remaining = params.max_results - records.len();
            let batch = self
                .fetch_resources(&client, &base_url, resource_type, auth_token, remaining)
                .await?;
            records.extend(batch);
        }

        Ok(write_ndjson(output, &records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_bundle_entries_respects_budget() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "p1" } },
                { "resource": { "resourceType": "Patient", "id": "p2" } },
                { "resource": { "resourceType": "Patient", "id": "p3" } },
            ]
        });

        let mut records = Vec::new();
        let taken = take_bundle_entries(&bundle, &mut records, 2);
        assert_eq!(taken, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id").and_then(|v| v.as_str()), Some("p1"));
        assert_eq!(records[0].source(), Some("fhir"));
    }

    #[test]
    fn test_entryless_page_takes_nothing() {
        // A server may keep advertising a next link on an empty page; a
        // zero take is the pagination loop's stop signal.
        let bundle = json!({
            "resourceType": "Bundle",
            "link": [ { "relation": "next", "url": "https://fhir.example.org/Patient?page=2" } ]
        });

        let mut records = Vec::new();
        assert_eq!(take_bundle_entries(&bundle, &mut records, 10), 0);
        assert!(records.is_empty());
        // The next link is still parsed; only the empty take stops the loop.
        assert_eq!(
            next_page_url(&bundle).as_deref(),
            Some("https://fhir.example.org/Patient?page=2")
        );
    }

    #[test]
    fn test_next_page_url_absent_without_next_relation() {
        let bundle = json!({
            "link": [ { "relation": "self", "url": "https://fhir.example.org/Patient" } ]
        });
        assert!(next_page_url(&bundle).is_none());
    }
}
