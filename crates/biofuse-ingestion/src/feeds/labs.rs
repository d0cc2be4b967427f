//! Lab-results feed.
//!
//! Reads NDJSON lab-result exports (`*.jsonl`) dropped into the configured
//! `labs_input_dir`, re-tags each record with this feed as its source, and
//! writes them through. Lab exports routinely contain PHI, so deployments
//! set `labs_requires_deid = true` to route this feed through the
//! de-identification gate.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{read_ndjson, write_ndjson, Record};

use super::Feed;
use crate::models::RunParams;

pub struct LabsFeed;

impl LabsFeed {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LabsFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for LabsFeed {
    fn name(&self) -> &'static str {
        "labs"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let input_dir = params
            .config
            .get_str("labs_input_dir")
            .ok_or_else(|| anyhow::anyhow!("labs feed requires labs_input_dir in config"))?;

        let mut records: Vec<Record> = Vec::new();
        let mut paths: Vec<_> = std::fs::read_dir(input_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
            .collect();
        paths.sort();

        for path in paths {
            for rec in read_ndjson(&path)? {
                records.push(Record::from_map("labs", rec.into_fields()));
                if records.len() >= params.max_results {
                    break;
                }
            }
            if records.len() >= params.max_results {
                break;
            }
        }

        debug!(n = records.len(), "Lab results collected");
        Ok(write_ndjson(output, &records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biofuse_common::config::{ConfigMap, ConfigValue};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn params_with_dir(dir: &Path) -> RunParams {
        let mut config = ConfigMap::new();
        config.insert(
            "labs_input_dir",
            ConfigValue::Str(dir.to_string_lossy().into_owned()),
        );
        RunParams {
            query: None,
            max_results: 100,
            contact: None,
            backend: "local".to_string(),
            config,
            include_genomics: false,
            build_index: false,
            output_root: PathBuf::from("data"),
            run_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_labs_feed_retags_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("batch1.jsonl"),
            "{\"patient_id\":\"PID123\",\"test\":\"Hemoglobin\",\"value\":\"13.2\"}\n",
        )
        .unwrap();
        let out = dir.path().join("labs_out.jsonl");

        let feed = LabsFeed::new();
        let n = feed.run(&params_with_dir(dir.path()), &out).await.unwrap();
        assert_eq!(n, 1);

        let records = read_ndjson(&out).unwrap();
        assert_eq!(records[0].source(), Some("labs"));
        assert_eq!(records[0].get("test").and_then(|v| v.as_str()), Some("Hemoglobin"));
    }

    #[tokio::test]
    async fn test_labs_feed_requires_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = params_with_dir(dir.path());
        params.config = ConfigMap::new();
        let out = dir.path().join("out.jsonl");
        assert!(LabsFeed::new().run(&params, &out).await.is_err());
    }
}
