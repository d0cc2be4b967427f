//! End-to-end fusion runs against stub feeds: artifact layout, failure
//! isolation, the de-identification gate, and rerun stability.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use biofuse_common::config::{ConfigMap, ConfigValue};
use biofuse_common::record::{read_ndjson, write_ndjson, Record};
use biofuse_ingestion::feeds::{Feed, FeedRegistry};
use biofuse_ingestion::models::RunParams;
use biofuse_ingestion::pipeline::run_fusion;
use chrono::NaiveDate;

struct StubFeed {
    name: &'static str,
    lines: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl Feed for StubFeed {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let records: Vec<Record> = self
            .lines
            .iter()
            .map(|(key, value)| {
                let mut r = Record::new(self.name);
                r.set(*key, serde_json::Value::String(value.to_string()));
                r
            })
            .collect();
        write_ndjson(output, &records)?;
        Ok(records.len())
    }
}

struct BrokenFeed;

#[async_trait]
impl Feed for BrokenFeed {
    fn name(&self) -> &'static str {
        "who_gho"
    }

    async fn run(&self, _params: &RunParams, _output: &Path) -> anyhow::Result<usize> {
        anyhow::bail!("connection refused")
    }
}

fn registry() -> FeedRegistry {
    let mut registry = FeedRegistry::new();
    registry.register(Arc::new(StubFeed {
        name: "labs",
        lines: vec![
            ("text", "patient Jane Doe wbc 7.2"),
            ("collection_date", "1984-02-11"),
            ("text", "patient Mark Webb phone 5551234567"),
        ],
    }));
    registry.register(Arc::new(StubFeed {
        name: "clinicaltrials",
        lines: vec![("title", "Olaparib maintenance study")],
    }));
    registry.register(Arc::new(BrokenFeed));
    registry.register(Arc::new(StubFeed {
        name: "clinvar",
        lines: vec![("rsid", "rs429358")],
    }));
    registry
}

fn params(root: &Path, include_genomics: bool) -> Arc<RunParams> {
    let mut config = ConfigMap::new();
    config.insert("labs_requires_deid", ConfigValue::Bool(true));
    Arc::new(RunParams {
        query: Some("BRCA1".to_string()),
        max_results: 50,
        contact: None,
        backend: "local".to_string(),
        config,
        include_genomics,
        build_index: false,
        output_root: root.to_path_buf(),
        run_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_medical_only_run() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();

    let result = run_fusion(params(dir.path(), false), &registry, None).await;

    // Three medical feeds ran; the genomic one was skipped entirely.
    assert_eq!(result.feeds_run, 3);
    assert_eq!(result.feeds_failed, 1);
    assert!(result.errors.iter().any(|e| e.starts_with("who_gho:")));
    assert!(result.genomic_artifact.is_none());

    let artifact = result.medical_artifact.expect("medical artifact missing");
    assert!(artifact
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("fusion_medical_"));

    let records = read_ndjson(&artifact).unwrap();
    assert_eq!(records.len(), 4);

    // The labs feed went through the deid gate.
    let merged = std::fs::read_to_string(&artifact).unwrap();
    assert!(!merged.contains("Jane Doe"));
    assert!(!merged.contains("5551234567"));
    assert!(!merged.contains("1984-02-11"));
    assert!(merged.contains("[REDACTED]"));
    assert!(merged.contains("Olaparib maintenance study"));

    // With no genomic contribution the all artifact equals the medical one.
    let all = std::fs::read_to_string(result.all_artifact.unwrap()).unwrap();
    assert_eq!(all, merged);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_genomics_run_appends_after_medical() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();

    let result = run_fusion(params(dir.path(), true), &registry, None).await;

    assert_eq!(result.feeds_run, 4);
    let genomic = std::fs::read_to_string(result.genomic_artifact.unwrap()).unwrap();
    assert!(genomic.contains("rs429358"));

    let all = std::fs::read_to_string(result.all_artifact.unwrap()).unwrap();
    let medical = std::fs::read_to_string(result.medical_artifact.unwrap()).unwrap();
    assert!(all.starts_with(&medical));
    assert!(all.ends_with(&genomic));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_produces_same_record_set() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let registry = registry();

    let first = run_fusion(params(dir_a.path(), true), &registry, None).await;
    let second = run_fusion(params(dir_b.path(), true), &registry, None).await;

    // Parallel completion order may differ between runs; the record sets
    // must not.
    let set = |path: &Path| -> BTreeSet<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    };
    assert_eq!(
        set(&first.all_artifact.unwrap()),
        set(&second.all_artifact.unwrap())
    );
}
