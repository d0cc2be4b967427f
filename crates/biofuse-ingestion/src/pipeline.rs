//! Fusion pipeline orchestrator.
//!
//! One run = medical feeds in parallel, genomic feeds sequentially (opt-in),
//! per-feed de-identification where configured, then category merges and the
//! optional indexing trigger. Feed failures never abort the run; they are
//! collected and reported at the end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use biofuse_index::VectorBackend;

use crate::deid;
use crate::feeds::FeedRegistry;
use crate::merge::merge_files;
use crate::models::{FeedClass, FeedResult, RunParams};
use crate::runner::{run_parallel, run_sequential};

/// Summary of one complete fusion run.
#[derive(Debug)]
pub struct FusionResult {
    pub run_id: Uuid,
    pub feeds_run: usize,
    pub feeds_failed: usize,
    pub medical_artifact: Option<PathBuf>,
    pub genomic_artifact: Option<PathBuf>,
    pub all_artifact: Option<PathBuf>,
    pub errors: Vec<String>,
    pub duration_ms: u128,
}

/// Apply the de-identification gate to one successful feed result.
///
/// A feed with `<name>_requires_deid = true` in config contributes its
/// scrubbed mirror to the merge instead of the raw file. A deid failure
/// demotes the feed to failed so raw PHI never reaches an artifact.
fn apply_deid_gate(result: FeedResult, params: &RunParams) -> FeedResult {
    let requires = params
        .config
        .get_bool(&format!("{}_requires_deid", result.name))
        .unwrap_or(false);
    if !requires || !result.success {
        return result;
    }

    let Some(raw) = result.output.as_deref() else {
        return result;
    };
    let deid_path = params.feed_deid_path(&result.name);
    match deid::process_file(raw, &deid_path) {
        Ok(path) => {
            info!(feed = %result.name, output = %path.display(), "De-identified feed output");
            FeedResult::ok(&result.name, &path)
        }
        Err(e) => {
            warn!(feed = %result.name, error = %e, "De-identification failed, dropping feed from merge");
            FeedResult::failed(&result.name, format!("de-identification failed: {e}"))
        }
    }
}

/// Run the full fusion pipeline against the registered feeds.
pub async fn run_fusion(
    params: Arc<RunParams>,
    registry: &FeedRegistry,
    backend: Option<&dyn VectorBackend>,
) -> FusionResult {
    let run_id = Uuid::new_v4();
    let started = Instant::now();
    let mut errors = Vec::new();

    let roster: Vec<String> = registry
        .descriptors()
        .iter()
        .map(|d| format!("{} ({})", d.name, d.class.as_str()))
        .collect();
    info!(
        %run_id,
        feeds = ?roster,
        include_genomics = params.include_genomics,
        "Starting fusion run"
    );

    if let Err(e) = std::fs::create_dir_all(params.raw_dir()) {
        error!(error = %e, "Cannot create raw output directory");
        errors.push(format!("output setup: {e}"));
        return FusionResult {
            run_id,
            feeds_run: 0,
            feeds_failed: 0,
            medical_artifact: None,
            genomic_artifact: None,
            all_artifact: None,
            errors,
            duration_ms: started.elapsed().as_millis(),
        };
    }
    if let Err(e) = std::fs::create_dir_all(params.deid_dir()) {
        error!(error = %e, "Cannot create deid output directory");
        errors.push(format!("output setup: {e}"));
    }

    let (medical, genomic) = registry.partition();

    let mut results: Vec<FeedResult> = run_parallel(medical, Arc::clone(&params))
        .await
        .into_iter()
        .map(|r| apply_deid_gate(r, &params))
        .collect();

    if params.include_genomics {
        let genomic_results = run_sequential(genomic, Arc::clone(&params)).await;
        results.extend(genomic_results.into_iter().map(|r| apply_deid_gate(r, &params)));
    } else if !genomic.is_empty() {
        info!(skipped = genomic.len(), "Genomic feeds disabled for this run");
    }

    let feeds_run = results.len();
    for r in results.iter().filter(|r| !r.success) {
        let detail = r.error.as_deref().unwrap_or("unknown error");
        warn!(feed = %r.name, error = detail, "Feed failed");
        errors.push(format!("{}: {detail}", r.name));
    }
    let feeds_failed = results.iter().filter(|r| !r.success).count();

    let outputs_for = |class: FeedClass| -> Vec<PathBuf> {
        results
            .iter()
            .filter(|r| r.class == class)
            .filter_map(|r| r.output.clone())
            .collect()
    };

    let medical_artifact = merge_category(
        &outputs_for(FeedClass::Medical),
        &params.merged_path("medical"),
        "medical",
        &mut errors,
    );
    let genomic_artifact = merge_category(
        &outputs_for(FeedClass::Genomic),
        &params.merged_path("genomic"),
        "genomic",
        &mut errors,
    );

    let mut all_inputs = Vec::new();
    all_inputs.extend(medical_artifact.clone());
    all_inputs.extend(genomic_artifact.clone());
    let all_artifact =
        merge_category(&all_inputs, &params.merged_path("all"), "all", &mut errors);

    if params.build_index {
        match (backend, &medical_artifact) {
            (Some(backend), Some(artifact)) => {
                info!(backend = backend.name(), input = %artifact.display(), "Triggering index build");
                if let Err(e) = backend.build_index(artifact).await {
                    error!(error = %e, "Index build failed");
                    errors.push(format!("index build: {e}"));
                }
            }
            (None, _) => {
                warn!("Index build requested but no backend is available");
                errors.push("index build: no backend available".to_string());
            }
            (_, None) => {
                warn!("Index build requested but no medical artifact was produced");
            }
        }
    }

    let duration_ms = started.elapsed().as_millis();
    info!(
        %run_id,
        feeds_run,
        feeds_failed,
        medical = medical_artifact.is_some(),
        genomic = genomic_artifact.is_some(),
        duration_ms,
        "Fusion run complete"
    );

    FusionResult {
        run_id,
        feeds_run,
        feeds_failed,
        medical_artifact,
        genomic_artifact,
        all_artifact,
        errors,
        duration_ms,
    }
}

fn merge_category(
    inputs: &[PathBuf],
    dest: &std::path::Path,
    category: &str,
    errors: &mut Vec<String>,
) -> Option<PathBuf> {
    match merge_files(inputs, dest) {
        Ok(Some(path)) => {
            info!(category, artifact = %path.display(), "Merged category artifact");
            Some(path)
        }
        Ok(None) => {
            info!(category, "No inputs for category, skipping artifact");
            None
        }
        Err(e) => {
            error!(category, error = %e, "Category merge failed");
            errors.push(format!("merge {category}: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::Feed;
    use async_trait::async_trait;
    use biofuse_common::config::ConfigMap;
    use biofuse_common::record::Record;
    use chrono::NaiveDate;
    use std::path::Path;

    struct JsonFeed {
        name: &'static str,
        payload: &'static str,
    }

    #[async_trait]
    impl Feed for JsonFeed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _params: &RunParams, output: &Path) -> anyhow::Result<usize> {
            let mut record = Record::new(self.name);
            record.set("text", serde_json::Value::String(self.payload.to_string()));
            biofuse_common::record::write_ndjson(output, &[record])?;
            Ok(1)
        }
    }

    struct FailingFeed;

    #[async_trait]
    impl Feed for FailingFeed {
        fn name(&self) -> &'static str {
            "fhir"
        }

        async fn run(&self, _params: &RunParams, _output: &Path) -> anyhow::Result<usize> {
            anyhow::bail!("upstream returned 500")
        }
    }

    fn params(root: &Path, config: ConfigMap, include_genomics: bool) -> Arc<RunParams> {
        Arc::new(RunParams {
            query: None,
            max_results: 10,
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
    async fn test_failed_feed_excluded_from_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FeedRegistry::new();
        registry.register(Arc::new(JsonFeed { name: "labs", payload: "wbc 7.2" }));
        registry.register(Arc::new(FailingFeed));

        let result = run_fusion(params(dir.path(), ConfigMap::new(), false), &registry, None).await;

        assert_eq!(result.feeds_run, 2);
        assert_eq!(result.feeds_failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("fhir:"));

        let artifact = result.medical_artifact.unwrap();
        let merged = std::fs::read_to_string(&artifact).unwrap();
        assert_eq!(merged.lines().count(), 1);
        assert!(merged.contains("wbc 7.2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_genomics_disabled_produces_no_genomic_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FeedRegistry::new();
        registry.register(Arc::new(JsonFeed { name: "labs", payload: "hgb 13.1" }));
        registry.register(Arc::new(JsonFeed { name: "clinvar", payload: "rs429358" }));

        let result = run_fusion(params(dir.path(), ConfigMap::new(), false), &registry, None).await;

        assert_eq!(result.feeds_run, 1);
        assert!(result.genomic_artifact.is_none());
        let all = std::fs::read_to_string(result.all_artifact.unwrap()).unwrap();
        let medical = std::fs::read_to_string(result.medical_artifact.unwrap()).unwrap();
        assert_eq!(all, medical);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deid_gate_scrubs_configured_feed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigMap::new();
        config.insert("labs_requires_deid", biofuse_common::config::ConfigValue::Bool(true));

        let mut registry = FeedRegistry::new();
        registry.register(Arc::new(JsonFeed {
            name: "labs",
            payload: "patient John Smith ssn 123-45-6789",
        }));

        let result = run_fusion(params(dir.path(), config, false), &registry, None).await;

        let artifact = result.medical_artifact.unwrap();
        let merged = std::fs::read_to_string(&artifact).unwrap();
        assert!(!merged.contains("123-45-6789"));
        assert!(!merged.contains("John Smith"));
        assert!(merged.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_all_artifact_orders_medical_before_genomic() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = FeedRegistry::new();
        registry.register(Arc::new(JsonFeed { name: "labs", payload: "medical line" }));
        registry.register(Arc::new(JsonFeed { name: "clinvar", payload: "genomic line" }));

        let result = run_fusion(params(dir.path(), ConfigMap::new(), true), &registry, None).await;

        assert!(result.genomic_artifact.is_some());
        let all = std::fs::read_to_string(result.all_artifact.unwrap()).unwrap();
        let medical_pos = all.find("medical line").unwrap();
        let genomic_pos = all.find("genomic line").unwrap();
        assert!(medical_pos < genomic_pos);
    }
}
