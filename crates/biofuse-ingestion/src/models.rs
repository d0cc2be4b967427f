//! Data models for the fusion pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use biofuse_common::config::ConfigMap;

/// Concurrency-treatment class of a feed.
///
/// Medical feeds run in parallel; genomic feeds run sequentially because
/// their upstream APIs are assumed fragile under concurrent load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedClass {
    Medical,
    Genomic,
}

impl FeedClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedClass::Medical => "medical",
            FeedClass::Genomic => "genomic",
        }
    }
}

/// Name suffixes that mark a feed as genomic. Adding a new genomic source
/// requires extending this set.
pub const GENOMIC_SUFFIXES: &[&str] = &["gnomad", "1000genomes", "dbsnp", "clinvar", "gwas"];

/// Classify a feed by its registered name. Total: every name lands in
/// exactly one class.
pub fn classify(name: &str) -> FeedClass {
    if GENOMIC_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        FeedClass::Genomic
    } else {
        FeedClass::Medical
    }
}

/// Identity of a registered feed. Derived once at registration, immutable
/// for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    pub class: FeedClass,
}

impl FeedDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            class: classify(name),
        }
    }
}

/// Read-only parameters for one fusion run, shared by reference across all
/// feed executions. No feed may mutate it.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Optional query (gene, condition, trait) applied by feeds that search.
    pub query: Option<String>,
    /// Result cap per feed.
    pub max_results: usize,
    /// Contact identifier for upstreams that require one (e.g. PubMed).
    pub contact: Option<String>,
    /// Vector backend selector, passed through to the indexing trigger.
    pub backend: String,
    /// Flat key-value configuration fetched once before the run.
    pub config: ConfigMap,
    /// Whether genomic feeds run at all.
    pub include_genomics: bool,
    /// Whether to hand the medical merged artifact to the index builder.
    pub build_index: bool,
    /// Root directory for all artifacts.
    pub output_root: PathBuf,
    /// Run date, used to timestamp every artifact name.
    pub run_date: NaiveDate,
}

impl RunParams {
    pub fn raw_dir(&self) -> PathBuf {
        self.output_root.join("raw")
    }

    pub fn deid_dir(&self) -> PathBuf {
        self.output_root.join("deid")
    }

    /// Raw output path for one feed: `raw/<feed>_output_<date>.jsonl`.
    pub fn feed_output_path(&self, feed: &str) -> PathBuf {
        self.raw_dir()
            .join(format!("{feed}_output_{}.jsonl", self.run_date))
    }

    /// De-identified mirror of a feed's output: `deid/<feed>_deid_<date>.jsonl`.
    pub fn feed_deid_path(&self, feed: &str) -> PathBuf {
        self.deid_dir()
            .join(format!("{feed}_deid_{}.jsonl", self.run_date))
    }

    /// Category-level merged artifact: `fusion_<category>_<date>.jsonl`.
    pub fn merged_path(&self, category: &str) -> PathBuf {
        self.output_root
            .join(format!("fusion_{category}_{}.jsonl", self.run_date))
    }
}

/// Outcome of one feed execution. Lifetime = one pipeline run.
#[derive(Debug, Clone)]
pub struct FeedResult {
    pub name: String,
    pub class: FeedClass,
    /// Path to the raw output artifact; present iff the feed succeeded.
    pub output: Option<PathBuf>,
    pub success: bool,
    pub error: Option<String>,
}

impl FeedResult {
    pub fn ok(name: &str, output: &Path) -> Self {
        Self {
            name: name.to_string(),
            class: classify(name),
            output: Some(output.to_path_buf()),
            success: true,
            error: None,
        }
    }

    pub fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            class: classify(name),
            output: None,
            success: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_genomic_suffixes() {
        assert_eq!(classify("gnomad"), FeedClass::Genomic);
        assert_eq!(classify("1000genomes"), FeedClass::Genomic);
        assert_eq!(classify("dbsnp"), FeedClass::Genomic);
        assert_eq!(classify("clinvar"), FeedClass::Genomic);
        assert_eq!(classify("gwas"), FeedClass::Genomic);
    }

    #[test]
    fn test_classify_medical_default() {
        assert_eq!(classify("pubmed"), FeedClass::Medical);
        assert_eq!(classify("clinicaltrials"), FeedClass::Medical);
        assert_eq!(classify("who_gho"), FeedClass::Medical);
        assert_eq!(classify("labs"), FeedClass::Medical);
    }

    #[test]
    fn test_classify_is_total_and_disjoint() {
        // Every name lands in exactly one class; genomic iff a suffix matches.
        let names = [
            "pubmed", "fhir", "hl7", "labs", "who_gho", "clinicaltrials",
            "dbsnp", "clinvar", "gwas", "gnomad", "1000genomes", "my_custom_feed",
        ];
        for name in names {
            let class = classify(name);
            let is_genomic = GENOMIC_SUFFIXES.iter().any(|s| name.ends_with(s));
            match class {
                FeedClass::Genomic => assert!(is_genomic, "{name} misclassified"),
                FeedClass::Medical => assert!(!is_genomic, "{name} misclassified"),
            }
        }
    }

    #[test]
    fn test_artifact_paths_are_timestamped() {
        let params = RunParams {
            query: None,
            max_results: 10,
            contact: None,
            backend: "local".to_string(),
            config: ConfigMap::new(),
            include_genomics: false,
            build_index: false,
            output_root: PathBuf::from("data"),
            run_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert_eq!(
            params.feed_output_path("pubmed"),
            PathBuf::from("data/raw/pubmed_output_2024-01-15.jsonl")
        );
        assert_eq!(
            params.feed_deid_path("labs"),
            PathBuf::from("data/deid/labs_deid_2024-01-15.jsonl")
        );
        assert_eq!(
            params.merged_path("all"),
            PathBuf::from("data/fusion_all_2024-01-15.jsonl")
        );
    }
}
