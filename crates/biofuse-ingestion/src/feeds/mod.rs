//! Ingestion feed clients and the feed registry.

pub mod clinicaltrials;
pub mod clinvar;
pub mod dbsnp;
pub mod fhir;
pub mod gnomad;
pub mod gwas;
pub mod hl7;
pub mod labs;
pub mod pubmed;
pub mod thousand_genomes;
pub mod who_gho;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::models::{FeedClass, FeedDescriptor, RunParams};

/// Uniform contract every ingestion feed implements.
///
/// A feed writes zero or more Records as NDJSON to `output` and signals
/// failure by returning an error. Feeds may ignore parameters irrelevant to
/// them (e.g. `contact` outside PubMed) but must accept the full parameter
/// set, which is what lets the runner invoke arbitrary feeds uniformly.
/// A partially written file from a failed feed is never used downstream.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Stable feed identifier. Classification and per-feed config keys
    /// (`<name>_requires_deid`) are derived from this name.
    fn name(&self) -> &'static str;

    /// Execute the feed, returning the number of records written.
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize>;
}

/// Startup-time table of available feeds.
///
/// Registration order is preserved; it is the execution order for the
/// sequential (genomic) partition.
#[derive(Default)]
pub struct FeedRegistry {
    feeds: Vec<Arc<dyn Feed>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in feed.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(pubmed::PubMedFeed::new()));
        registry.register(Arc::new(clinicaltrials::ClinicalTrialsFeed::new()));
        registry.register(Arc::new(who_gho::WhoGhoFeed::new()));
        registry.register(Arc::new(fhir::FhirFeed::new()));
        registry.register(Arc::new(hl7::Hl7Feed::new()));
        registry.register(Arc::new(labs::LabsFeed::new()));
        registry.register(Arc::new(dbsnp::DbSnpFeed::new()));
        registry.register(Arc::new(clinvar::ClinVarFeed::new()));
        registry.register(Arc::new(gwas::GwasFeed::new()));
        registry.register(Arc::new(gnomad::GnomadFeed::new()));
        registry.register(Arc::new(thousand_genomes::ThousandGenomesFeed::new()));
        registry
    }

    pub fn register(&mut self, feed: Arc<dyn Feed>) {
        self.feeds.push(feed);
    }

    pub fn feeds(&self) -> &[Arc<dyn Feed>] {
        &self.feeds
    }

    /// Descriptors for all registered feeds, in registration order.
    pub fn descriptors(&self) -> Vec<FeedDescriptor> {
        self.feeds.iter().map(|f| FeedDescriptor::new(f.name())).collect()
    }

    /// Split into (medical, genomic) partitions by the suffix rule,
    /// preserving registration order within each partition.
    pub fn partition(&self) -> (Vec<Arc<dyn Feed>>, Vec<Arc<dyn Feed>>) {
        let mut medical = Vec::new();
        let mut genomic = Vec::new();
        for feed in &self.feeds {
            match FeedDescriptor::new(feed.name()).class {
                FeedClass::Medical => medical.push(feed.clone()),
                FeedClass::Genomic => genomic.push(feed.clone()),
            }
        }
        (medical, genomic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_partition_is_total() {
        let registry = FeedRegistry::builtin();
        let n = registry.feeds().len();
        let (medical, genomic) = registry.partition();
        assert_eq!(medical.len() + genomic.len(), n);
        assert!(!medical.is_empty());
        assert!(!genomic.is_empty());
    }

    #[test]
    fn test_builtin_genomic_partition_members() {
        let registry = FeedRegistry::builtin();
        let (_, genomic) = registry.partition();
        let names: Vec<&str> = genomic.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["dbsnp", "clinvar", "gwas", "gnomad", "1000genomes"]);
    }

    #[test]
    fn test_descriptors_follow_registration_order() {
        let registry = FeedRegistry::builtin();
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].name, "pubmed");
        let names: Vec<String> = registry.feeds().iter().map(|f| f.name().to_string()).collect();
        let desc_names: Vec<String> = descriptors.into_iter().map(|d| d.name).collect();
        assert_eq!(names, desc_names);
    }
}
