use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::BiofuseError;

/// A sandbox-capped HTTP client that only allows requests to approved domains.
/// Every feed client goes through this so a misconfigured feed cannot reach
/// arbitrary hosts.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new client with the default allowlist of upstream data sources.
    pub fn new() -> Result<Self, BiofuseError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "eutils.ncbi.nlm.nih.gov",       // PubMed E-utilities
            "api.ncbi.nlm.nih.gov",          // dbSNP / ClinVar variation API
            "clinicaltrials.gov",            // ClinicalTrials.gov v2
            "ghoapi.azureedge.net",          // WHO GHO OData
            "www.ebi.ac.uk",                 // GWAS Catalog
            "gnomad.broadinstitute.org",     // gnomAD GraphQL
            "rest.ensembl.org",              // 1000 Genomes via Ensembl
            "localhost",                     // local FHIR test servers
            "127.0.0.1",
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("biofuse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BiofuseError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist (e.g. a configured FHIR host).
    pub fn allow_domain(&mut self, domain: &str) {
        debug!(domain, "Domain added to sandbox allowlist");
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// GET request builder, gated by the allowlist.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, BiofuseError> {
        if !self.is_allowed(url) {
            warn!(url, "Blocked request to unlisted domain");
            return Err(BiofuseError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.get(url))
    }

    /// POST request builder, gated by the allowlist.
    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, BiofuseError> {
        if !self.is_allowed(url) {
            warn!(url, "Blocked request to unlisted domain");
            return Err(BiofuseError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.post(url))
    }
}
