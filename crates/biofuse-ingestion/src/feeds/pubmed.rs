//! PubMed E-utilities feed.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! PubMed requires a contact identifier on every request; the feed fails
//! fast when neither the run parameters nor the config provide one.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use tracing::{debug, instrument, warn};

use biofuse_common::record::{write_ndjson, Record};
use biofuse_common::sandbox::SandboxClient as Client;

use super::Feed;
use crate::models::RunParams;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct PubMedFeed {
    client: Client,
}

impl PubMedFeed {
    pub fn new() -> Self {
        Self { client: Client::new().unwrap() }
    }

    /// Search PubMed and return a list of PMIDs.
    #[instrument(skip(self))]
    async fn esearch(&self, query: &str, contact: &str, max: usize) -> anyhow::Result<Vec<String>> {
        let params = [
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", max.to_string()),
            ("retmode", "json".to_string()),
            ("email", contact.to_string()),
        ];

        let resp: serde_json::Value = self
            .client
            .get(ESEARCH_URL)?
            .query(&params)
            .send()
            .await?
            .json()
            .await?;

        let ids = resp["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        debug!(?ids, "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch PubMed XML for a list of PMIDs and parse into Records.
    #[instrument(skip(self, pmids))]
    async fn efetch_abstracts(&self, pmids: &[String]) -> anyhow::Result<Vec<Record>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let params = [
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];

        let xml = self
            .client
            .get(EFETCH_URL)?
            .query(&params)
            .send()
            .await?
            .text()
            .await?;

        parse_pubmed_xml(&xml)
    }
}

impl Default for PubMedFeed {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Feed for PubMedFeed {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let query = params
            .query
            .as_deref()
            .or_else(|| params.config.get_str("pubmed_query"))
            .ok_or_else(|| anyhow::anyhow!("pubmed feed requires a query (flag or config)"))?;
        let contact = params
            .contact
            .as_deref()
            .or_else(|| params.config.get_str("pubmed_contact"))
            .ok_or_else(|| anyhow::anyhow!("pubmed feed requires a contact identifier"))?;

        let pmids = self.esearch(query, contact, params.max_results).await?;
        let records = self.efetch_abstracts(&pmids).await?;
        let n = write_ndjson(output, &records)?;
        debug!(n, "PubMed records written");
        Ok(n)
    }
}

/// Parse PubMed XML (efetch abstract mode) into Records.
/// Handles the <PubmedArticleSet><PubmedArticle> structure with a small
/// state machine over quick-xml events.
fn parse_pubmed_xml(xml: &str) -> anyhow::Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Record> = None;
    let mut authors: Vec<String> = Vec::new();
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut in_author = false;
    let mut in_last_name = false;
    let mut in_fore_name = false;
    let mut in_journal = false;
    let mut current_last = String::new();
    let mut current_fore = String::new();
    let mut abstract_text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(Record::new("pubmed"));
                    authors.clear();
                    abstract_text.clear();
                }
                b"PMID" => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Author" => {
                    in_author = true;
                    current_last.clear();
                    current_fore.clear();
                }
                b"LastName" => in_last_name = true,
                b"ForeName" => in_fore_name = true,
                b"Title" => in_journal = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut rec) = current {
                    if in_pmid && rec.get("pmid").is_none() {
                        rec.set("pmid", text.clone());
                    }
                    if in_title {
                        rec.set("title", text.clone());
                    }
                    if in_abstract {
                        if !abstract_text.is_empty() {
                            abstract_text.push(' ');
                        }
                        abstract_text.push_str(&text);
                    }
                    if in_last_name {
                        current_last = text.clone();
                    }
                    if in_fore_name {
                        current_fore = text.clone();
                    }
                    if in_journal {
                        rec.set("journal", text.clone());
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"LastName" => in_last_name = false,
                b"ForeName" => in_fore_name = false,
                b"Title" => in_journal = false,
                b"Author" => {
                    if in_author {
                        let name = if current_fore.is_empty() {
                            current_last.clone()
                        } else {
                            format!("{} {}", current_fore, current_last)
                        };
                        if !name.is_empty() {
                            authors.push(name);
                        }
                        in_author = false;
                    }
                }
                b"PubmedArticle" => {
                    if let Some(mut rec) = current.take() {
                        if !abstract_text.is_empty() {
                            rec.set("abstract", abstract_text.clone());
                        }
                        if !authors.is_empty() {
                            rec.set("authors", authors.clone());
                        }
                        if rec.get("title").is_some() {
                            records.push(rec);
                        } else {
                            warn!("Skipping PubMed article with empty title");
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_pubmed_xml() {
        let xml = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>12345678</PMID>
      <Article>
        <ArticleTitle>BRCA1 variants in hereditary breast cancer</ArticleTitle>
        <Abstract><AbstractText>Test abstract.</AbstractText></Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>John</ForeName></Author>
        </AuthorList>
        <Journal><Title>Nature</Title></Journal>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let records = parse_pubmed_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source(), Some("pubmed"));
        assert_eq!(records[0].get("pmid").and_then(|v| v.as_str()), Some("12345678"));
        assert_eq!(
            records[0].get("title").and_then(|v| v.as_str()),
            Some("BRCA1 variants in hereditary breast cancer")
        );
        assert_eq!(
            records[0].get("authors").unwrap()[0].as_str(),
            Some("John Smith")
        );
    }

    #[test]
    fn test_parse_skips_untitled_articles() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle><MedlineCitation><PMID>1</PMID></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;
        let records = parse_pubmed_xml(xml).unwrap();
        assert!(records.is_empty());
    }
}
