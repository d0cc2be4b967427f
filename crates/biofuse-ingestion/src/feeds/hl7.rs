//! HL7 v2 message feed.
//!
//! Reads pipe-delimited HL7 message files (`*.hl7`) from the configured
//! `hl7_input_dir` and parses each message line into a Record. This is a
//! local-file feed: lab systems drop message batches into the directory and
//! the fusion run picks them up.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

use biofuse_common::record::{write_ndjson, Record};

use super::Feed;
use crate::models::RunParams;

pub struct Hl7Feed;

impl Hl7Feed {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Hl7Feed {
    fn default() -> Self { Self::new() }
}

/// Parse a single pipe-delimited HL7 message line.
/// Simplified field mapping: type | _ | patient id | observation | date.
fn parse_hl7_message(message: &str) -> Record {
    let fields: Vec<&str> = message.split('|').collect();
    let mut rec = Record::new("hl7");
    rec.set("message_type", *fields.first().unwrap_or(&""));
    if let Some(pid) = fields.get(2) {
        rec.set("patient_id", *pid);
    }
    if let Some(obs) = fields.get(3) {
        rec.set("observation", *obs);
    }
    if let Some(date) = fields.get(4) {
        rec.set("date", *date);
    }
    rec
}

#[async_trait]
impl Feed for Hl7Feed {
    fn name(&self) -> &'static str {
        "hl7"
    }

    #[instrument(skip(self, params))]
    async fn run(&self, params: &RunParams, output: &Path) -> anyhow::Result<usize> {
        let input_dir = params
            .config
            .get_str("hl7_input_dir")
            .ok_or_else(|| anyhow::anyhow!("hl7 feed requires hl7_input_dir in config"))?;

        let mut records = Vec::new();
        for entry in std::fs::read_dir(input_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("hl7") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                records.push(parse_hl7_message(line));
                if records.len() >= params.max_results {
                    break;
                }
            }
            if records.len() >= params.max_results {
                break;
            }
        }

        debug!(n = records.len(), "HL7 messages parsed");
        Ok(write_ndjson(output, &records)?)
    }
}
