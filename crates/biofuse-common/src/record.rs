//! Record interchange model.
//!
//! Every stage of the fusion pipeline exchanges newline-delimited JSON:
//! one open-schema object per line, always carrying a `source` tag that
//! names the feed of origin. Consumers treat unknown keys as opaque.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{BiofuseError, Result};

/// One normalized unit of ingested knowledge.
///
/// An open string-keyed mapping with no fixed schema across sources.
/// The only guaranteed key is `source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record tagged with its feed of origin.
    pub fn new(source: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("source".to_string(), Value::String(source.to_string()));
        Self { fields }
    }

    /// Wrap an already-built JSON object, ensuring the `source` tag is set.
    pub fn from_map(source: &str, mut fields: Map<String, Value>) -> Self {
        fields
            .entry("source".to_string())
            .or_insert_with(|| Value::String(source.to_string()));
        Self { fields }
    }

    pub fn source(&self) -> Option<&str> {
        self.fields.get("source").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Parse one NDJSON line.
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_str(line)?;
        Ok(Self { fields })
    }

    /// Serialize to a single NDJSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

/// Write records to a file as NDJSON, one per line.
pub fn write_ndjson(path: &Path, records: &[Record]) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", record.to_line()?)?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Read all records from an NDJSON file. Blank lines are skipped;
/// a malformed line is a hard error (feeds must not write corrupt files).
pub fn read_ndjson(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = Record::from_line(&line).map_err(|e| {
            BiofuseError::Feed(format!("{}:{}: malformed record: {e}", path.display(), i + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}
