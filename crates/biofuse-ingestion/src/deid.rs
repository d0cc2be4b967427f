//! De-identification transform.
//!
//! Record-by-record scrubbing of PHI-shaped substrings plus deterministic
//! date shifting, applied recursively over nested mapping and list values.
//!
//! Rules:
//! - String leaves are scrubbed: SSN-shaped, 10-digit phone, rough
//!   `Firstname Lastname`, and `m/d/y` date substrings become `[REDACTED]`.
//! - Values under a key containing "date" are shifted by a deterministic
//!   offset in [-182, +182] days derived from an FNV-1a 64 hash of the
//!   original string, so absolute dates are unrecoverable while relative
//!   ordering noise stays bounded. Shifted dates carry a `~` prefix, which
//!   makes the whole transform idempotent.
//! - An unparseable date degrades to `[REDACTED_DATE]` for that field only.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use biofuse_common::record::Record;
use biofuse_common::Result;

pub const REDACTED: &str = "[REDACTED]";
pub const REDACTED_DATE: &str = "[REDACTED_DATE]";

/// Prefix marking an already-shifted date. Re-applying the transform to a
/// marked value is a no-op.
const SHIFT_MARK: char = '~';

lazy_static! {
    static ref PHI_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),      // SSN
        Regex::new(r"\b\d{10}\b").unwrap(),                 // phone numbers
        Regex::new(r"[A-Z][a-z]+ [A-Z][a-z]+").unwrap(),    // names (rough)
        Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}").unwrap(),    // slash dates
    ];
}

/// FNV-1a 64-bit hash. Explicit and stable across builds, unlike a
/// language-builtin hasher.
fn fnv64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 14695981039346656037;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

/// Replace every PHI-shaped substring with the redaction marker.
pub fn scrub_text(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in PHI_PATTERNS.iter() {
        out = pattern.replace_all(&out, REDACTED).into_owned();
    }
    out
}

/// Deterministic day offset for a date string, in [-182, +182].
fn shift_offset_days(date_str: &str) -> i64 {
    (fnv64(date_str.as_bytes()) % 365) as i64 - 182
}

/// Shift a date by a deterministic offset keyed on its original text.
/// Already-shifted (`~`-prefixed) and already-redacted values pass through
/// unchanged. Unparseable dates become the date redaction marker.
pub fn shift_date(date_str: &str) -> String {
    if date_str.starts_with(SHIFT_MARK) || date_str == REDACTED_DATE {
        return date_str.to_string();
    }

    let parsed = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .or_else(|_| {
            NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
        });

    match parsed {
        Ok(date) => {
            let shifted = date + Duration::days(shift_offset_days(date_str));
            format!("{SHIFT_MARK}{}", shifted.format("%Y-%m-%d"))
        }
        Err(_) => REDACTED_DATE.to_string(),
    }
}

fn deid_value(key: &str, value: &Value) -> Value {
    match value {
        Value::String(s) => {
            if key.to_lowercase().contains("date") {
                Value::String(shift_date(s))
            } else {
                Value::String(scrub_text(s))
            }
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| deid_value(key, v)).collect())
        }
        Value::Object(map) => Value::Object(deid_map(map)),
        other => other.clone(),
    }
}

fn deid_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), deid_value(k, v))).collect()
}

/// De-identify one record. The key set is preserved exactly; only leaf
/// values change.
pub fn deidentify(record: &Record) -> Record {
    Record::from_map(
        record.source().unwrap_or("unknown"),
        deid_map(record.fields()),
    )
}

/// De-identify one NDJSON file into the mirrored output path, streaming
/// record by record. Returns the output path.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn process_file(input: &Path, output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let reader = std::io::BufReader::new(std::fs::File::open(input)?);
    let mut writer = std::io::BufWriter::new(std::fs::File::create(output)?);

    let mut n = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = Record::from_line(&line)?;
        writeln!(writer, "{}", deidentify(&record).to_line()?)?;
        n += 1;
    }
    writer.flush()?;

    debug!(records = n, output = %output.display(), "File de-identified");
    Ok(output.to_path_buf())
}
