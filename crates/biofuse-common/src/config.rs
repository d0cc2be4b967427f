//! Configuration loading for Biofuse.
//! Reads biofuse.toml from the current directory or the path in the
//! BIOFUSE_CONFIG env var, and flattens it into a string-keyed map shared
//! read-only by every feed for the duration of a run.
//!
//! A missing or unparsable config file is fatal: every downstream decision
//! (feed parameters, de-identification flags) depends on these values.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{BiofuseError, Result};

/// A single configuration value. Scalars plus string lists, which several
/// feeds use for controlled fetch sets (rsID lists, FHIR resource types,
/// WHO indicator codes).
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Flat key-value configuration shared by all feeds.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(ConfigValue::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(ConfigValue::as_i64)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).and_then(ConfigValue::as_list)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load configuration from biofuse.toml.
    /// Checks BIOFUSE_CONFIG env var first, then the current directory.
    pub fn load() -> Result<Self> {
        let path = std::env::var("BIOFUSE_CONFIG").unwrap_or_else(|_| "biofuse.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BiofuseError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = content
            .parse()
            .map_err(|e| BiofuseError::Config(format!("{}: {e}", path.display())))?;

        let mut map = ConfigMap::new();
        flatten_table(&mut map, "", &table)?;
        debug!(path = %path.display(), keys = map.len(), "Configuration loaded");
        Ok(map)
    }
}

/// Flatten a TOML table into underscore-joined keys, so
/// `[pubmed] requires_deid = true` becomes `pubmed_requires_deid`.
fn flatten_table(map: &mut ConfigMap, prefix: &str, table: &toml::Table) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}_{key}")
        };
        match value {
            toml::Value::String(s) => map.insert(&full_key, ConfigValue::Str(s.clone())),
            toml::Value::Integer(i) => map.insert(&full_key, ConfigValue::Int(*i)),
            toml::Value::Float(f) => map.insert(&full_key, ConfigValue::Float(*f)),
            toml::Value::Boolean(b) => map.insert(&full_key, ConfigValue::Bool(*b)),
            toml::Value::Array(items) => {
                let strings: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        toml::Value::String(s) => Ok(s.clone()),
                        other => Err(BiofuseError::Config(format!(
                            "{full_key}: arrays may only contain strings, got {other}"
                        ))),
                    })
                    .collect::<Result<_>>()?;
                map.insert(&full_key, ConfigValue::List(strings));
            }
            toml::Value::Table(nested) => flatten_table(map, &full_key, nested)?,
            other => {
                return Err(BiofuseError::Config(format!(
                    "{full_key}: unsupported value type: {other}"
                )))
            }
        }
    }
    Ok(())
}
