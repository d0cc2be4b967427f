//! biofuse-common — shared types for the fusion pipeline.
//! - Error type and Result alias
//! - Record interchange model (NDJSON)
//! - Sandbox-capped HTTP client
//! - Configuration loading

pub mod config;
pub mod error;
pub mod record;
pub mod sandbox;

pub use error::{BiofuseError, Result};
