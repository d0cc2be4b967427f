//! biofuse-ingestion — the Fusion Pipeline.
//! - Feed contract and registry (explicit registration, medical/genomic split)
//! - Concurrent runner with per-feed failure isolation
//! - Conditional de-identification gate
//! - Category and global merge engine
//! - Indexing trigger
//! - Pipeline orchestrator

pub mod deid;
pub mod feeds;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod runner;
