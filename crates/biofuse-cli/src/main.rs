use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use biofuse_common::config::ConfigMap;
use biofuse_index::{resolve_backend, VectorBackend};
use biofuse_ingestion::feeds::FeedRegistry;
use biofuse_ingestion::models::RunParams;
use biofuse_ingestion::pipeline::run_fusion;

/// Data fusion pipeline for medical and genomic feeds.
#[derive(Parser, Debug)]
#[command(name = "biofuse", version, about)]
struct Args {
    /// Search term (gene, condition, trait) for feeds that query upstreams.
    #[arg(long)]
    query: Option<String>,

    /// Maximum records fetched per feed.
    #[arg(long, default_value_t = 200)]
    max_results: usize,

    /// Contact email passed to upstreams that require one (e.g. PubMed).
    #[arg(long)]
    contact: Option<String>,

    /// Vector index backend selector.
    #[arg(long, default_value = "local")]
    backend: String,

    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build a vector index over the merged medical artifact.
    #[arg(long)]
    build_index: bool,

    /// Also run the slow genomic feeds, sequentially, after the medical ones.
    #[arg(long)]
    include_genomics: bool,

    /// Root directory for run artifacts.
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("biofuse=debug,info")),
        )
        .init();

    let args = Args::parse();

    // A broken or missing config file is fatal; feeds read their keys from it.
    let config = match &args.config {
        Some(path) => ConfigMap::load_from(path)?,
        None => ConfigMap::load()?,
    };
    info!(keys = config.len(), "Configuration loaded");

    let params = Arc::new(RunParams {
        query: args.query,
        max_results: args.max_results,
        contact: args.contact,
        backend: args.backend.clone(),
        config,
        include_genomics: args.include_genomics,
        build_index: args.build_index,
        output_root: args.output_dir.clone(),
        run_date: chrono::Local::now().date_naive(),
    });

    let backend: Option<Arc<dyn VectorBackend>> = if args.build_index {
        match resolve_backend(&args.backend, &args.output_dir.join("index")) {
            Ok(backend) => Some(backend),
            Err(e) => {
                error!(backend = %args.backend, error = %e, "Vector backend unavailable, skipping index build");
                None
            }
        }
    } else {
        None
    };

    let registry = FeedRegistry::builtin();
    let result = run_fusion(params, &registry, backend.as_deref()).await;

    if result.feeds_failed > 0 {
        warn!(
            failed = result.feeds_failed,
            run = result.feeds_run,
            "Run finished with feed failures"
        );
        for e in &result.errors {
            warn!(error = %e, "Run error");
        }
    }
    info!(
        run_id = %result.run_id,
        duration_ms = result.duration_ms,
        medical = ?result.medical_artifact,
        genomic = ?result.genomic_artifact,
        all = ?result.all_artifact,
        "Done"
    );

    Ok(())
}
