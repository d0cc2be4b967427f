//! Concurrent feed runner.
//!
//! Medical feeds run in parallel, one tokio task per feed, with no shared
//! mutable state beyond the read-only RunParams. Each task's failure (error
//! or panic) is captured into its FeedResult; one feed's failure never
//! aborts or blocks its siblings. Results are collected in completion
//! order, which becomes the medical merge order.
//!
//! Genomic feeds run one at a time in registration order: genomic upstreams
//! are assumed rate-limited and fragile under concurrent load.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::feeds::Feed;
use crate::models::{FeedResult, RunParams};

/// Execute one feed into its output path, converting any error or panic
/// into a failed FeedResult. A feed that reports success must have written
/// its output file; a missing file is recorded as a failure so the merge
/// step never sees a dangling path.
async fn execute_feed(feed: &dyn Feed, params: &RunParams, output: &Path) -> FeedResult {
    let name = feed.name();
    let outcome = AssertUnwindSafe(feed.run(params, output)).catch_unwind().await;

    match outcome {
        Ok(Ok(n)) => {
            if output.exists() {
                info!(feed = name, records = n, "Feed completed");
                FeedResult::ok(name, output)
            } else {
                let msg = format!("feed {name} reported success but wrote no output file");
                error!("{msg}");
                FeedResult::failed(name, msg)
            }
        }
        Ok(Err(e)) => {
            warn!(feed = name, error = %e, "Feed failed");
            discard_partial_output(name, output);
            FeedResult::failed(name, e.to_string())
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "feed panicked".to_string());
            error!(feed = name, "Feed panicked: {msg}");
            discard_partial_output(name, output);
            FeedResult::failed(name, msg)
        }
    }
}

/// A failed feed may have written part of its output before erroring.
/// Remove it so the raw tree only holds files from successful feeds.
fn discard_partial_output(name: &str, output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!(feed = name, error = %e, "Could not remove partial output");
        }
    }
}

/// Run the medical partition concurrently. Returns FeedResults in
/// completion order, not submission order.
pub async fn run_parallel(feeds: Vec<Arc<dyn Feed>>, params: Arc<RunParams>) -> Vec<FeedResult> {
    let mut tasks = JoinSet::new();
    for feed in feeds {
        let params = params.clone();
        tasks.spawn(async move {
            let output = params.feed_output_path(feed.name());
            execute_feed(feed.as_ref(), &params, &output).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            // execute_feed already converts panics; a JoinError here means
            // the task was cancelled externally, which this runner never does.
            Err(e) => error!("Feed task join error: {e}"),
        }
    }
    results
}

/// Run the genomic partition sequentially, in registration order.
pub async fn run_sequential(feeds: Vec<Arc<dyn Feed>>, params: Arc<RunParams>) -> Vec<FeedResult> {
    let mut results = Vec::new();
    for feed in feeds {
        let output = params.feed_output_path(feed.name());
        results.push(execute_feed(feed.as_ref(), &params, &output).await);
    }
    results
}
