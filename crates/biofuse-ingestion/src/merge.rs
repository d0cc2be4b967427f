//! Merge engine.
//!
//! Streaming concatenation of per-feed NDJSON outputs into category-level
//! and global artifacts. Line order is preserved exactly; records are not
//! deduplicated or validated. A missing input file is skipped with a
//! warning (its feed contributed nothing); an empty input list produces no
//! output file at all.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use biofuse_common::Result;

/// Concatenate `inputs` in order into `dest`.
///
/// Returns the destination path if at least one input file existed and was
/// merged, `None` if there was nothing to merge (in which case no file is
/// created and any partial output is removed).
pub fn merge_files(inputs: &[PathBuf], dest: &Path) -> Result<Option<PathBuf>> {
    if inputs.is_empty() {
        return Ok(None);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = std::io::BufWriter::new(std::fs::File::create(dest)?);
    let mut contributed = 0usize;

    for input in inputs {
        if !input.exists() {
            warn!(input = %input.display(), "Merge input missing, skipping");
            continue;
        }
        let reader = std::io::BufReader::new(std::fs::File::open(input)?);
        for line in reader.lines() {
            writeln!(writer, "{}", line?)?;
        }
        contributed += 1;
    }
    writer.flush()?;
    drop(writer);

    if contributed == 0 {
        // Every input was missing: the category contributed nothing, so no
        // artifact is left behind.
        std::fs::remove_file(dest)?;
        return Ok(None);
    }

    info!(n_inputs = contributed, dest = %dest.display(), "Merged outputs");
    Ok(Some(dest.to_path_buf()))
}
