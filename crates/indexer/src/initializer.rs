use crate::builder::{BuildReport, IndexBuilder};
use crate::document::path_key;
use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Bring the index in line with the monitored tree.
///
/// Files missing from the index or modified since they were indexed are
/// (re)indexed, indexed paths that vanished or became excluded are removed,
/// and everything else is left alone. `rebuild` clears both indexes first.
pub fn initial_sync(
    builder: &IndexBuilder,
    rebuild: bool,
    cancel: &CancellationToken,
) -> Result<BuildReport> {
    if rebuild {
        log::info!("Clearing index {} for rebuild", builder.descriptor().name);
        builder.clear()?;
    }

    let indexed = builder.indexed_files()?;
    let on_disk = FileScanner::new(builder.descriptor()).scan();

    let mut seen = HashSet::with_capacity(on_disk.len());
    let mut to_index = Vec::new();
    let mut unchanged = 0usize;
    for file in on_disk {
        let key = path_key(&file.path);
        match indexed.get(&key) {
            Some(&recorded) if recorded >= file.last_write_time => unchanged += 1,
            _ => to_index.push(file.path),
        }
        seen.insert(key);
    }

    let stale: Vec<&String> = indexed.keys().filter(|path| !seen.contains(*path)).collect();
    for path in &stale {
        if cancel.is_cancelled() {
            builder.flush()?;
            return Err(IndexerError::Cancelled);
        }
        builder.delete(path)?;
    }

    let report = builder.build_batch(&to_index, cancel)?;
    builder.flush()?;
    log::info!(
        "Initialized {}: {} indexed, {} unchanged, {} removed, {} failed",
        builder.descriptor().name,
        report.indexed,
        unchanged,
        stale.len(),
        report.failures.len()
    );
    Ok(report)
}
