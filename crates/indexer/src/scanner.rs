use crate::document::unix_millis;
use codesearch_protocol::IndexDescriptor;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// A file found on disk that the index should contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub last_write_time: i64,
}

/// Walks the monitored tree applying the descriptor's rules.
///
/// VCS ignore files play no part here: the descriptor's include/exclude
/// lists are the only filter.
pub struct FileScanner<'a> {
    descriptor: &'a IndexDescriptor,
}

impl<'a> FileScanner<'a> {
    pub fn new(descriptor: &'a IndexDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn scan(&self) -> Vec<ScannedFile> {
        let files = self.scan_dir(&self.descriptor.monitor_folder);
        log::info!(
            "Found {} files under {}",
            files.len(),
            self.descriptor.monitor_folder.display()
        );
        files
    }

    /// Scan a subtree, e.g. a directory that was just moved into the tree.
    pub fn scan_dir(&self, dir: &Path) -> Vec<ScannedFile> {
        let mut files = Vec::new();

        let descriptor = self.descriptor.clone();
        let mut builder = WalkBuilder::new(dir);
        builder.standard_filters(false).follow_links(false);
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && descriptor.is_dir_excluded(entry.path()))
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.descriptor.is_file_included(path) {
                        continue;
                    }
                    let meta = match entry.metadata() {
                        Ok(meta) => meta,
                        Err(e) => {
                            log::warn!("Failed to stat {}: {e}", path.display());
                            continue;
                        }
                    };
                    if meta.len() > self.descriptor.max_content_bytes {
                        log::debug!(
                            "Skipping large file {} ({} bytes > {})",
                            path.display(),
                            meta.len(),
                            self.descriptor.max_content_bytes
                        );
                        continue;
                    }
                    let last_write_time = meta.modified().map(unix_millis).unwrap_or_default();
                    files.push(ScannedFile {
                        path: path.to_path_buf(),
                        last_write_time,
                    });
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files
    }
}
