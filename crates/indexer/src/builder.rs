use crate::document::{
    apply_path, fields, from_document, hint_document, hint_fields, path_key, read_code_document,
    to_document,
};
use crate::error::{IndexerError, Result};
use codesearch_protocol::{CodeDocument, IndexDescriptor};
use codesearch_store::{IndexPool, Query, Term};
use codesearch_tokenizer::hint_candidates;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const BATCH_SIZE: usize = 1000;

/// Outcome of [`IndexBuilder::build_batch`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Writes content documents and keeps the hint vocabulary in step with
/// them.
///
/// A hint word is removed only once no content document contains it any
/// more, checked against the case-sensitive content field.
pub struct IndexBuilder {
    descriptor: Arc<IndexDescriptor>,
    content: Arc<IndexPool>,
    hints: Arc<IndexPool>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(
        descriptor: Arc<IndexDescriptor>,
        content: Arc<IndexPool>,
        hints: Arc<IndexPool>,
    ) -> Self {
        Self {
            descriptor,
            content,
            hints,
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn content_pool(&self) -> &Arc<IndexPool> {
        &self.content
    }

    pub fn hint_pool(&self) -> &Arc<IndexPool> {
        &self.hints
    }

    /// Read `path` from disk and index it.
    ///
    /// Returns `false` when the file was skipped: too large, or gone before
    /// it could be read (a stale entry for it is removed).
    pub fn add_or_update_file(&self, path: &Path) -> Result<bool> {
        match read_code_document(path, self.descriptor.max_content_bytes) {
            Ok(Some(doc)) => {
                self.add_or_update(doc)?;
                Ok(true)
            }
            Ok(None) => {
                self.delete_exact(&path_key(path))?;
                Ok(false)
            }
            Err(err) if err.is_not_found() => {
                log::debug!("{} vanished before indexing", path.display());
                self.delete_exact(&path_key(path))?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn add_or_update(&self, mut doc: CodeDocument) -> Result<()> {
        let previous = self.find_exact(&doc.file_path)?;
        let old_words = previous
            .as_ref()
            .map(|prev| hint_candidates(&prev.content))
            .unwrap_or_default();
        let new_words = hint_candidates(&doc.content);
        if let Some(prev) = previous {
            doc.code_pk = prev.code_pk;
        }

        let key = Term::new(fields::FILE_PATH_EXACT, doc.file_path.as_str());
        let stored = to_document(&doc);
        self.content
            .mutate(|w| w.update_document(&key, stored))?;

        let to_remove: HashSet<String> = old_words.difference(&new_words).cloned().collect();
        let to_add: Vec<String> = new_words.difference(&old_words).cloned().collect();
        self.remove_unreferenced_hints(to_remove)?;
        self.add_hints(to_add)?;
        Ok(())
    }

    /// Delete the document at `path` and every document below it.
    pub fn delete(&self, path: &str) -> Result<usize> {
        let query = Query::should([
            Query::term(fields::FILE_PATH_EXACT, path),
            Query::prefix(fields::FILE_PATH_EXACT, dir_prefix(path)),
        ]);
        self.delete_matching(query)
    }

    fn delete_exact(&self, path: &str) -> Result<usize> {
        self.delete_matching(Query::term(fields::FILE_PATH_EXACT, path))
    }

    fn delete_matching(&self, query: Query) -> Result<usize> {
        let removed = self.content.search(&query, usize::MAX)?;
        if removed.is_empty() {
            return Ok(0);
        }
        let mut words = HashSet::new();
        for doc in &removed {
            if let Some(content) = doc.get_str(fields::CONTENT) {
                words.extend(hint_candidates(content));
            }
        }
        self.content.mutate(|w| w.delete_by_query(&query))?;
        self.remove_unreferenced_hints(words)?;
        log::debug!("Removed {} documents matching {query}", removed.len());
        Ok(removed.len())
    }

    /// Move a file or a whole directory to a new path, keeping primary keys.
    ///
    /// A renamed file whose content changed meanwhile is re-read. When
    /// nothing is indexed under `old`, the new path is indexed from disk.
    pub fn rename(&self, old: &str, new: &Path) -> Result<usize> {
        if let Some(mut doc) = self.find_exact(old)? {
            let stale = doc.last_write_time;
            let displaced = self.displace(old, &path_key(new))?;
            apply_path(&mut doc, new);
            let key = Term::new(fields::CODE_PK, doc.code_pk.as_str());
            let stored = to_document(&doc);
            self.content.mutate(|w| w.update_document(&key, stored))?;
            self.remove_unreferenced_hints(displaced)?;

            let on_disk = std::fs::metadata(new)
                .and_then(|m| m.modified())
                .map(crate::document::unix_millis)
                .ok();
            if on_disk.is_some_and(|t| t != stale) {
                self.add_or_update_file(new)?;
            }
            return Ok(1);
        }

        let old_prefix = dir_prefix(old);
        let new_root = path_key(new);
        let moved = self
            .content
            .search(&Query::prefix(fields::FILE_PATH_EXACT, old_prefix.as_str()), usize::MAX)?;
        if moved.is_empty() {
            if new.is_file() && self.descriptor.is_file_included(new) {
                return Ok(usize::from(self.add_or_update_file(new)?));
            }
            return Ok(0);
        }

        let mut updates = Vec::with_capacity(moved.len());
        for stored in &moved {
            let mut doc = from_document(stored)?;
            let Some(rest) = doc.file_path.strip_prefix(old_prefix.as_str()) else {
                continue;
            };
            let target = PathBuf::from(format!("{new_root}{MAIN_SEPARATOR}{rest}"));
            apply_path(&mut doc, &target);
            updates.push(doc);
        }
        let count = updates.len();
        self.content.mutate(|w| {
            for doc in updates {
                let key = Term::new(fields::CODE_PK, doc.code_pk.as_str());
                w.update_document(&key, to_document(&doc))?;
            }
            Ok(())
        })?;
        log::debug!("Moved {count} documents from {old} to {new_root}");
        Ok(count)
    }

    /// Delete whatever is indexed at `target` so a file moved there takes
    /// its place. Returns the hint candidates of the removed documents.
    fn displace(&self, source: &str, target: &str) -> Result<HashSet<String>> {
        if source == target {
            return Ok(HashSet::new());
        }
        let key = Term::new(fields::FILE_PATH_EXACT, target);
        let existing = self
            .content
            .search(&Query::Term(key.clone()), usize::MAX)?;
        if existing.is_empty() {
            return Ok(HashSet::new());
        }
        let words: HashSet<String> = existing
            .iter()
            .filter_map(|doc| doc.get_str(fields::CONTENT))
            .flat_map(hint_candidates)
            .collect();
        self.content.mutate(|w| w.delete_documents(&[key]))?;
        log::debug!("{target} replaced by {source}");
        Ok(words)
    }

    /// Index `files` in fixed-size batches, flushing after each batch.
    ///
    /// Per-file failures are collected in the report. Cancellation is
    /// checked between files; what was written so far is flushed before
    /// [`IndexerError::Cancelled`] is returned.
    pub fn build_batch(&self, files: &[PathBuf], cancel: &CancellationToken) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        for batch in files.chunks(self.batch_size) {
            for path in batch {
                if cancel.is_cancelled() {
                    self.flush()?;
                    return Err(IndexerError::Cancelled);
                }
                match self.add_or_update_file(path) {
                    Ok(true) => report.indexed += 1,
                    Ok(false) => report.skipped += 1,
                    Err(err) => {
                        log::warn!("Failed to index {}: {err}", path.display());
                        report.failures.push((path.clone(), err.to_string()));
                    }
                }
            }
            self.flush()?;
            log::debug!(
                "Indexed batch of {} files ({} total)",
                batch.len(),
                report.indexed
            );
        }
        Ok(report)
    }

    /// Every indexed path with its recorded last-modified time.
    pub fn indexed_files(&self) -> Result<HashMap<String, i64>> {
        let docs = self.content.search(&Query::All, usize::MAX)?;
        Ok(docs
            .iter()
            .filter_map(|doc| {
                let path = doc.get_str(fields::FILE_PATH_EXACT)?;
                let time = doc.get_int(fields::LAST_WRITE_TIME).unwrap_or_default();
                Some((path.to_string(), time))
            })
            .collect())
    }

    pub fn content_document_exists(&self, path: &str) -> Result<bool> {
        Ok(!self
            .content
            .search(&Query::term(fields::FILE_PATH_EXACT, path), 1)?
            .is_empty())
    }

    /// Whether any document lives below `dir`.
    pub fn has_descendants(&self, dir: &str) -> Result<bool> {
        Ok(!self
            .content
            .search(&Query::prefix(fields::FILE_PATH_EXACT, dir_prefix(dir)), 1)?
            .is_empty())
    }

    /// Remove every document from both indexes.
    pub fn clear(&self) -> Result<()> {
        self.content.mutate(|w| w.delete_all())?;
        self.hints.mutate(|w| w.delete_all())?;
        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        self.content.flush()?;
        self.hints.flush()?;
        Ok(())
    }

    fn find_exact(&self, path: &str) -> Result<Option<CodeDocument>> {
        let hits = self
            .content
            .search(&Query::term(fields::FILE_PATH_EXACT, path), 1)?;
        hits.first().map(from_document).transpose()
    }

    fn add_hints(&self, words: Vec<String>) -> Result<()> {
        if words.is_empty() {
            return Ok(());
        }
        self.hints.mutate(|w| {
            for word in &words {
                w.update_document(&Term::new(hint_fields::WORD, word.as_str()), hint_document(word))?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn remove_unreferenced_hints(&self, words: HashSet<String>) -> Result<()> {
        let mut unreferenced = Vec::new();
        for word in words {
            let still_used = self
                .content
                .search(&Query::term(fields::CONTENT_CS, word.as_str()), 1)?;
            if still_used.is_empty() {
                unreferenced.push(Term::new(hint_fields::WORD, word));
            }
        }
        if unreferenced.is_empty() {
            return Ok(());
        }
        self.hints.mutate(|w| w.delete_documents(&unreferenced))?;
        Ok(())
    }
}

fn dir_prefix(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    format!("{trimmed}{MAIN_SEPARATOR}")
}
