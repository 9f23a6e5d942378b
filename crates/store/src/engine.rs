use crate::analyzer::register_code_tokenizers;
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::lock::DirectoryLock;
use crate::query::{Query, Term};
use crate::schema::{BoundSchema, IndexSchema};
use crate::store::{IndexReader, IndexStore, IndexWriter};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::{Index, ReloadPolicy, Searcher, TantivyDocument};

const META_FILE_NAME: &str = "meta.json";

/// Indexing memory budget of a writer. One indexing thread per writer keeps
/// the budget well above tantivy's per-thread minimum.
pub const WRITER_HEAP_BYTES: usize = 32 * 1024 * 1024;

/// Whether `dir` holds a committed index.
pub fn index_exists(dir: &Path) -> bool {
    dir.join(META_FILE_NAME).exists()
}

/// Index store backed by tantivy, on disk or in RAM.
#[derive(Debug, Clone, Copy, Default)]
pub struct TantivyStore {
    in_memory: bool,
}

impl TantivyStore {
    pub fn persistent() -> Self {
        Self { in_memory: false }
    }

    /// Store whose indexes live in RAM and vanish with their writer.
    pub fn in_memory() -> Self {
        Self { in_memory: true }
    }

    /// Read-only view of the last commit in `dir`.
    ///
    /// Takes no lock; a writer in another process may commit at any time and
    /// this reader keeps seeing the commit it was opened on. A directory
    /// without an index reads as empty.
    pub fn open_read_only(dir: &Path) -> Result<Arc<dyn IndexReader>> {
        if !index_exists(dir) {
            log::debug!("No index at {}, reading as empty", dir.display());
            return Ok(Arc::new(EmptyReader));
        }
        let index = Index::open_in_dir(dir)?;
        register_code_tokenizers(&index);
        let reader: tantivy::IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Arc::new(TantivyReader {
            searcher: reader.searcher(),
            schema: BoundSchema::new(index.schema()),
        }))
    }
}

impl IndexStore for TantivyStore {
    fn open_writer(&self, path: &Path, schema: &IndexSchema) -> Result<Arc<dyn IndexWriter>> {
        let writer = if self.in_memory {
            TantivyWriter::in_memory(path, schema)?
        } else {
            TantivyWriter::open(path, schema)?
        };
        Ok(Arc::new(writer))
    }
}

struct WriterSlot {
    writer: Option<tantivy::IndexWriter>,
    /// Operations applied since the last commit.
    dirty: bool,
}

/// Single writer of one tantivy index.
///
/// tantivy only searches committed segments, so opening a reader first
/// commits whatever is pending.
pub struct TantivyWriter {
    dir: PathBuf,
    schema: BoundSchema,
    reader: tantivy::IndexReader,
    slot: Mutex<WriterSlot>,
    lock: Mutex<Option<DirectoryLock>>,
}

impl TantivyWriter {
    fn open(dir: &Path, schema: &IndexSchema) -> Result<Self> {
        let lock = DirectoryLock::acquire(dir)?;
        let index = if index_exists(dir) {
            let index = Index::open_in_dir(dir)?;
            if IndexSchema::from_tantivy(&index.schema()) != *schema {
                return Err(StoreError::SchemaMismatch {
                    path: dir.display().to_string(),
                });
            }
            log::info!("Opened index {}", dir.display());
            index
        } else {
            log::info!("Creating index {}", dir.display());
            Index::create_in_dir(dir, schema.to_tantivy())?
        };
        Self::with_index(dir, index, Some(lock))
    }

    fn in_memory(name: &Path, schema: &IndexSchema) -> Result<Self> {
        Self::with_index(name, Index::create_in_ram(schema.to_tantivy()), None)
    }

    fn with_index(dir: &Path, index: Index, lock: Option<DirectoryLock>) -> Result<Self> {
        register_code_tokenizers(&index);
        let writer: tantivy::IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader: tantivy::IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            dir: dir.to_path_buf(),
            schema: BoundSchema::new(index.schema()),
            reader,
            slot: Mutex::new(WriterSlot {
                writer: Some(writer),
                dirty: false,
            }),
            lock: Mutex::new(lock),
        })
    }

    /// Run `op` on the open writer and mark the index dirty.
    fn write<T>(&self, op: impl FnOnce(&tantivy::IndexWriter) -> tantivy::Result<T>) -> Result<T> {
        let mut slot = self.slot.lock();
        let writer = slot
            .writer
            .as_ref()
            .ok_or_else(|| StoreError::Closed(self.dir.display().to_string()))?;
        let outcome = op(writer)?;
        slot.dirty = true;
        Ok(outcome)
    }

    fn commit_pending(&self, slot: &mut WriterSlot) -> Result<()> {
        let writer = slot
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Closed(self.dir.display().to_string()))?;
        if slot.dirty {
            writer.commit()?;
            slot.dirty = false;
            log::debug!("Committed index {}", self.dir.display());
        }
        Ok(())
    }
}

impl IndexWriter for TantivyWriter {
    fn add_documents(&self, docs: Vec<Document>) -> Result<()> {
        let converted = docs
            .iter()
            .map(|doc| doc.to_tantivy(&self.schema))
            .collect::<Result<Vec<_>>>()?;
        self.write(|writer| {
            for doc in converted {
                writer.add_document(doc)?;
            }
            Ok(())
        })
    }

    fn update_document(&self, key: &Term, doc: Document) -> Result<()> {
        let converted = doc.to_tantivy(&self.schema)?;
        let key = key.to_tantivy(&self.schema);
        self.write(|writer| {
            if let Some(key) = key {
                writer.delete_term(key);
            }
            writer.add_document(converted)?;
            Ok(())
        })
    }

    fn delete_documents(&self, terms: &[Term]) -> Result<()> {
        let terms: Vec<tantivy::Term> = terms
            .iter()
            .filter_map(|term| term.to_tantivy(&self.schema))
            .collect();
        self.write(|writer| {
            for term in terms {
                writer.delete_term(term);
            }
            Ok(())
        })
    }

    fn delete_by_query(&self, query: &Query) -> Result<()> {
        let compiled = query.compile(&self.schema)?;
        self.write(|writer| writer.delete_query(compiled))?;
        log::debug!("Deleted documents matching {query}");
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.write(|writer| writer.delete_all_documents())?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        self.commit_pending(&mut slot)
    }

    fn open_reader(&self) -> Result<Arc<dyn IndexReader>> {
        let mut slot = self.slot.lock();
        self.commit_pending(&mut slot)?;
        self.reader.reload()?;
        Ok(Arc::new(TantivyReader {
            searcher: self.reader.searcher(),
            schema: self.schema.clone(),
        }))
    }

    fn close(&self) -> Result<()> {
        let Some(writer) = self.slot.lock().writer.take() else {
            return Ok(());
        };
        let outcome = writer.wait_merging_threads();
        self.lock.lock().take();
        outcome?;
        Ok(())
    }
}

struct TantivyReader {
    searcher: Searcher,
    schema: BoundSchema,
}

impl IndexReader for TantivyReader {
    fn search(&self, query: &Query, limit: usize) -> Result<Vec<Document>> {
        let limit = limit.min(self.num_docs());
        if limit == 0 {
            return Ok(Vec::new());
        }
        let compiled = query.compile(&self.schema)?;
        let hits = self
            .searcher
            .search(compiled.as_ref(), &TopDocs::with_limit(limit))?;
        hits.into_iter()
            .map(|(_, address)| {
                let doc: TantivyDocument = self.searcher.doc(address)?;
                Ok(Document::from_tantivy(&doc, &self.schema))
            })
            .collect()
    }

    fn num_docs(&self) -> usize {
        usize::try_from(self.searcher.num_docs()).unwrap_or(usize::MAX)
    }
}

struct EmptyReader;

impl IndexReader for EmptyReader {
    fn search(&self, _query: &Query, _limit: usize) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }

    fn num_docs(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Occur, SpanClause};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn schema() -> IndexSchema {
        IndexSchema::new()
            .keyword("id")
            .text("body", true)
            .case_sensitive_text("body_cs", false)
            .int("size")
    }

    fn doc(id: &str, body: &str) -> Document {
        let mut doc = Document::new();
        doc.add_keyword("id", id)
            .add_text("body", body, true)
            .add_case_sensitive_text("body_cs", body, false)
            .add_int("size", body.len() as i64);
        doc
    }

    fn writer() -> Arc<dyn IndexWriter> {
        TantivyStore::in_memory()
            .open_writer(Path::new("mem"), &schema())
            .unwrap()
    }

    fn count(writer: &Arc<dyn IndexWriter>, query: Query) -> usize {
        writer.open_reader().unwrap().search(&query, 100).unwrap().len()
    }

    #[test]
    fn reader_is_point_in_time() {
        let writer = writer();
        writer.add_documents(vec![doc("1", "alpha")]).unwrap();
        let before = writer.open_reader().unwrap();
        writer.add_documents(vec![doc("2", "alpha")]).unwrap();
        let after = writer.open_reader().unwrap();

        assert_eq!(before.search(&Query::term("body", "alpha"), 10).unwrap().len(), 1);
        assert_eq!(after.search(&Query::term("body", "alpha"), 10).unwrap().len(), 2);
    }

    #[test]
    fn update_replaces_by_key_and_delete_by_term() {
        let writer = writer();
        writer.add_documents(vec![doc("1", "alpha")]).unwrap();
        writer
            .update_document(&Term::new("id", "1"), doc("1", "beta"))
            .unwrap();
        let reader = writer.open_reader().unwrap();
        assert_eq!(reader.num_docs(), 1);
        assert!(reader.search(&Query::term("body", "alpha"), 10).unwrap().is_empty());

        writer.delete_documents(&[Term::new("id", "1")]).unwrap();
        assert_eq!(writer.open_reader().unwrap().num_docs(), 0);
    }

    #[test]
    fn term_matching_honours_field_case_mode() {
        let writer = writer();
        let body = "fn Main() { let value = compute(42); }";
        writer.add_documents(vec![doc("src/Main.rs", body)]).unwrap();
        assert_eq!(count(&writer, Query::term("body", "MAIN")), 1);
        assert_eq!(count(&writer, Query::term("body_cs", "Main")), 1);
        assert_eq!(count(&writer, Query::term("body_cs", "main")), 0);
        assert_eq!(count(&writer, Query::term("id", "src/Main.rs")), 1);
        assert_eq!(count(&writer, Query::term("id", "src/main.rs")), 0);
        assert_eq!(count(&writer, Query::term("size", body.len().to_string())), 1);
        assert_eq!(count(&writer, Query::term("size", "many")), 0);
        assert_eq!(count(&writer, Query::term("missing", "x")), 0);
    }

    #[test]
    fn prefix_and_wildcard_on_keyword_and_text() {
        let writer = writer();
        writer
            .add_documents(vec![doc("src/Main.rs", "let value = compute(42);")])
            .unwrap();
        assert_eq!(count(&writer, Query::prefix("id", "src/")), 1);
        assert_eq!(count(&writer, Query::prefix("id", "lib/")), 0);
        assert_eq!(count(&writer, Query::prefix("body", "COMP")), 1);
        assert_eq!(count(&writer, Query::wildcard("body", "c?mpute")), 1);
        assert_eq!(count(&writer, Query::wildcard("id", "src/*.rs")), 1);
        assert_eq!(count(&writer, Query::wildcard("id", "src.*")), 0);
    }

    #[test]
    fn phrase_and_span_need_adjacent_tokens() {
        let writer = writer();
        writer
            .add_documents(vec![doc("1", "let value = compute(42);")])
            .unwrap();
        let phrase = |terms: &[&str]| Query::Phrase {
            field: "body".to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        };
        assert_eq!(count(&writer, phrase(&["let", "value", "="])), 1);
        assert_eq!(count(&writer, phrase(&["let", "="])), 0);

        let span = |clauses: Vec<SpanClause>, slop| Query::SpanNear {
            field: "body".to_string(),
            clauses,
            slop,
        };
        let wild = span(
            vec![
                SpanClause::Wildcard("val*".into()),
                SpanClause::Term("=".into()),
                SpanClause::Wildcard("com?ute".into()),
            ],
            0,
        );
        assert_eq!(count(&writer, wild), 1);
        let gap = vec![SpanClause::Term("let".into()), SpanClause::Wildcard("=*".into())];
        assert_eq!(count(&writer, span(gap.clone(), 0)), 0);
        assert_eq!(count(&writer, span(gap, 1)), 1);
    }

    #[test]
    fn boolean_semantics() {
        let writer = writer();
        writer.add_documents(vec![doc("1", "fn let"), doc("2", "fn")]).unwrap();
        let both = Query::must([Query::term("body", "fn"), Query::term("body", "let")]);
        assert_eq!(count(&writer, both), 1);

        let excluded = Query::Boolean(vec![
            (Occur::Must, Query::term("body", "fn")),
            (Occur::MustNot, Query::term("body", "let")),
        ]);
        assert_eq!(count(&writer, excluded), 1);

        let only_excluded = Query::Boolean(vec![(Occur::MustNot, Query::term("body", "let"))]);
        assert_eq!(count(&writer, only_excluded), 1);

        let either = Query::should([Query::term("body", "nope"), Query::term("body", "let")]);
        assert_eq!(count(&writer, either), 1);
    }

    #[test]
    fn delete_by_query_and_delete_all() {
        let writer = writer();
        writer
            .add_documents(vec![doc("a/1", "x"), doc("a/2", "y"), doc("b/1", "z")])
            .unwrap();
        writer.delete_by_query(&Query::prefix("id", "a/")).unwrap();
        assert_eq!(writer.open_reader().unwrap().num_docs(), 1);
        writer.delete_all().unwrap();
        assert_eq!(writer.open_reader().unwrap().num_docs(), 0);
    }

    #[test]
    fn commit_persists_and_reopen_restores() {
        let temp = TempDir::new().unwrap();
        {
            let writer = TantivyStore::persistent()
                .open_writer(temp.path(), &schema())
                .unwrap();
            writer.add_documents(vec![doc("1", "persisted words")]).unwrap();
            writer.commit().unwrap();
            writer.close().unwrap();
        }
        let reader = TantivyStore::open_read_only(temp.path()).unwrap();
        let hits = reader.search(&Query::term("body", "words"), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get_str("id"), Some("1"));
        assert_eq!(hits[0].get_str("body"), Some("persisted words"));
        assert!(hits[0].field("body_cs").is_none());

        let writer = TantivyStore::persistent()
            .open_writer(temp.path(), &schema())
            .unwrap();
        assert_eq!(writer.open_reader().unwrap().num_docs(), 1);
    }

    #[test]
    fn read_only_view_of_missing_index_is_empty() {
        let temp = TempDir::new().unwrap();
        let reader = TantivyStore::open_read_only(&temp.path().join("none")).unwrap();
        assert_eq!(reader.num_docs(), 0);
        assert!(reader.search(&Query::All, 10).unwrap().is_empty());
    }

    #[test]
    fn reopening_with_another_schema_is_rejected() {
        let temp = TempDir::new().unwrap();
        let writer = TantivyStore::persistent()
            .open_writer(temp.path(), &schema())
            .unwrap();
        writer.close().unwrap();

        let other = IndexSchema::new().keyword("word");
        assert!(matches!(
            TantivyStore::persistent().open_writer(temp.path(), &other),
            Err(StoreError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn second_writer_on_same_directory_is_rejected() {
        let temp = TempDir::new().unwrap();
        let first = TantivyStore::persistent()
            .open_writer(temp.path(), &schema())
            .unwrap();
        let second = TantivyStore::persistent().open_writer(temp.path(), &schema());
        assert!(matches!(second, Err(StoreError::Locked(_))));

        first.close().unwrap();
        assert!(TantivyStore::persistent()
            .open_writer(temp.path(), &schema())
            .is_ok());
    }

    #[test]
    fn closed_writer_refuses_mutations() {
        let writer = writer();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(matches!(
            writer.add_documents(vec![doc("1", "x")]),
            Err(StoreError::Closed(_))
        ));
    }
}
