use crate::document::Document;
use crate::error::Result;
use crate::query::{Query, Term};
use crate::schema::IndexSchema;
use std::path::Path;
use std::sync::Arc;

/// Factory for index writers, one per index directory.
pub trait IndexStore: Send + Sync {
    /// Open the index at `path`, creating it with `schema` when absent.
    fn open_writer(&self, path: &Path, schema: &IndexSchema) -> Result<Arc<dyn IndexWriter>>;
}

/// Mutating handle over one index.
///
/// Implementations serialize physical writes internally, so every method
/// takes `&self` and may be called from several threads at once.
pub trait IndexWriter: Send + Sync {
    fn add_documents(&self, docs: Vec<Document>) -> Result<()>;

    /// Replace every document matching `key` with `doc` (insert if none).
    fn update_document(&self, key: &Term, doc: Document) -> Result<()>;

    fn delete_documents(&self, terms: &[Term]) -> Result<()>;

    fn delete_by_query(&self, query: &Query) -> Result<()>;

    fn delete_all(&self) -> Result<()>;

    /// Make all changes so far durable.
    fn commit(&self) -> Result<()>;

    /// Point-in-time reader that sees every change applied so far.
    /// Pending changes are committed first when the store can only search
    /// committed data.
    fn open_reader(&self) -> Result<Arc<dyn IndexReader>>;

    /// Release the writer. Idempotent.
    fn close(&self) -> Result<()>;
}

/// Immutable view of an index.
pub trait IndexReader: Send + Sync {
    /// Stored fields of at most `limit` matching documents, best first.
    fn search(&self, query: &Query, limit: usize) -> Result<Vec<Document>>;

    fn num_docs(&self) -> usize;
}
