//! # Codesearch Store
//!
//! The inverted-index seam of the workspace and the handle pool built on it.
//!
//! ## Architecture
//!
//! ```text
//! IndexPoolRegistry  (one per process/embedder)
//!     │
//!     └──> IndexPool  (one per index directory)
//!            ├─> IndexWriter     long-lived, exclusive per directory
//!            ├─> Searcher        cached snapshot + generation tag
//!            └─> change counter  invalidates the cached snapshot
//! ```
//!
//! [`IndexStore`], [`IndexWriter`] and [`IndexReader`] are the abstract store
//! primitives; [`TantivyStore`] implements them over tantivy, with the code
//! tokenizer registered for every text field. [`Query`] is compiled to
//! tantivy queries against the schema of the index it runs on.
//!
//! ## Example
//!
//! ```rust
//! use codesearch_store::{Document, IndexPoolRegistry, IndexSchema, Query, TantivyStore};
//! use std::sync::Arc;
//!
//! # fn main() -> codesearch_store::Result<()> {
//! let registry = IndexPoolRegistry::new(Arc::new(TantivyStore::in_memory()));
//! let schema = IndexSchema::new().keyword("id").text("body", true);
//! let pool = registry.get_or_open(std::path::Path::new("scratch"), &schema)?;
//!
//! let mut doc = Document::new();
//! doc.add_keyword("id", "1").add_text("body", "Hello World", true);
//! pool.mutate(|writer| writer.add_documents(vec![doc]))?;
//!
//! let hits = pool.search(&Query::term("body", "hello"), 10)?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

mod analyzer;
mod document;
mod engine;
mod error;
mod lock;
mod pool;
mod query;
mod registry;
mod schema;
mod store;

pub use analyzer::{CODE_CS_TOKENIZER, CODE_TOKENIZER};
pub use document::{Document, Field, FieldKind, FieldValue};
pub use engine::{index_exists, TantivyStore, TantivyWriter, WRITER_HEAP_BYTES};
pub use error::{Result, StoreError};
pub use pool::{IndexPool, Searcher, DEFAULT_LOCK_TIMEOUT};
pub use query::{Occur, Query, SpanClause, Term};
pub use registry::IndexPoolRegistry;
pub use schema::{FieldSpec, IndexSchema};
pub use store::{IndexReader, IndexStore, IndexWriter};
