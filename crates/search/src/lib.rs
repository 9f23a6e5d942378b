//! # Codesearch Search
//!
//! Query language, query generation, hint lookup and the index registry that
//! embedders talk to.
//!
//! ## Architecture
//!
//! ```text
//! SearchRequest ──> QueryGenerator ──> QueryParser ──> Query ──> IndexPool (content)
//! HintRequest   ──> hint_query ─────────────────────> Query ──> IndexPool (hints)
//!
//! IndexManagement: descriptors + one Maintainer per index, FetchResult replies
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use codesearch_indexer::MaintainerConfig;
//! use codesearch_protocol::{IndexDescriptor, SearchRequest};
//! use codesearch_search::IndexManagement;
//! use codesearch_store::{IndexPoolRegistry, TantivyStore};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let registry = Arc::new(IndexPoolRegistry::new(Arc::new(TantivyStore::persistent())));
//! let management = IndexManagement::new(registry, MaintainerConfig::from_env());
//!
//! let descriptor = IndexDescriptor::new("demo", "/work/demo", "/var/lib/codesearch/demo");
//! let id = management.add_index(descriptor).result.unwrap();
//! management.start_index(id).await;
//!
//! let found = management.search(id, SearchRequest::content("fn main")).await;
//! println!("{} hits", found.result.map_or(0, |hits| hits.len()));
//! management.shutdown().await;
//! # }
//! ```

mod analysis;
mod error;
mod generator;
mod hints;
mod management;
mod parser;

pub use error::{Result, SearchError};
pub use generator::QueryGenerator;
pub use hints::{collect_hints, hint_query};
pub use management::{hints_snapshot, search_snapshot, IndexManagement};
pub use parser::{FieldMode, QueryParser};
