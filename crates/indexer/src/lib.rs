//! # Codesearch Indexer
//!
//! Builds the content and hint indexes of a monitored directory and keeps
//! them current.
//!
//! ## Architecture
//!
//! ```text
//! notify ──> EventBatch ──(settle)──> reconcile() ──> IndexBuilder ──> IndexPool (content)
//!                                         │               │
//!                                         │               └──> IndexPool (hints)
//!                                         └── transient failures ──> RetryQueue
//!
//! Maintainer: status machine + event / retry / commit loops
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use codesearch_indexer::{Maintainer, MaintainerConfig};
//! use codesearch_protocol::IndexDescriptor;
//! use codesearch_store::{IndexPoolRegistry, TantivyStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> codesearch_indexer::Result<()> {
//! let registry = Arc::new(IndexPoolRegistry::new(Arc::new(TantivyStore::persistent())));
//! let descriptor = IndexDescriptor::new("demo", "/work/demo", "/var/lib/codesearch/demo");
//! let maintainer = Maintainer::new(descriptor, registry, MaintainerConfig::default());
//!
//! maintainer.start().await?;
//! // ... the index follows the directory until:
//! maintainer.stop().await?;
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod document;
mod error;
mod health;
mod initializer;
mod limits;
mod maintainer;
mod reconciler;
mod retry;
mod scanner;
mod watcher;

pub use builder::{BuildReport, IndexBuilder, BATCH_SIZE};
pub use document::{content_schema, fields, hint_fields, hint_schema};
pub use error::{IndexerError, Result};
pub use health::MaintainerHealth;
pub use initializer::initial_sync;
pub use limits::{parse_bounded, MaintainerConfig};
pub use maintainer::Maintainer;
pub use reconciler::{reconcile, same_path, ChangeEvent, ChangeKind};
pub use retry::{RetryDecision, RetryQueue, RetryableChange, MAX_RETRY_COUNT, MIN_RETRY_SPACING};
pub use scanner::{FileScanner, ScannedFile};
pub use watcher::{create_fs_watcher, EventBatch};
