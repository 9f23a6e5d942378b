use crate::document::Document;
use crate::error::Result;
use crate::query::Query;
use crate::store::{IndexReader, IndexWriter};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Reader snapshot tagged with the generation it was opened at.
///
/// Searches clone the `Arc` before running, so a snapshot replaced by a
/// refresh stays alive until the last search using it returns.
pub struct Searcher {
    generation: u64,
    reader: Arc<dyn IndexReader>,
}

impl Searcher {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn search(&self, query: &Query, limit: usize) -> Result<Vec<Document>> {
        self.reader.search(query, limit)
    }

    pub fn num_docs(&self) -> usize {
        self.reader.num_docs()
    }
}

/// Writer, cached searcher and change counter for one index directory.
///
/// Mutations and searches take the pool lock in shared mode; the store
/// serializes physical writes itself, the lock only guards the cache.
/// [`IndexPool::flush`] is the sole exclusive operation.
///
/// Lock waits are bounded by `lock_timeout`. When the wait expires the
/// operation is logged and carried out without the lock: the pool prefers
/// staying available over strict isolation.
pub struct IndexPool {
    path: PathBuf,
    writer: Arc<dyn IndexWriter>,
    lock: RwLock<()>,
    searcher: Mutex<Option<Arc<Searcher>>>,
    changes: AtomicU64,
    generation: AtomicU64,
    lock_timeout: Duration,
    disposed: AtomicBool,
}

impl IndexPool {
    pub fn new(path: impl AsRef<Path>, writer: Arc<dyn IndexWriter>, lock_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer,
            lock: RwLock::new(()),
            searcher: Mutex::new(None),
            changes: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            lock_timeout,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Changes applied since the cached searcher was last refreshed.
    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::Acquire)
    }

    /// Generation of the most recently opened searcher.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Apply `op` through the writer.
    pub fn mutate<T>(&self, op: impl FnOnce(&dyn IndexWriter) -> Result<T>) -> Result<T> {
        let _guard = self.read_guard("mutate");
        let outcome = op(self.writer.as_ref());
        self.changes.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    pub fn search(&self, query: &Query, limit: usize) -> Result<Vec<Document>> {
        let _guard = self.read_guard("search");
        let searcher = self.current_searcher()?;
        searcher.search(query, limit)
    }

    pub fn num_docs(&self) -> Result<usize> {
        let _guard = self.read_guard("num_docs");
        Ok(self.current_searcher()?.num_docs())
    }

    /// Commit the writer and drop the cached searcher.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.write_guard("flush");
        self.writer.commit()?;
        self.searcher.lock().take();
        self.changes.store(0, Ordering::Release);
        debug!("Flushed index {}", self.path.display());
        Ok(())
    }

    /// Commit and release the writer. Safe to call more than once; failures
    /// are logged, never returned.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = self.write_guard("dispose");
        if let Err(err) = self.writer.commit() {
            warn!("Final commit of {} failed: {err}", self.path.display());
        }
        self.searcher.lock().take();
        self.changes.store(0, Ordering::Release);
        for attempt in 1..=2 {
            match self.writer.close() {
                Ok(()) => break,
                Err(err) => warn!(
                    "Closing writer for {} failed (attempt {attempt}): {err}",
                    self.path.display()
                ),
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn current_searcher(&self) -> Result<Arc<Searcher>> {
        let mut slot = self.searcher.lock();
        if let Some(searcher) = slot.as_ref() {
            if self.changes.load(Ordering::Acquire) == 0 {
                return Ok(searcher.clone());
            }
        }

        // Reset before opening so changes racing with the refresh keep the
        // counter non-zero and trigger the next one.
        let consumed = self.changes.swap(0, Ordering::AcqRel);
        let reader = match self.writer.open_reader() {
            Ok(reader) => reader,
            Err(err) => {
                self.changes.fetch_add(consumed, Ordering::AcqRel);
                return Err(err);
            }
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let searcher = Arc::new(Searcher { generation, reader });
        *slot = Some(searcher.clone());
        Ok(searcher)
    }

    fn read_guard(&self, op: &str) -> Option<RwLockReadGuard<'_, ()>> {
        let started = Instant::now();
        let guard = self.lock.try_read_for(self.lock_timeout);
        if guard.is_none() {
            warn!(
                "{op} on {} could not take the pool lock within {:?}; continuing unsynchronized",
                self.path.display(),
                started.elapsed()
            );
        }
        guard
    }

    fn write_guard(&self, op: &str) -> Option<RwLockWriteGuard<'_, ()>> {
        let started = Instant::now();
        let guard = self.lock.try_write_for(self.lock_timeout);
        if guard.is_none() {
            warn!(
                "{op} on {} could not take the pool lock within {:?}; continuing unsynchronized",
                self.path.display(),
                started.elapsed()
            );
        }
        guard
    }
}
