use crate::error::Result;
use crate::pool::{IndexPool, DEFAULT_LOCK_TIMEOUT};
use crate::schema::IndexSchema;
use crate::store::IndexStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Owns every open [`IndexPool`], keyed by index directory.
///
/// A directory has at most one writer for the lifetime of its pool.
/// Instances are independent, so tests (or embedders) can run several
/// registries side by side.
pub struct IndexPoolRegistry {
    store: Arc<dyn IndexStore>,
    pools: RwLock<HashMap<PathBuf, Arc<IndexPool>>>,
    lock_timeout: Duration,
}

impl IndexPoolRegistry {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self::with_lock_timeout(store, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(store: Arc<dyn IndexStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            pools: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Existing pool for `path`, or a new one with a freshly opened writer.
    pub fn get_or_open(&self, path: &Path, schema: &IndexSchema) -> Result<Arc<IndexPool>> {
        if let Some(pool) = self.pools.read().get(path) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write();
        if let Some(pool) = pools.get(path) {
            return Ok(pool.clone());
        }
        let writer = self.store.open_writer(path, schema)?;
        let pool = Arc::new(IndexPool::new(path, writer, self.lock_timeout));
        pools.insert(path.to_path_buf(), pool.clone());
        log::info!("Opened index pool {}", path.display());
        Ok(pool)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<IndexPool>> {
        self.pools.read().get(path).cloned()
    }

    /// Dispose and forget the pool for `path`, if any.
    pub fn release(&self, path: &Path) {
        let removed = self.pools.write().remove(path);
        if let Some(pool) = removed {
            pool.dispose();
            log::info!("Released index pool {}", path.display());
        }
    }

    pub fn release_all(&self) {
        let drained: Vec<Arc<IndexPool>> = self.pools.write().drain().map(|(_, p)| p).collect();
        for pool in drained {
            pool.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}

impl Drop for IndexPoolRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
