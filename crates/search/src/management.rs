//! Registry of configured indexes and the public operations over them.
//!
//! Every operation returns a [`FetchResult`]: failures are reported through
//! `status_desc`, never by panicking or by an `Err` the caller has to map.

use crate::error::{Result, SearchError};
use crate::generator::QueryGenerator;
use crate::hints::{collect_hints, hint_query};
use codesearch_indexer::document::from_document;
use codesearch_indexer::{Maintainer, MaintainerConfig, MaintainerHealth};
use codesearch_protocol::{
    CodeDocument, FetchResult, HintRequest, IndexDescriptor, SearchRequest,
};
use codesearch_store::{Document, IndexPool, IndexPoolRegistry, Query, TantivyStore};
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct IndexManagement {
    registry: Arc<IndexPoolRegistry>,
    config: MaintainerConfig,
    generator: QueryGenerator,
    indexes: RwLock<HashMap<Uuid, Arc<Maintainer>>>,
}

impl IndexManagement {
    pub fn new(registry: Arc<IndexPoolRegistry>, config: MaintainerConfig) -> Self {
        Self {
            registry,
            config,
            generator: QueryGenerator::new(),
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Descriptors of every registered index, ordered by name.
    pub fn indexes(&self) -> Vec<IndexDescriptor> {
        let mut out: Vec<IndexDescriptor> = self
            .indexes
            .read()
            .values()
            .map(|m| m.descriptor().clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn maintainer(&self, id: Uuid) -> Option<Arc<Maintainer>> {
        self.indexes.read().get(&id).cloned()
    }

    /// Register an index without starting it.
    pub fn add_index(&self, descriptor: IndexDescriptor) -> FetchResult<Uuid> {
        self.add_index_inner(descriptor).into()
    }

    /// Replace the descriptor of a stopped index.
    pub fn update_index(&self, descriptor: IndexDescriptor) -> FetchResult<()> {
        self.update_index_inner(descriptor).into()
    }

    /// Stop an index if needed and forget it. Index files stay on disk.
    pub async fn remove_index(&self, id: Uuid) -> FetchResult<()> {
        self.remove_index_inner(id).await.into()
    }

    pub async fn start_index(&self, id: Uuid) -> FetchResult<()> {
        match self.lookup(id) {
            Ok(maintainer) => maintainer.start().await.map_err(SearchError::from).into(),
            Err(err) => FetchResult::failed(err.to_string()),
        }
    }

    pub async fn stop_index(&self, id: Uuid) -> FetchResult<()> {
        match self.lookup(id) {
            Ok(maintainer) => maintainer.stop().await.map_err(SearchError::from).into(),
            Err(err) => FetchResult::failed(err.to_string()),
        }
    }

    /// Clear both indexes of `id` and build them again from the folder.
    pub async fn rebuild(&self, id: Uuid) -> FetchResult<()> {
        match self.lookup(id) {
            Ok(maintainer) => maintainer.rebuild().await.map_err(SearchError::from).into(),
            Err(err) => FetchResult::failed(err.to_string()),
        }
    }

    pub fn status(&self, id: Uuid) -> FetchResult<MaintainerHealth> {
        self.lookup(id).map(|m| m.health()).into()
    }

    pub async fn search(&self, id: Uuid, request: SearchRequest) -> FetchResult<Vec<CodeDocument>> {
        self.search_inner(id, request).await.into()
    }

    pub async fn hints(&self, id: Uuid, request: HintRequest) -> FetchResult<Vec<String>> {
        self.hints_inner(id, request).await.into()
    }

    /// Stop every index. Failures are logged.
    pub async fn shutdown(&self) {
        let maintainers: Vec<Arc<Maintainer>> = self.indexes.read().values().cloned().collect();
        for maintainer in maintainers {
            if let Err(err) = maintainer.stop().await {
                warn!("Stopping {} failed: {err}", maintainer.descriptor().name);
            }
        }
        self.registry.release_all();
    }

    fn lookup(&self, id: Uuid) -> Result<Arc<Maintainer>> {
        self.maintainer(id)
            .ok_or_else(|| SearchError::UnknownIndex(id.to_string()))
    }

    fn add_index_inner(&self, descriptor: IndexDescriptor) -> Result<Uuid> {
        descriptor
            .validate()
            .map_err(|err| SearchError::InvalidRequest(err.to_string()))?;
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&descriptor.id) {
            return Err(SearchError::InvalidRequest(format!(
                "index {} is already registered",
                descriptor.id
            )));
        }
        check_conflicts(indexes.values(), &descriptor)?;
        let id = descriptor.id;
        info!("Registered index {} ({id})", descriptor.name);
        indexes.insert(
            id,
            Arc::new(Maintainer::new(
                descriptor,
                self.registry.clone(),
                self.config,
            )),
        );
        Ok(id)
    }

    fn update_index_inner(&self, descriptor: IndexDescriptor) -> Result<()> {
        descriptor
            .validate()
            .map_err(|err| SearchError::InvalidRequest(err.to_string()))?;
        let mut indexes = self.indexes.write();
        let current = indexes
            .get(&descriptor.id)
            .ok_or_else(|| SearchError::UnknownIndex(descriptor.id.to_string()))?;
        let status = current.status();
        if !status.is_stopped() {
            return Err(SearchError::InvalidRequest(format!(
                "index {} must be stopped before it is edited (currently {status})",
                descriptor.name
            )));
        }
        check_conflicts(
            indexes.values().filter(|m| m.descriptor().id != descriptor.id),
            &descriptor,
        )?;
        info!("Updated index {} ({})", descriptor.name, descriptor.id);
        indexes.insert(
            descriptor.id,
            Arc::new(Maintainer::new(
                descriptor,
                self.registry.clone(),
                self.config,
            )),
        );
        Ok(())
    }

    async fn remove_index_inner(&self, id: Uuid) -> Result<()> {
        let maintainer = self
            .indexes
            .write()
            .remove(&id)
            .ok_or_else(|| SearchError::UnknownIndex(id.to_string()))?;
        maintainer.stop().await?;
        info!("Removed index {} ({id})", maintainer.descriptor().name);
        Ok(())
    }

    /// Pool of a running index, or an error naming its status.
    fn serving_pool(&self, id: Uuid, hints: bool) -> Result<Arc<IndexPool>> {
        let maintainer = self.lookup(id)?;
        let descriptor = maintainer.descriptor();
        let status = maintainer.status();
        if !status.is_serving() {
            return Err(SearchError::InvalidRequest(format!(
                "index {} is not serving (currently {status})",
                descriptor.name
            )));
        }
        let path = if hints {
            descriptor.hint_index_path()
        } else {
            descriptor.content_index_path()
        };
        self.registry
            .get(&path)
            .ok_or_else(|| SearchError::Other(format!("no open pool for {}", path.display())))
    }

    async fn search_inner(&self, id: Uuid, request: SearchRequest) -> Result<Vec<CodeDocument>> {
        let query = self.generator.generate(&request)?;
        let pool = self.serving_pool(id, false)?;
        let hits = blocking(move || Ok(pool.search(&query, request.limit)?)).await?;
        to_code_documents(&hits)
    }

    async fn hints_inner(&self, id: Uuid, request: HintRequest) -> Result<Vec<String>> {
        let query = hint_query(&request)?;
        let pool = self.serving_pool(id, true)?;
        let hits = blocking(move || Ok(pool.search(&query, usize::MAX)?)).await?;
        Ok(collect_hints(&hits, request.limit))
    }
}

/// Search the last committed snapshot of an index that no process in this
/// one is maintaining.
pub fn search_snapshot(
    descriptor: &IndexDescriptor,
    request: &SearchRequest,
) -> Result<Vec<CodeDocument>> {
    let query = QueryGenerator::new().generate(request)?;
    let hits = read_snapshot(descriptor, false, &query, request.limit)?;
    to_code_documents(&hits)
}

pub fn hints_snapshot(descriptor: &IndexDescriptor, request: &HintRequest) -> Result<Vec<String>> {
    let query = hint_query(request)?;
    let hits = read_snapshot(descriptor, true, &query, usize::MAX)?;
    Ok(collect_hints(&hits, request.limit))
}

fn read_snapshot(
    descriptor: &IndexDescriptor,
    hints: bool,
    query: &Query,
    limit: usize,
) -> Result<Vec<Document>> {
    let path = if hints {
        descriptor.hint_index_path()
    } else {
        descriptor.content_index_path()
    };
    let reader = TantivyStore::open_read_only(&path)?;
    Ok(reader.search(query, limit)?)
}

fn to_code_documents(hits: &[Document]) -> Result<Vec<CodeDocument>> {
    hits.iter()
        .map(|doc| from_document(doc).map_err(SearchError::from))
        .collect()
}

fn check_conflicts<'a>(
    existing: impl Iterator<Item = &'a Arc<Maintainer>>,
    candidate: &IndexDescriptor,
) -> Result<()> {
    for maintainer in existing {
        let other = maintainer.descriptor();
        if other.name.eq_ignore_ascii_case(&candidate.name) {
            return Err(SearchError::InvalidRequest(format!(
                "an index named {} already exists",
                candidate.name
            )));
        }
        if other.index_folder == candidate.index_folder {
            return Err(SearchError::InvalidRequest(format!(
                "index folder {} is already used by {}",
                candidate.index_folder.display(),
                other.name
            )));
        }
    }
    Ok(())
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| SearchError::Other(format!("blocking task failed: {err}")))?
}
