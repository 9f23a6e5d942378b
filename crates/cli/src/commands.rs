use crate::config::AppConfig;
use anyhow::{anyhow, Result};
use codesearch_indexer::{MaintainerConfig, MaintainerHealth};
use codesearch_protocol::{
    FetchResult, HintRequest, IndexDescriptor, IndexStatus, SearchRequest,
};
use codesearch_search::{hints_snapshot, search_snapshot, IndexManagement};
use codesearch_store::{IndexPoolRegistry, TantivyStore};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub id: Uuid,
    pub name: String,
    pub health: MaintainerHealth,
}

#[derive(Debug, Serialize)]
pub struct IndexOverview {
    pub id: Uuid,
    pub name: String,
    pub monitor_folder: PathBuf,
    pub index_folder: PathBuf,
    /// Documents in the last committed snapshot; `None` when unreadable.
    pub documents: Option<usize>,
    pub hint_words: Option<usize>,
}

pub fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        codesearch_protocol::serialize_json(value)?
    };
    println!("{text}");
    Ok(())
}

/// Print a result and turn a failed one into an error exit.
pub fn finish<T: Serialize>(result: FetchResult<T>, pretty: bool) -> Result<()> {
    print(&result, pretty)?;
    if result.is_success() {
        Ok(())
    } else {
        Err(anyhow!(result.status.status_desc))
    }
}

fn management(config: &AppConfig) -> IndexManagement {
    let registry = IndexPoolRegistry::with_lock_timeout(
        Arc::new(TantivyStore::persistent()),
        config.lock_timeout(),
    );
    IndexManagement::new(Arc::new(registry), MaintainerConfig::from_env())
}

fn register(management: &IndexManagement, descriptors: Vec<IndexDescriptor>) -> Result<Vec<Uuid>> {
    descriptors
        .into_iter()
        .map(|descriptor| {
            let name = descriptor.name.clone();
            let added = management.add_index(descriptor);
            added
                .result
                .ok_or_else(|| anyhow!("{name}: {}", added.status.status_desc))
        })
        .collect()
}

/// Bring each index up to date with its folder, then stop.
pub async fn run_index(config: &AppConfig, names: &[String], rebuild: bool) -> Result<Vec<IndexReport>> {
    let management = management(config);
    let ids = register(&management, config.select(names)?)?;
    let mut reports = Vec::with_capacity(ids.len());
    for id in ids {
        let outcome = if rebuild {
            management.rebuild(id).await
        } else {
            management.start_index(id).await
        };
        let health = management.status(id).result;
        let stopped = management.stop_index(id).await;
        let Some(maintainer) = management.maintainer(id) else {
            continue;
        };
        let name = maintainer.descriptor().name.clone();
        if !outcome.is_success() {
            warn!("Indexing {name} failed: {}", outcome.status.status_desc);
        } else if !stopped.is_success() {
            warn!("Stopping {name} failed: {}", stopped.status.status_desc);
        }
        if let Some(health) = health {
            reports.push(IndexReport { id, name, health });
        }
    }
    management.shutdown().await;
    Ok(reports)
}

/// Keep the selected indexes current until Ctrl-C.
pub async fn run_watch(config: &AppConfig, names: &[String]) -> Result<()> {
    let management = management(config);
    let ids = register(&management, config.select(names)?)?;
    for &id in &ids {
        let started = management.start_index(id).await;
        if !started.is_success() {
            management.shutdown().await;
            return Err(anyhow!(started.status.status_desc));
        }
    }

    let mut streams: Vec<_> = ids
        .iter()
        .filter_map(|&id| management.maintainer(id))
        .map(|m| (m.descriptor().name.clone(), m.subscribe_status()))
        .collect();
    info!("Watching {} index(es); press Ctrl-C to stop", streams.len());

    let status_log = async {
        loop {
            let mut changed = false;
            for (name, rx) in streams.iter_mut() {
                if rx.has_changed().unwrap_or(false) {
                    let status = *rx.borrow_and_update();
                    info!("{name}: {status}");
                    if status == IndexStatus::Error {
                        warn!("{name} stopped maintaining its index; see the log above");
                    }
                    changed = true;
                }
            }
            if !changed {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!("Cannot listen for Ctrl-C: {err}");
            }
        }
        _ = status_log => {}
    }
    info!("Shutting down");
    management.shutdown().await;
    Ok(())
}

pub fn run_search(
    config: &AppConfig,
    index: &str,
    request: &SearchRequest,
) -> Result<FetchResult<Vec<codesearch_protocol::CodeDocument>>> {
    let descriptor = config.find(index)?;
    Ok(search_snapshot(descriptor, request).into())
}

pub fn run_hints(config: &AppConfig, index: &str, request: &HintRequest) -> Result<FetchResult<Vec<String>>> {
    let descriptor = config.find(index)?;
    Ok(hints_snapshot(descriptor, request).into())
}

pub fn run_status(config: &AppConfig) -> Vec<IndexOverview> {
    config
        .indexes
        .iter()
        .map(|descriptor| IndexOverview {
            id: descriptor.id,
            name: descriptor.name.clone(),
            monitor_folder: descriptor.monitor_folder.clone(),
            index_folder: descriptor.index_folder.clone(),
            documents: count_docs(&descriptor.content_index_path()),
            hint_words: count_docs(&descriptor.hint_index_path()),
        })
        .collect()
}

fn count_docs(path: &std::path::Path) -> Option<usize> {
    match TantivyStore::open_read_only(path) {
        Ok(reader) => Some(reader.num_docs()),
        Err(err) => {
            warn!("Cannot read {}: {err}", path.display());
            None
        }
    }
}
