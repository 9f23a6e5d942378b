use crate::builder::IndexBuilder;
use crate::document::{content_schema, hint_schema, path_key};
use crate::error::{IndexerError, Result};
use crate::health::MaintainerHealth;
use crate::initializer::initial_sync;
use crate::limits::MaintainerConfig;
use crate::reconciler::{path_lower, reconcile, ChangeEvent, ChangeKind};
use crate::retry::{RetryDecision, RetryQueue};
use crate::scanner::FileScanner;
use crate::watcher::{create_fs_watcher, EventBatch};
use codesearch_protocol::{IndexDescriptor, IndexStatus};
use codesearch_store::IndexPoolRegistry;
use log::{debug, error, info, warn};
use notify::{Event, RecommendedWatcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Keeps one index in sync with its monitored directory.
///
/// ```text
/// start():  Idle/Disposed ─► Initializing ─► Initialized ─► Monitoring
///                            (initial diff)   (loops up)
/// stop():   * ─► Disposing ─► Disposed       (final flush, pools released)
/// ```
///
/// While monitoring, three tasks share one shutdown signal: the event loop
/// (settle, reconcile, apply), the retry loop and the commit loop.
pub struct Maintainer {
    descriptor: Arc<IndexDescriptor>,
    registry: Arc<IndexPoolRegistry>,
    config: MaintainerConfig,
    status_tx: watch::Sender<IndexStatus>,
    health_tx: Arc<watch::Sender<MaintainerHealth>>,
    cancel: parking_lot::Mutex<CancellationToken>,
    lifecycle: TokioMutex<Option<Running>>,
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    _watcher: RecommendedWatcher,
    pipeline: Arc<Pipeline>,
}

impl Maintainer {
    pub fn new(
        descriptor: IndexDescriptor,
        registry: Arc<IndexPoolRegistry>,
        config: MaintainerConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(IndexStatus::Idle);
        let (health_tx, _) = watch::channel(MaintainerHealth::initial());
        Self {
            descriptor: Arc::new(descriptor),
            registry,
            config,
            status_tx,
            health_tx: Arc::new(health_tx),
            cancel: parking_lot::Mutex::new(CancellationToken::new()),
            lifecycle: TokioMutex::new(None),
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> IndexStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<IndexStatus> {
        self.status_tx.subscribe()
    }

    #[must_use]
    pub fn health(&self) -> MaintainerHealth {
        self.health_tx.borrow().clone()
    }

    /// Initialize the index from disk and start monitoring.
    pub async fn start(&self) -> Result<()> {
        self.start_inner(false).await
    }

    /// Stop, clear both indexes, and start again from scratch.
    pub async fn rebuild(&self) -> Result<()> {
        self.stop().await?;
        self.start_inner(true).await
    }

    async fn start_inner(&self, rebuild: bool) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.transition(IndexStatus::Initializing)?;
        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        match self.initialize(rebuild, &cancel).await {
            Ok(running) => {
                *lifecycle = Some(running);
                Ok(())
            }
            Err(IndexerError::Cancelled) => {
                info!("Start of {} cancelled", self.descriptor.name);
                Err(IndexerError::Cancelled)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn initialize(&self, rebuild: bool, cancel: &CancellationToken) -> Result<Running> {
        let registry = self.registry.clone();
        let descriptor = self.descriptor.clone();
        let builder = spawn_blocking(move || {
            let content = registry.get_or_open(&descriptor.content_index_path(), &content_schema())?;
            let hints = registry.get_or_open(&descriptor.hint_index_path(), &hint_schema())?;
            Ok(IndexBuilder::new(descriptor, content, hints))
        })
        .await?;
        let builder = builder.with_batch_size(self.config.batch_size);

        // Watch before the initial scan so nothing changing during it is lost.
        let (event_tx, event_rx) = mpsc::channel(1024);
        let watcher = create_fs_watcher(&self.descriptor.monitor_folder, event_tx)?;

        let pipeline = Arc::new(Pipeline::new(builder, &self.config, self.health_tx.clone()));

        let sync_pipeline = pipeline.clone();
        let sync_cancel = cancel.clone();
        let report =
            spawn_blocking(move || initial_sync(&sync_pipeline.builder, rebuild, &sync_cancel))
                .await?;
        self.health_tx.send_modify(|h| {
            h.initial_files_indexed = report.indexed;
            h.last_flush = Some(SystemTime::now());
            h.last_error = None;
        });
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        self.transition(IndexStatus::Initialized)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(run_event_loop(
                pipeline.clone(),
                self.config,
                event_rx,
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_retry_loop(
                pipeline.clone(),
                self.config,
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_commit_loop(
                pipeline.clone(),
                self.config,
                self.descriptor.save_interval(),
                shutdown_rx,
            )),
        ];
        self.transition(IndexStatus::Monitoring)?;

        Ok(Running {
            shutdown_tx,
            tasks,
            _watcher: watcher,
            pipeline,
        })
    }

    /// Stop monitoring, flush, and release both index pools.
    ///
    /// Stopping an idle or disposed maintainer is a no-op.
    pub async fn stop(&self) -> Result<()> {
        self.cancel.lock().cancel();
        let mut lifecycle = self.lifecycle.lock().await;
        if self.status().is_stopped() {
            return Ok(());
        }
        self.transition(IndexStatus::Disposing)?;

        if let Some(running) = lifecycle.take() {
            let _ = running.shutdown_tx.send(true);
            for task in running.tasks {
                if let Err(err) = task.await {
                    warn!("Maintainer task ended abnormally: {err}");
                }
            }
            let pipeline = running.pipeline;
            let flushed = spawn_blocking(move || pipeline.flush()).await;
            if let Err(err) = flushed {
                warn!("Final flush of {} failed: {err}", self.descriptor.name);
            }
        }

        let registry = self.registry.clone();
        let descriptor = self.descriptor.clone();
        let released = spawn_blocking(move || {
            registry.release(&descriptor.content_index_path());
            registry.release(&descriptor.hint_index_path());
            Ok(())
        })
        .await;
        if let Err(err) = released {
            warn!("Releasing pools of {} failed: {err}", self.descriptor.name);
        }

        self.transition(IndexStatus::Disposed)?;
        Ok(())
    }

    fn transition(&self, next: IndexStatus) -> Result<()> {
        let mut from = next;
        let moved = self.status_tx.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if !moved {
            return Err(IndexerError::InvalidState { from, to: next });
        }
        self.health_tx.send_modify(|h| h.status = next);
        info!("Index {} is now {next}", self.descriptor.name);
        Ok(())
    }

    fn fail(&self, err: &IndexerError) {
        error!("Index {} failed: {err}", self.descriptor.name);
        self.health_tx
            .send_modify(|h| h.last_error = Some(err.to_string()));
        if let Err(state) = self.transition(IndexStatus::Error) {
            debug!("Not moving to error state: {state}");
        }
    }
}

/// Run blocking index work off the async threads.
async fn spawn_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| IndexerError::Other(format!("blocking index task failed: {e}")))?
}

enum Outcome {
    Applied,
    /// A directory disappeared; its removal waits for the debounce.
    DeferredRemoval(PathBuf),
    Ignored,
}

/// State shared by the live loops.
struct Pipeline {
    builder: IndexBuilder,
    retries: RetryQueue,
    /// Changes applied since the last flush.
    pending: AtomicU64,
    last_flush: parking_lot::Mutex<Instant>,
    health_tx: Arc<watch::Sender<MaintainerHealth>>,
}

impl Pipeline {
    fn new(
        builder: IndexBuilder,
        config: &MaintainerConfig,
        health_tx: Arc<watch::Sender<MaintainerHealth>>,
    ) -> Self {
        Self {
            builder,
            retries: RetryQueue::with_spacing(config.retry_spacing),
            pending: AtomicU64::new(0),
            last_flush: parking_lot::Mutex::new(Instant::now()),
            health_tx,
        }
    }

    fn apply(&self, change: &ChangeEvent) -> Result<Outcome> {
        let descriptor = self.builder.descriptor();
        match change.kind {
            ChangeKind::Created | ChangeKind::Changed => {
                let path = &change.path;
                let key = path_key(path);
                if path.is_dir() {
                    if change.kind == ChangeKind::Changed || descriptor.is_dir_excluded(path) {
                        return Ok(Outcome::Ignored);
                    }
                    for file in FileScanner::new(descriptor).scan_dir(path) {
                        self.builder.add_or_update_file(&file.path)?;
                    }
                    return Ok(Outcome::Applied);
                }
                if !descriptor.is_file_included(path) {
                    if self.builder.content_document_exists(&key)? {
                        self.builder.delete(&key)?;
                        return Ok(Outcome::Applied);
                    }
                    return Ok(Outcome::Ignored);
                }
                self.builder.add_or_update_file(path)?;
                Ok(Outcome::Applied)
            }
            ChangeKind::Deleted => {
                let key = path_key(&change.path);
                if self.builder.content_document_exists(&key)? {
                    self.builder.delete(&key)?;
                    Ok(Outcome::Applied)
                } else if self.builder.has_descendants(&key)? {
                    Ok(Outcome::DeferredRemoval(change.path.clone()))
                } else {
                    Ok(Outcome::Ignored)
                }
            }
            ChangeKind::Renamed => {
                let Some(old) = change.old_path.as_ref() else {
                    return Ok(Outcome::Ignored);
                };
                let old_key = path_key(old);
                let new = &change.path;
                if new.is_dir() {
                    if descriptor.is_dir_excluded(new) {
                        self.builder.delete(&old_key)?;
                        return Ok(Outcome::Applied);
                    }
                    self.builder.rename(&old_key, new)?;
                    for file in FileScanner::new(descriptor).scan_dir(new) {
                        if !self.builder.content_document_exists(&path_key(&file.path))? {
                            self.builder.add_or_update_file(&file.path)?;
                        }
                    }
                    return Ok(Outcome::Applied);
                }
                if !new.exists() || !descriptor.is_file_included(new) {
                    self.builder.delete(&old_key)?;
                    return Ok(Outcome::Applied);
                }
                self.builder.rename(&old_key, new)?;
                Ok(Outcome::Applied)
            }
        }
    }

    /// Apply a reconciled batch. Transient failures go to the retry queue;
    /// returns directories whose removal must wait.
    fn apply_batch(&self, changes: Vec<ChangeEvent>) -> Vec<PathBuf> {
        let mut deferred = Vec::new();
        for change in changes {
            match self.apply(&change) {
                Ok(Outcome::Applied) => {
                    self.pending.fetch_add(1, Ordering::AcqRel);
                }
                Ok(Outcome::DeferredRemoval(path)) => deferred.push(path),
                Ok(Outcome::Ignored) => {}
                Err(err) if err.is_transient() => {
                    debug!("Queueing {} for retry: {err}", change.path.display());
                    self.retries.push(change);
                }
                Err(err) => {
                    warn!("Failed to apply change to {}: {err}", change.path.display());
                    self.record_error(&err);
                }
            }
        }
        self.publish();
        deferred
    }

    /// Apply one change without any debounce; used by retries.
    fn apply_now(&self, change: &ChangeEvent) -> Result<()> {
        match self.apply(change)? {
            Outcome::Applied => {
                self.pending.fetch_add(1, Ordering::AcqRel);
            }
            Outcome::DeferredRemoval(path) => self.remove_directory(&path)?,
            Outcome::Ignored => {}
        }
        Ok(())
    }

    /// Drop the subtree of a removed directory unless it came back.
    fn remove_directory(&self, path: &std::path::Path) -> Result<()> {
        if path.exists() {
            debug!("{} reappeared; ignoring its removal", path.display());
            return Ok(());
        }
        let removed = self.builder.delete(&path_key(path))?;
        if removed > 0 {
            self.pending.fetch_add(removed as u64, Ordering::AcqRel);
        }
        Ok(())
    }

    fn remove_directories(&self, paths: Vec<PathBuf>) {
        for path in paths {
            match self.remove_directory(&path) {
                Ok(()) => {}
                Err(err) if err.is_transient() => self.retries.push(ChangeEvent::deleted(path)),
                Err(err) => {
                    warn!("Failed to remove directory {}: {err}", path.display());
                    self.record_error(&err);
                }
            }
        }
        self.publish();
    }

    fn flush_due(&self, threshold: u64, save_interval: std::time::Duration) -> bool {
        let pending = self.pending.load(Ordering::Acquire);
        pending > threshold || (pending > 0 && self.last_flush.lock().elapsed() >= save_interval)
    }

    fn flush(&self) -> Result<()> {
        let flushed = self.pending.swap(0, Ordering::AcqRel);
        if let Err(err) = self.builder.flush() {
            self.pending.fetch_add(flushed, Ordering::AcqRel);
            self.record_error(&err);
            return Err(err);
        }
        *self.last_flush.lock() = Instant::now();
        debug!("Flushed {flushed} changes of {}", self.builder.descriptor().name);
        self.health_tx.send_modify(|h| h.last_flush = Some(SystemTime::now()));
        self.publish();
        Ok(())
    }

    fn record_error(&self, err: &IndexerError) {
        self.health_tx
            .send_modify(|h| h.last_error = Some(err.to_string()));
    }

    fn publish(&self) {
        let pending = self.pending.load(Ordering::Acquire);
        let retry_queue_len = self.retries.len();
        let dropped = self.retries.dropped_count();
        self.health_tx.send_modify(|h| {
            h.pending_changes = pending;
            h.retry_queue_len = retry_queue_len;
            h.dropped_changes = dropped;
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_event_loop(
    pipeline: Arc<Pipeline>,
    config: MaintainerConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut batch = EventBatch::new();
    let mut settle_deadline: Option<Instant> = None;
    let mut removals: HashMap<String, (PathBuf, Instant)> = HashMap::new();

    while !*shutdown.borrow() {
        let next_removal = removals.values().map(|(_, due)| *due).min();

        tokio::select! {
            _ = shutdown.changed() => break,
            received = event_rx.recv() => match received {
                Some(Ok(event)) => {
                    // The deadline starts with the first change of a batch;
                    // later events join it without pushing it back.
                    if batch.push(&event) > 0 && settle_deadline.is_none() {
                        settle_deadline = Some(Instant::now() + config.settle_delay);
                    }
                }
                Some(Err(err)) => warn!("Watcher error: {err}"),
                None => break,
            },
            () = sleep_until_opt(settle_deadline), if settle_deadline.is_some() => {
                settle_deadline = None;
                let changes = reconcile(batch.take());
                debug!("Applying {} reconciled changes", changes.len());
                let worker = pipeline.clone();
                match tokio::task::spawn_blocking(move || worker.apply_batch(changes)).await {
                    Ok(deferred) => {
                        let due = Instant::now() + config.directory_removal_delay;
                        for path in deferred {
                            removals.insert(path_lower(&path), (path, due));
                        }
                    }
                    Err(err) => error!("Change batch task failed: {err}"),
                }
            }
            () = sleep_until_opt(next_removal), if next_removal.is_some() => {
                let now = Instant::now();
                let due_keys: Vec<String> = removals
                    .iter()
                    .filter(|(_, (_, due))| *due <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                let due: Vec<PathBuf> = due_keys
                    .iter()
                    .filter_map(|key| removals.remove(key).map(|(path, _)| path))
                    .collect();
                let worker = pipeline.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || worker.remove_directories(due)).await {
                    error!("Directory removal task failed: {err}");
                }
            }
        }
    }
    debug!("Event loop stopped");
}

async fn run_retry_loop(
    pipeline: Arc<Pipeline>,
    config: MaintainerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            () = time::sleep(config.retry_poll_interval) => {}
        }

        for _ in 0..pipeline.retries.len() {
            let Some(item) = pipeline.retries.pop() else {
                break;
            };
            let wait = pipeline.retries.wait_for(&item);
            if !wait.is_zero() {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    () = time::sleep(wait) => {}
                }
            }

            let worker = pipeline.clone();
            let change = item.change.clone();
            match tokio::task::spawn_blocking(move || worker.apply_now(&change)).await {
                Ok(Ok(())) => debug!("Retried {} successfully", item.change.path.display()),
                Ok(Err(err)) if err.is_transient() => {
                    if pipeline.retries.record_failure(item) == RetryDecision::Dropped {
                        pipeline.record_error(&err);
                    }
                }
                Ok(Err(err)) => {
                    warn!("Retry of {} failed permanently: {err}", item.change.path.display());
                    pipeline.record_error(&err);
                }
                Err(err) => error!("Retry task failed: {err}"),
            }
            pipeline.publish();
        }
    }
}

async fn run_commit_loop(
    pipeline: Arc<Pipeline>,
    config: MaintainerConfig,
    save_interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(config.commit_poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if !pipeline.flush_due(config.commit_threshold, save_interval) {
                    continue;
                }
                let worker = pipeline.clone();
                match tokio::task::spawn_blocking(move || worker.flush()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("Periodic flush failed: {err}"),
                    Err(err) => error!("Flush task failed: {err}"),
                }
            }
        }
    }
}
