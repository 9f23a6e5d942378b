use crate::error::Result;
use crate::reconciler::{same_path, ChangeEvent, ChangeKind};
use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// Watch `root` recursively, forwarding raw notify events to `sender`.
pub fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            forward(&sender, res);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    log::info!("Watching {}", root.display());
    Ok(watcher)
}

/// Hand one watcher result to the pipeline. Returns `false` once the
/// receiving side is gone.
fn forward(sender: &mpsc::Sender<notify::Result<Event>>, res: notify::Result<Event>) -> bool {
    if sender.blocking_send(res).is_err() {
        log::debug!("Watcher event dropped: receiver closed");
        return false;
    }
    true
}

struct Mapped {
    change: ChangeEvent,
    /// Produced from one side of a rename that the backend may report
    /// again as a paired rename.
    rename_half: bool,
}

fn map_event(event: &Event) -> Vec<Mapped> {
    let each = |kind: fn(&Path) -> ChangeEvent, rename_half: bool| {
        event
            .paths
            .iter()
            .map(|p| Mapped {
                change: kind(p),
                rename_half,
            })
            .collect::<Vec<_>>()
    };
    let created: fn(&Path) -> ChangeEvent = |p| ChangeEvent::created(p);
    let deleted: fn(&Path) -> ChangeEvent = |p| ChangeEvent::deleted(p);
    let changed: fn(&Path) -> ChangeEvent = |p| ChangeEvent::changed(p);

    match &event.kind {
        EventKind::Create(_) => each(created, false),
        EventKind::Remove(_) => each(deleted, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![Mapped {
                change: ChangeEvent::renamed(from, to),
                rename_half: false,
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(deleted, true),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(created, true),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| Mapped {
                change: if p.exists() {
                    ChangeEvent::created(p)
                } else {
                    ChangeEvent::deleted(p)
                },
                rename_half: false,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => Vec::new(),
        EventKind::Modify(_) | EventKind::Any => each(changed, false),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// Changes collected from the watcher since the last batch ran.
#[derive(Default)]
pub struct EventBatch {
    events: Vec<Mapped>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the changes described by a notify event; returns how many were
    /// added.
    ///
    /// A paired rename supersedes the separate from/to halves some
    /// backends report for the same move.
    pub fn push(&mut self, event: &Event) -> usize {
        let mapped = map_event(event);
        let added = mapped.len();
        for item in mapped {
            if item.change.kind == ChangeKind::Renamed {
                self.drop_rename_halves(&item.change);
            }
            self.events.push(item);
        }
        added
    }

    fn drop_rename_halves(&mut self, rename: &ChangeEvent) {
        let Some(old) = rename.old_path.as_deref() else {
            return;
        };
        self.events.retain(|item| {
            let change = &item.change;
            let is_half = item.rename_half
                && ((change.kind == ChangeKind::Deleted && same_path(&change.path, old))
                    || (change.kind == ChangeKind::Created && same_path(&change.path, &rename.path)));
            !is_half
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn take(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
            .into_iter()
            .map(|item| item.change)
            .collect()
    }
}
