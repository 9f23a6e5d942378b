//! Collapses a time-ordered batch of filesystem changes before it is
//! applied to the index.
//!
//! Three passes run in a fixed order. Each pass walks the batch forward,
//! marks the events it consumes, and drops them once the pass is done:
//!
//! 1. a rename followed by the rename back becomes a single change of the
//!    original path;
//! 2. a delete followed by a create of the same path becomes a change;
//! 3. of several identical events only the last one is kept.
//!
//! Paths are compared case-insensitively. Running the reconciler on its own
//! output changes nothing.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Previous path; only set for [`ChangeKind::Renamed`].
    pub old_path: Option<PathBuf>,
    pub at: SystemTime,
}

impl ChangeEvent {
    fn new(kind: ChangeKind, path: impl Into<PathBuf>, old_path: Option<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path,
            at: SystemTime::now(),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Created, path, None)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Changed, path, None)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Deleted, path, None)
    }

    pub fn renamed(old_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Renamed, path, Some(old_path.into()))
    }

    fn same_as(&self, other: &ChangeEvent) -> bool {
        self.kind == other.kind
            && same_path(&self.path, &other.path)
            && match (&self.old_path, &other.old_path) {
                (Some(a), Some(b)) => same_path(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

pub fn path_lower(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

pub fn same_path(a: &Path, b: &Path) -> bool {
    a == b || path_lower(a) == path_lower(b)
}

pub fn reconcile(events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let events = collapse_rename_round_trips(events);
    let events = collapse_delete_create(events);
    collapse_duplicates(events)
}

/// Earliest unmarked event after `from` satisfying `pred`.
fn find_later(
    events: &[ChangeEvent],
    removed: &[bool],
    from: usize,
    pred: impl Fn(&ChangeEvent) -> bool,
) -> Option<usize> {
    (from + 1..events.len()).find(|&j| !removed[j] && pred(&events[j]))
}

fn sweep(events: Vec<ChangeEvent>, removed: Vec<bool>) -> Vec<ChangeEvent> {
    events
        .into_iter()
        .zip(removed)
        .filter_map(|(event, removed)| (!removed).then_some(event))
        .collect()
}

fn collapse_rename_round_trips(mut events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut removed = vec![false; events.len()];
    for i in 0..events.len() {
        if removed[i] || events[i].kind != ChangeKind::Renamed {
            continue;
        }
        let Some(old) = events[i].old_path.clone() else {
            continue;
        };
        let back = find_later(&events, &removed, i, |e| {
            e.kind == ChangeKind::Renamed && same_path(&e.path, &old)
        });
        if let Some(j) = back {
            events[i].kind = ChangeKind::Changed;
            events[i].path = old;
            events[i].old_path = None;
            removed[j] = true;
        }
    }
    sweep(events, removed)
}

fn collapse_delete_create(mut events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut removed = vec![false; events.len()];
    for i in 0..events.len() {
        if removed[i] || events[i].kind != ChangeKind::Deleted {
            continue;
        }
        let path = events[i].path.clone();
        let created = find_later(&events, &removed, i, |e| {
            e.kind == ChangeKind::Created && same_path(&e.path, &path)
        });
        if let Some(j) = created {
            removed[i] = true;
            events[j].kind = ChangeKind::Changed;
        }
    }
    sweep(events, removed)
}

fn collapse_duplicates(events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut removed = vec![false; events.len()];
    for i in 0..events.len() {
        if removed[i] {
            continue;
        }
        if find_later(&events, &removed, i, |e| e.same_as(&events[i])).is_some() {
            removed[i] = true;
        }
    }
    sweep(events, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shape(events: &[ChangeEvent]) -> Vec<(ChangeKind, String, Option<String>)> {
        events
            .iter()
            .map(|e| {
                (
                    e.kind,
                    e.path.display().to_string(),
                    e.old_path.as_ref().map(|p| p.display().to_string()),
                )
            })
            .collect()
    }

    #[test]
    fn rename_round_trip_becomes_change_of_original() {
        let out = reconcile(vec![
            ChangeEvent::renamed("b", "A"),
            ChangeEvent::renamed("a", "B"),
            ChangeEvent::renamed("e", "d"),
        ]);
        assert_eq!(
            shape(&out),
            vec![
                (ChangeKind::Changed, "b".to_string(), None),
                (ChangeKind::Renamed, "d".to_string(), Some("e".to_string())),
            ]
        );
    }

    #[test]
    fn delete_then_create_becomes_change() {
        let out = reconcile(vec![ChangeEvent::deleted("c"), ChangeEvent::created("C")]);
        assert_eq!(shape(&out), vec![(ChangeKind::Changed, "C".to_string(), None)]);
    }

    #[test]
    fn create_then_delete_is_kept() {
        let out = reconcile(vec![ChangeEvent::created("x"), ChangeEvent::deleted("x")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn duplicates_keep_latest() {
        let first = ChangeEvent::changed("f.rs");
        let second = ChangeEvent::changed("F.rs");
        let mut third = ChangeEvent::changed("f.RS");
        third.at = SystemTime::UNIX_EPOCH;
        let out = reconcile(vec![first, second, third.clone()]);
        assert_eq!(out, vec![third]);
    }

    #[test]
    fn renames_with_different_origins_are_not_duplicates() {
        let out = reconcile(vec![
            ChangeEvent::renamed("a", "z"),
            ChangeEvent::renamed("b", "z"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_batch() {
        assert!(reconcile(Vec::new()).is_empty());
    }
}
