use crate::reconciler::ChangeEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Retries allowed per change; the change is dropped once its count
/// exceeds this.
pub const MAX_RETRY_COUNT: u32 = 10;

/// Minimum spacing between two attempts at the same change.
pub const MIN_RETRY_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RetryableChange {
    pub change: ChangeEvent,
    pub retry_count: u32,
    pub last_attempt: Instant,
}

impl RetryableChange {
    pub fn new(change: ChangeEvent) -> Self {
        Self {
            change,
            retry_count: 0,
            last_attempt: Instant::now(),
        }
    }

    /// How long to wait before the next attempt may run, given the
    /// minimum `spacing` between attempts.
    pub fn wait_before_retry(&self, spacing: Duration) -> Duration {
        spacing.saturating_sub(self.last_attempt.elapsed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Requeued,
    Dropped,
}

/// FIFO of changes that failed with a transient error.
#[derive(Debug)]
pub struct RetryQueue {
    queue: Mutex<VecDeque<RetryableChange>>,
    dropped: AtomicU64,
    spacing: Duration,
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::with_spacing(MIN_RETRY_SPACING)
    }
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spacing(spacing: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
            spacing,
        }
    }

    /// Remaining wait before `item` may be attempted again.
    pub fn wait_for(&self, item: &RetryableChange) -> Duration {
        item.wait_before_retry(self.spacing)
    }

    /// Enqueue a change after its first failure.
    pub fn push(&self, change: ChangeEvent) {
        self.queue.lock().push_back(RetryableChange::new(change));
    }

    pub fn pop(&self) -> Option<RetryableChange> {
        self.queue.lock().pop_front()
    }

    /// Record another failed attempt and either enqueue the change again or
    /// drop it for good.
    pub fn record_failure(&self, mut item: RetryableChange) -> RetryDecision {
        item.retry_count += 1;
        item.last_attempt = Instant::now();
        if item.retry_count > MAX_RETRY_COUNT {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Giving up on {:?} {} after {} retries",
                item.change.kind,
                item.change.path.display(),
                MAX_RETRY_COUNT + 1
            );
            return RetryDecision::Dropped;
        }
        self.queue.lock().push_back(item);
        RetryDecision::Requeued
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn always_failing_change_is_retried_eleven_times_then_dropped() {
        let queue = RetryQueue::new();
        queue.push(ChangeEvent::changed("locked.rs"));

        let mut attempts = 0;
        while let Some(item) = queue.pop() {
            assert!(item.retry_count <= MAX_RETRY_COUNT);
            attempts += 1;
            if queue.record_failure(item) == RetryDecision::Dropped {
                break;
            }
        }

        assert_eq!(attempts, 11);
        assert!(queue.is_empty());
        assert_eq!(queue.dropped_count(), 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn queue_is_fifo() {
        let queue = RetryQueue::new();
        queue.push(ChangeEvent::changed("a"));
        queue.push(ChangeEvent::changed("b"));
        let first = queue.pop().unwrap();
        assert_eq!(queue.record_failure(first), RetryDecision::Requeued);
        assert_eq!(queue.pop().unwrap().change.path.to_str(), Some("b"));
        let again = queue.pop().unwrap();
        assert_eq!(again.change.path.to_str(), Some("a"));
        assert_eq!(again.retry_count, 1);
    }

    #[test]
    fn fresh_attempt_must_wait() {
        let queue = RetryQueue::new();
        let item = RetryableChange::new(ChangeEvent::deleted("x"));
        assert!(queue.wait_for(&item) > Duration::from_millis(500));
        let mut old = item.clone();
        old.last_attempt = Instant::now() - Duration::from_secs(5);
        assert_eq!(queue.wait_for(&old), Duration::ZERO);
        assert_eq!(RetryQueue::with_spacing(Duration::ZERO).wait_for(&item), Duration::ZERO);
    }
}
