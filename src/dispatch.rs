//! Event fabric: dedup, backpressure, poison-message handling, and
//! partition dispatch (component C1, spec §5.1-§5.2).
//!
//! Each partition is owned by exactly one worker thread, so a key's events
//! are processed strictly in arrival order and a component never needs to
//! synchronize state for a single key (single-writer-per-key, spec §5.3).
//! Workers communicate via bounded `ArrayQueue`s the way the teacher's
//! pipeline stages do; a full queue is backpressure, not an error, and
//! callers see `EventLogError` variants they can retry or shed on.

use crate::messages::IngressEvent;
use crossbeam_queue::ArrayQueue;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Fixed-size dedup window keyed by (source, event-id). Entries older than
/// `window` are swept lazily on insert (spec §5.2: "dedup window >= 24h").
pub struct DedupWindow {
    seen: DashMap<(String, uuid::Uuid), Instant>,
    window: Duration,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    /// Returns true if this is the first time the fingerprint has been
    /// seen within the window; records it either way.
    pub fn check_and_record(&self, fingerprint: (String, uuid::Uuid)) -> bool {
        let now = Instant::now();
        self.sweep(now);
        match self.seen.entry(fingerprint) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(now);
                true
            }
        }
    }

    fn sweep(&self, now: Instant) {
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.window);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Per-key consecutive-failure counter driving dead-letter routing (spec
/// §5.2 "after K consecutive processing failures, divert to DLQ").
pub struct PoisonTracker {
    failures: DashMap<u64, u32>,
    max_retries: u32,
}

pub enum PoisonOutcome {
    Retry(u32),
    DeadLetter,
}

impl PoisonTracker {
    pub fn new(max_retries: u32) -> Self {
        Self {
            failures: DashMap::new(),
            max_retries,
        }
    }

    pub fn record_failure(&self, partition_key: u64) -> PoisonOutcome {
        let mut count = self.failures.entry(partition_key).or_insert(0);
        *count += 1;
        if *count >= self.max_retries {
            PoisonOutcome::DeadLetter
        } else {
            PoisonOutcome::Retry(*count)
        }
    }

    pub fn record_success(&self, partition_key: u64) {
        self.failures.remove(&partition_key);
    }
}

/// One bounded inbox shared between a dispatcher and a single worker.
struct PartitionQueue {
    queue: ArrayQueue<IngressEvent>,
    dropped: AtomicUsize,
}

/// Hash-partitioned worker pool: `partition_count` bounded queues, each
/// drained by exactly one consumer the caller registers via `drain_with`.
/// Routing a key always lands on the same queue, which is what gives the
/// single-writer-per-key guarantee (spec §5.3).
pub struct PartitionDispatcher {
    queues: Vec<Arc<PartitionQueue>>,
    capacity_per_partition: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted,
    /// The target partition's queue is full; the fabric is overloaded for
    /// this key specifically (spec §5.2 "overloaded" failure mode).
    Overloaded,
}

impl PartitionDispatcher {
    pub fn new(partition_count: usize, capacity_per_partition: usize) -> Self {
        let queues = (0..partition_count.max(1))
            .map(|_| {
                Arc::new(PartitionQueue {
                    queue: ArrayQueue::new(capacity_per_partition),
                    dropped: AtomicUsize::new(0),
                })
            })
            .collect();
        Self {
            queues,
            capacity_per_partition,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.queues.len()
    }

    fn partition_of(&self, partition_key: u64) -> usize {
        (partition_key as usize) % self.queues.len()
    }

    pub fn dispatch(&self, event: IngressEvent) -> DispatchOutcome {
        let idx = self.partition_of(event.partition_key);
        match self.queues[idx].queue.push(event) {
            Ok(()) => DispatchOutcome::Accepted,
            Err(_) => {
                self.queues[idx].dropped.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Overloaded
            }
        }
    }

    pub fn try_pop(&self, partition: usize) -> Option<IngressEvent> {
        self.queues[partition].queue.pop()
    }

    pub fn dropped_count(&self, partition: usize) -> usize {
        self.queues[partition].dropped.load(Ordering::Relaxed)
    }

    pub fn capacity_per_partition(&self) -> usize {
        self.capacity_per_partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{ClientId, SecurityId};
    use crate::messages::{Event, IngressPayload};

    fn sample_event(partition_key: u64) -> IngressEvent {
        Event::new(
            "oms",
            partition_key,
            IngressPayload::LocateRequested {
                client: ClientId(1),
                security: SecurityId(1),
                qty: 10,
            },
        )
    }

    #[test]
    fn dedup_window_accepts_first_seen_and_rejects_repeat() {
        let win = DedupWindow::new(Duration::from_secs(3600));
        let fp = ("oms".to_string(), uuid::Uuid::new_v4());
        assert!(win.check_and_record(fp.clone()));
        assert!(!win.check_and_record(fp));
    }

    #[test]
    fn poison_tracker_dead_letters_after_max_retries() {
        let tracker = PoisonTracker::new(3);
        assert!(matches!(tracker.record_failure(1), PoisonOutcome::Retry(1)));
        assert!(matches!(tracker.record_failure(1), PoisonOutcome::Retry(2)));
        assert!(matches!(
            tracker.record_failure(1),
            PoisonOutcome::DeadLetter
        ));
    }

    #[test]
    fn poison_tracker_success_resets_the_counter() {
        let tracker = PoisonTracker::new(3);
        tracker.record_failure(1);
        tracker.record_success(1);
        assert!(matches!(tracker.record_failure(1), PoisonOutcome::Retry(1)));
    }

    #[test]
    fn same_partition_key_always_routes_to_the_same_partition() {
        let dispatcher = PartitionDispatcher::new(4, 16);
        let a = dispatcher.partition_of(42);
        let b = dispatcher.partition_of(42);
        assert_eq!(a, b);
    }

    #[test]
    fn full_partition_queue_reports_overloaded_not_error() {
        let dispatcher = PartitionDispatcher::new(1, 1);
        assert_eq!(
            dispatcher.dispatch(sample_event(1)),
            DispatchOutcome::Accepted
        );
        assert_eq!(
            dispatcher.dispatch(sample_event(1)),
            DispatchOutcome::Overloaded
        );
        assert_eq!(dispatcher.dropped_count(0), 1);
    }
}
