//! Timestamp-ordered dispatch queue.
//!
//! A min-heap keyed on the remote-observed timestamp (unix seconds).  Ties
//! break arbitrarily; event identity is the raw payload, never the
//! priority.  The queue is unbounded — receiver latency shows up as queue
//! depth, not as drops.

use crate::event::ActivityEvent;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct QueuedEvent {
    priority: i64,
    event: ActivityEvent,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest first.
        other.priority.cmp(&self.priority)
    }
}

/// Single-consumer priority queue over activity events.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ActivityEvent) {
        self.heap.push(QueuedEvent {
            priority: event.priority(),
            event,
        });
    }

    /// Non-blocking pop of the earliest event.
    pub fn pop(&mut self) -> Option<ActivityEvent> {
        self.heap.pop().map(|q| q.event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
