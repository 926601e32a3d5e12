//! Activation records and the event queue.
//!
//! The queue is the sole link between the scheduler and its processes: an
//! [`EventRecord`] names the process to resume, the virtual time to resume
//! it at, and the sequence number assigned at insertion. Records are
//! min-ordered by `(time, seq)`, so same-time records fire strictly in
//! insertion order.
//!
//! Cancellation is lazy: the scheduler remembers the live sequence number
//! per process and skips stale heap entries on pop, which makes removal and
//! re-activation O(1) at the queue level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::sim::process::ProcessId;
use crate::time::VirtualTime;

/// A scheduled activation: resume process `pid` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// The virtual time at which the process resumes.
    pub time: VirtualTime,
    /// Insertion sequence number; ties in `time` resolve FIFO by `seq`.
    pub seq: u64,
    /// The process this record belongs to.
    pub pid: ProcessId,
}

impl Ord for EventRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        // Inverted so the std max-heap pops the earliest record first.
        // Sequence numbers are unique; the pid tiebreak only keeps the
        // ordering consistent with equality.
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| self.pid.cmp(&other.pid))
            .reverse()
    }
}

impl PartialOrd for EventRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-ordered set of activation records.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<EventRecord>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
        }
    }

    /// Inserts a record. Re-inserting a popped record with its original
    /// sequence number preserves its place among same-time records.
    pub fn insert(&mut self, record: EventRecord) {
        self.heap.push(record);
    }

    /// Removes and returns the earliest record, FIFO among equal times.
    ///
    /// Stale records (cancelled or superseded) are the caller's concern;
    /// the scheduler validates each popped record against its registry.
    pub fn pop(&mut self) -> Option<EventRecord> {
        self.heap.pop()
    }

    /// The earliest record without removing it.
    pub fn peek(&self) -> Option<&EventRecord> {
        self.heap.peek()
    }

    /// Number of records, including stale ones awaiting lazy removal.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when no records remain.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
