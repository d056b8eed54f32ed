use super::HandleId;

use std::cmp::Ordering;
use std::time::Instant;

/// A scheduled expiry in the reactor's timer heap.
///
/// Entries are never removed eagerly: a closed or released timer leaves its
/// entry behind and it is skipped when it reaches the top of the heap.
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,

    /// Insertion order; breaks ties between equal deadlines.
    pub(crate) seq: u64,

    pub(crate) handle: HandleId,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap<TimerEntry>` pops the earliest deadline
    /// first, and among equal deadlines the earliest started timer.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BinaryHeap;
    use std::time::Duration;

    #[test]
    fn heap_pops_earliest_deadline_then_start_order() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();

        heap.push(TimerEntry {
            deadline: base + Duration::from_millis(20),
            seq: 1,
            handle: 1,
        });
        heap.push(TimerEntry {
            deadline: base + Duration::from_millis(5),
            seq: 2,
            handle: 2,
        });
        heap.push(TimerEntry {
            deadline: base + Duration::from_millis(5),
            seq: 3,
            handle: 3,
        });

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|e| e.handle)).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }
}
