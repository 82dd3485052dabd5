//! Min-priority queue of candidate merges
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate merge of the components in slots `lo < hi`.
///
/// Equal distances break on the lowest combined index `lo + hi`, then on
/// the lowest `lo`.
///
/// Candidates carry the slot generations they were computed against so that
/// entries made stale by an earlier merge can be discarded when popped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub(crate) distance: f64,
    pub(crate) lo: usize,
    pub(crate) hi: usize,
    pub(crate) gen_lo: u32,
    pub(crate) gen_hi: u32,
}

impl Candidate {
    fn key(&self) -> (f64, usize, usize) {
        (self.distance, self.lo + self.hi, self.lo)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so that `BinaryHeap` pops the smallest distance first, then
    // the lowest index sum.
    fn cmp(&self, other: &Self) -> Ordering {
        let (da, sa, la) = self.key();
        let (db, sb, lb) = other.key();
        db.total_cmp(&da)
            .then_with(|| sb.cmp(&sa))
            .then_with(|| lb.cmp(&la))
    }
}

/// Candidate merges ordered by `(distance, lo + hi, lo)`, smallest first
#[derive(Debug, Default)]
pub(crate) struct MergeQueue {
    heap: BinaryHeap<Candidate>,
}

impl MergeQueue {
    pub(crate) fn new() -> Self {
        MergeQueue::default()
    }

    pub(crate) fn push(&mut self, candidate: Candidate) {
        debug_assert!(candidate.lo < candidate.hi);
        self.heap.push(candidate);
    }

    /// Pop the best candidate for which `is_live` holds, discarding stale
    /// entries along the way.
    pub(crate) fn pop_live<F>(&mut self, is_live: F) -> Option<Candidate>
    where
        F: Fn(&Candidate) -> bool,
    {
        while let Some(candidate) = self.heap.pop() {
            if is_live(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}
