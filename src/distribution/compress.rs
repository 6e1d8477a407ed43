//! Bucket compression: keeps a distribution within its accuracy bounds.
//!
//! Three passes over value-sorted buckets:
//!
//! 1. **Coalesce**: adjacent buckets whose values differ by less than
//!    `epsilon` become one bucket.
//! 2. **Fold light buckets**: a bucket with mass below `epsilon` is folded
//!    into whichever neighbour is closer in value (the lower one on ties).
//! 3. **Granularity**: while more than `granularity` buckets remain, the
//!    adjacent pair with the smallest value gap is merged.
//!
//! A merge sums the two masses and places the survivor at their
//! probability-weighted mean value. The merged value lies between the two
//! originals, so the list stays sorted without re-sorting.
//!
//! Passes 2 and 3 work on a doubly linked list over a `Vec` so each merge is
//! O(1); pass 3 picks the closest pair from a min-heap of gaps, skipping
//! entries made stale by earlier merges (checked via per-node versions).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::AccuracyConfig;

/// Compress value-sorted, positive-mass buckets.
pub(crate) fn compress(sorted: Vec<(f64, f64)>, accuracy: &AccuracyConfig) -> Vec<(f64, f64)> {
    let coalesced = coalesce(sorted, accuracy.epsilon);
    if coalesced.len() <= 1 {
        return coalesced;
    }

    let needs_fold = coalesced.iter().any(|&(_, p)| p < accuracy.epsilon);
    if !needs_fold && coalesced.len() <= accuracy.granularity {
        return coalesced;
    }

    let mut list = BucketList::new(coalesced);
    if needs_fold {
        list.fold_light_buckets(accuracy.epsilon);
    }
    list.merge_to_granularity(accuracy.granularity);
    list.into_buckets()
}

/// Merge two weighted buckets into one at their weighted mean.
#[inline]
fn merge_pair((va, pa): (f64, f64), (vb, pb): (f64, f64)) -> (f64, f64) {
    let mass = pa + pb;
    let value = (va * pa + vb * pb) / mass;
    // Rounding can push the mean a hair outside [va, vb]; clamp keeps ordering.
    (value.clamp(va.min(vb), va.max(vb)), mass)
}

fn coalesce(sorted: Vec<(f64, f64)>, epsilon: f64) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for bucket in sorted {
        match out.last_mut() {
            Some(last) if bucket.0 - last.0 < epsilon => *last = merge_pair(*last, bucket),
            _ => out.push(bucket),
        }
    }
    out
}

struct Node {
    value: f64,
    mass: f64,
    prev: Option<usize>,
    next: Option<usize>,
    alive: bool,
    version: u32,
}

struct BucketList {
    nodes: Vec<Node>,
    head: Option<usize>,
    alive: usize,
}

/// Candidate merge of `left` with its successor `right`, ordered so the
/// smallest gap pops first from a max-heap.
struct Gap {
    gap: f64,
    left: usize,
    left_version: u32,
    right: usize,
    right_version: u32,
}

impl PartialEq for Gap {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Gap {}

impl PartialOrd for Gap {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Gap {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smallest gap first, then lowest position for determinism.
        other
            .gap
            .total_cmp(&self.gap)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl BucketList {
    fn new(buckets: Vec<(f64, f64)>) -> Self {
        let n = buckets.len();
        let nodes = buckets
            .into_iter()
            .enumerate()
            .map(|(i, (value, mass))| Node {
                value,
                mass,
                prev: i.checked_sub(1),
                next: if i + 1 < n { Some(i + 1) } else { None },
                alive: true,
                version: 0,
            })
            .collect();
        Self {
            nodes,
            head: if n > 0 { Some(0) } else { None },
            alive: n,
        }
    }

    /// Merge `absorbed` into its adjacent node `survivor` and unlink it.
    fn absorb(&mut self, survivor: usize, absorbed: usize) {
        let (value, mass) = merge_pair(
            (self.nodes[survivor].value, self.nodes[survivor].mass),
            (self.nodes[absorbed].value, self.nodes[absorbed].mass),
        );
        let s = &mut self.nodes[survivor];
        s.value = value;
        s.mass = mass;
        s.version = s.version.wrapping_add(1);

        let (prev, next) = (self.nodes[absorbed].prev, self.nodes[absorbed].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.nodes[absorbed].alive = false;
        self.alive -= 1;
    }

    /// Closer neighbour of `idx` by value gap; the lower one wins ties.
    fn nearest_neighbour(&self, idx: usize) -> Option<usize> {
        let node = &self.nodes[idx];
        match (node.prev, node.next) {
            (Some(p), Some(n)) => {
                let down = node.value - self.nodes[p].value;
                let up = self.nodes[n].value - node.value;
                Some(if up < down { n } else { p })
            }
            (Some(p), None) => Some(p),
            (None, Some(n)) => Some(n),
            (None, None) => None,
        }
    }

    fn fold_light_buckets(&mut self, epsilon: f64) {
        let mut pending: Vec<usize> = (0..self.nodes.len())
            .rev()
            .filter(|&i| self.nodes[i].mass < epsilon)
            .collect();

        while let Some(idx) = pending.pop() {
            if self.alive <= 1 {
                break;
            }
            let node = &self.nodes[idx];
            if !node.alive || node.mass >= epsilon {
                continue;
            }
            let Some(target) = self.nearest_neighbour(idx) else {
                break;
            };
            self.absorb(target, idx);
            if self.nodes[target].mass < epsilon {
                pending.push(target);
            }
        }
    }

    fn push_gap(&self, heap: &mut BinaryHeap<Gap>, left: usize) {
        let Some(right) = self.nodes[left].next else {
            return;
        };
        heap.push(Gap {
            gap: self.nodes[right].value - self.nodes[left].value,
            left,
            left_version: self.nodes[left].version,
            right,
            right_version: self.nodes[right].version,
        });
    }

    fn merge_to_granularity(&mut self, granularity: usize) {
        if self.alive <= granularity {
            return;
        }

        let mut heap = BinaryHeap::with_capacity(self.alive);
        let mut cursor = self.head;
        while let Some(i) = cursor {
            self.push_gap(&mut heap, i);
            cursor = self.nodes[i].next;
        }

        while self.alive > granularity {
            let Some(g) = heap.pop() else {
                break;
            };
            let (l, r) = (&self.nodes[g.left], &self.nodes[g.right]);
            let stale = !l.alive
                || !r.alive
                || l.version != g.left_version
                || r.version != g.right_version
                || l.next != Some(g.right);
            if stale {
                continue;
            }

            self.absorb(g.left, g.right);
            if let Some(p) = self.nodes[g.left].prev {
                self.push_gap(&mut heap, p);
            }
            self.push_gap(&mut heap, g.left);
        }
    }

    fn into_buckets(self) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.alive);
        let mut cursor = self.head;
        while let Some(i) = cursor {
            let node = &self.nodes[i];
            out.push((node.value, node.mass));
            cursor = node.next;
        }
        out
    }
}
