//! Segment: 56 regular buckets plus 4 stash buckets.
//!
//! Every key has one home bucket (`hash % 56`). Inserts and lookups walk the
//! same probe order: home, its right-hand neighbor (no wraparound past the
//! last regular bucket), then the stash buckets in index order.

use super::bucket::{Bucket, SetOutcome, SLOTS_PER_BUCKET};

/// Number of regular buckets
pub const REGULAR_BUCKETS: usize = 56;

/// Number of stash buckets (overflow)
pub const STASH_BUCKETS: usize = 4;

/// Total buckets per segment
pub const TOTAL_BUCKETS: usize = REGULAR_BUCKETS + STASH_BUCKETS;

/// Total segment capacity
pub const SEGMENT_CAPACITY: usize = TOTAL_BUCKETS * SLOTS_PER_BUCKET;

/// Home bucket index for a hash
#[inline]
pub fn home_bucket(hash: u64) -> usize {
    (hash % REGULAR_BUCKETS as u64) as usize
}

/// Bucket indices visited for a hash, in order
#[inline]
pub fn probe_order(hash: u64) -> impl Iterator<Item = usize> {
    let home = home_bucket(hash);
    let neighbor = home + 1;
    std::iter::once(home)
        .chain((neighbor < REGULAR_BUCKETS).then_some(neighbor))
        .chain(REGULAR_BUCKETS..TOTAL_BUCKETS)
}

pub struct Segment<K, V> {
    buckets: Box<[Bucket<K, V>]>,
    /// Occupied slots across all buckets
    len: usize,
}

impl<K, V> Segment<K, V> {
    pub fn new() -> Self {
        Self {
            buckets: (0..TOTAL_BUCKETS).map(|_| Bucket::new()).collect(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items that overflowed into the stash buckets
    pub fn stash_len(&self) -> usize {
        self.buckets[REGULAR_BUCKETS..].iter().map(Bucket::len).sum()
    }

    /// Occupied slots of the bucket at `idx`
    #[inline]
    pub fn bucket_len(&self, idx: usize) -> usize {
        self.buckets[idx].len()
    }
}

impl<K: PartialEq, V> Segment<K, V> {
    /// Place `key` in the first bucket of its probe order that accepts it.
    ///
    /// Returns the pair when every candidate bucket is full.
    pub fn set(&mut self, hash: u64, key: K, value: V) -> Result<SetOutcome, (K, V)> {
        let mut pair = (key, value);
        for idx in probe_order(hash) {
            match self.buckets[idx].set(pair.0, pair.1) {
                Ok(outcome) => {
                    if outcome == SetOutcome::Inserted {
                        self.len += 1;
                    }
                    return Ok(outcome);
                }
                Err(rejected) => pair = rejected,
            }
        }
        Err(pair)
    }

    pub fn get(&self, hash: u64, key: &K) -> Option<&V> {
        probe_order(hash).find_map(|idx| self.buckets[idx].get(key))
    }

    /// Bucket index currently holding `key`
    pub fn locate(&self, hash: u64, key: &K) -> Option<usize> {
        probe_order(hash).find(|&idx| self.buckets[idx].get(key).is_some())
    }
}

impl<K, V> Default for Segment<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
