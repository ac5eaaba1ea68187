//! Single-threaded dash table engine
//!
//! A directory of fixed-size segments addressed by a seeded 64-bit hash.
//! The directory is sized once from a capacity hint and never grows; a key
//! that finds no room in its segment is reported as [`KvError::SegmentFull`].
//!
//! The table takes `&mut self` for writes and holds no locks. Concurrent
//! access goes through [`ShardedStore`](crate::store::ShardedStore), which
//! confines each table to one worker thread.

pub mod bucket;
pub mod segment;

use crate::error::{KvError, KvResult};
use crate::types::DashKey;
use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};
use tracing::debug;

pub use bucket::{SetOutcome, SLOTS_PER_BUCKET};
pub use segment::{Segment, REGULAR_BUCKETS, SEGMENT_CAPACITY, STASH_BUCKETS, TOTAL_BUCKETS};

/// Segments allocated per `SEGMENT_CAPACITY` items of the capacity hint
pub const OVERPROVISION_FACTOR: usize = 8;

/// Smallest directory ever allocated
pub const MIN_SEGMENTS: usize = 12;

/// Directory length for a capacity hint.
///
/// The result is coprime with `REGULAR_BUCKETS`: segment and home bucket are
/// both taken from the same hash, and a shared factor would pin every key of
/// a segment to a fraction of its home buckets.
pub fn directory_len(max_item_hint: usize) -> usize {
    let mut len = (max_item_hint / SEGMENT_CAPACITY)
        .saturating_mul(OVERPROVISION_FACTOR)
        .max(MIN_SEGMENTS);
    while gcd(len, REGULAR_BUCKETS) != 1 {
        len += 1;
    }
    len
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Occupancy figures for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    /// Distinct keys stored
    pub items: usize,
    /// Directory length
    pub segments: usize,
    /// Total slots across all segments
    pub capacity: usize,
    /// Keys that overflowed into stash buckets
    pub stash_items: usize,
}

pub struct DashTable<K, V> {
    hash_builder: RandomState,
    segments: Vec<Segment<K, V>>,
    len: usize,
}

impl<K, V> DashTable<K, V> {
    /// Create a table sized for roughly `max_item_hint` keys.
    ///
    /// The hint is not a ceiling, but exceeding it by a wide margin makes
    /// `SegmentFull` likely.
    pub fn new(max_item_hint: usize) -> Self {
        Self::with_segments(directory_len(max_item_hint))
    }

    /// Create a table with an explicit directory length (at least 1)
    pub fn with_segments(segment_count: usize) -> Self {
        let segment_count = segment_count.max(1);
        let segments = (0..segment_count).map(|_| Segment::new()).collect();
        debug!(
            "Allocated dash table: {} segments, {} slots",
            segment_count,
            segment_count * SEGMENT_CAPACITY
        );

        Self {
            hash_builder: RandomState::new(),
            segments,
            len: 0,
        }
    }

    /// Number of distinct keys stored
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total slots, an upper bound that is never reached in practice
    #[inline]
    pub fn capacity(&self) -> usize {
        self.segments.len() * SEGMENT_CAPACITY
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            items: self.len,
            segments: self.segments.len(),
            capacity: self.capacity(),
            stash_items: self.segments.iter().map(Segment::stash_len).sum(),
        }
    }

    #[inline]
    fn segment_index(&self, hash: u64) -> usize {
        (hash % self.segments.len() as u64) as usize
    }
}

impl<K: DashKey, V> DashTable<K, V> {
    /// Seeded hash of `key`, stable for the lifetime of this table
    pub fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.write_key(&mut hasher);
        hasher.finish()
    }

    /// Insert or overwrite `key`
    pub fn set(&mut self, key: K, value: V) -> KvResult<SetOutcome> {
        let hash = self.hash_key(&key);
        let segment = self.segment_index(hash);

        match self.segments[segment].set(hash, key, value) {
            Ok(outcome) => {
                if outcome == SetOutcome::Inserted {
                    self.len += 1;
                }
                Ok(outcome)
            }
            // TODO: split the segment on an extra hash bit instead of failing
            Err(_) => Err(KvError::SegmentFull { segment, hash }),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_key(key);
        self.segments[self.segment_index(hash)].get(hash, key)
    }

    /// `(found, value)`, with `V::default()` for a missing key
    pub fn get_or_default(&self, key: &K) -> (bool, V)
    where
        V: Clone + Default,
    {
        match self.get(key) {
            Some(value) => (true, value.clone()),
            None => (false, V::default()),
        }
    }
}
