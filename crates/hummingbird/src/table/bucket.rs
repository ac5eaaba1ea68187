//! Fixed-capacity bucket of inline slots.
//!
//! Slots are packed from index 0 and the occupied prefix is tracked by
//! `len`, so lookups never depend on finding an empty slot.

/// Number of slots per bucket
pub const SLOTS_PER_BUCKET: usize = 14;

/// A single key/value cell
#[derive(Debug, Clone)]
pub struct Slot<K, V> {
    pub key: K,
    pub value: V,
}

impl<K: PartialEq, V> Slot<K, V> {
    #[inline]
    pub fn matches(&self, key: &K) -> bool {
        self.key == *key
    }
}

/// What a successful `set` did to the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Key was new and took a free slot
    Inserted,
    /// Key already existed and its value was overwritten
    Updated,
}

/// Inline array of slots with a tracked occupied count
pub struct Bucket<K, V> {
    len: u8,
    slots: [Option<Slot<K, V>>; SLOTS_PER_BUCKET],
}

impl<K, V> Bucket<K, V> {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self {
            len: 0,
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == SLOTS_PER_BUCKET
    }

    #[inline]
    fn occupied(&self) -> impl Iterator<Item = &Slot<K, V>> {
        self.slots[..self.len()].iter().flatten()
    }
}

impl<K: PartialEq, V> Bucket<K, V> {
    /// Overwrite a matching key or fill the first free slot.
    ///
    /// Hands the pair back when the bucket is full and holds no match, so the
    /// caller can try the next bucket in its probe order.
    pub fn set(&mut self, key: K, value: V) -> Result<SetOutcome, (K, V)> {
        let len = self.len();
        for slot in self.slots[..len].iter_mut().flatten() {
            if slot.matches(&key) {
                slot.value = value;
                return Ok(SetOutcome::Updated);
            }
        }

        if len < SLOTS_PER_BUCKET {
            self.slots[len] = Some(Slot { key, value });
            self.len += 1;
            return Ok(SetOutcome::Inserted);
        }

        Err((key, value))
    }

    /// Find the value stored for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.occupied()
            .find(|slot| slot.matches(key))
            .map(|slot| &slot.value)
    }
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
