use std::collections::HashSet;
use std::hash::Hash;

/// Set of every key observed during the run. Entries are never evicted, so a
/// key is reported as new at most once.
pub struct SeenSet<K> {
    seen: HashSet<K>,
}

impl<K> SeenSet<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Returns `true` when `key` had not been seen before.
    pub fn insert(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<K> Default for SeenSet<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}
