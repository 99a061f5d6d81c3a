use crate::collections::NodeId;
use crate::search::metrics;
use std::collections::HashMap;
use std::hash::Hash;
use std::io;

/// Duplicate-detection table: at most one node per distinct packed state.
/// The domain supplies hashing and equality through the bounds on its
/// `Packed` type.
#[derive(Debug)]
pub struct ClosedList<K> {
    table: HashMap<K, NodeId>,
    peak: usize,
}

impl<K: Eq + Hash> ClosedList<K> {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            peak: 0,
        }
    }

    /// Insert, returning the previous occupant for this state if any.
    pub fn insert(&mut self, key: K, id: NodeId) -> Option<NodeId> {
        let displaced = self.table.insert(key, id);
        self.peak = self.peak.max(self.table.len());
        displaced
    }

    pub fn find(&self, key: &K) -> Option<NodeId> {
        self.table.get(key).copied()
    }

    pub fn remove(&mut self, key: &K) -> Option<NodeId> {
        self.table.remove(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        metrics::pair(out, "closed fill", &self.table.len())?;
        metrics::pair(out, "closed peak fill", &self.peak)?;
        metrics::pair(out, "closed capacity", &self.table.capacity())
    }
}

impl<K: Eq + Hash> Default for ClosedList<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::NodePool;

    #[test]
    fn one_node_per_state() {
        let mut pool = NodePool::new();
        let a = pool.construct(());
        let b = pool.construct(());
        let mut closed = ClosedList::new();
        assert_eq!(closed.insert("s", a), None);
        assert_eq!(closed.find(&"s"), Some(a));
        // A second insert for the same state displaces the first.
        assert_eq!(closed.insert("s", b), Some(a));
        assert_eq!(closed.find(&"s"), Some(b));
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut pool = NodePool::new();
        let a = pool.construct(());
        let mut closed = ClosedList::new();
        closed.insert(1u64, a);
        assert_eq!(closed.remove(&1), Some(a));
        assert_eq!(closed.find(&1), None);
        closed.insert(2u64, a);
        closed.clear();
        assert!(closed.is_empty());
    }
}
