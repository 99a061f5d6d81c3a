use crate::collections::{BinHeap, HeapOps, NodePool};
use std::collections::VecDeque;

/// Ring of per-depth open lists for the layered bead searches. The front
/// is the shallowest active depth, the back the deepest; retired and
/// truncated lists are kept as spares and handed back by [`LayerRing::grow`]
/// so per-sweep layering never reallocates.
#[derive(Debug)]
pub struct LayerRing<O, N> {
    active: VecDeque<BinHeap<O, N>>,
    spare: Vec<BinHeap<O, N>>,
    pub created: usize,
    pub reused: usize,
    pub removed: usize,
}

impl<O: HeapOps<N>, N> LayerRing<O, N> {
    pub fn new() -> Self {
        Self {
            active: VecDeque::new(),
            spare: Vec::new(),
            created: 0,
            reused: 0,
            removed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn get_mut(&mut self, depth: usize) -> &mut BinHeap<O, N> {
        &mut self.active[depth]
    }

    /// Append a list for the next deeper layer, reusing a spare if one
    /// exists.
    pub fn grow(&mut self) {
        match self.spare.pop() {
            Some(list) => {
                debug_assert!(list.is_empty());
                self.reused += 1;
                self.active.push_back(list);
            }
            None => {
                self.created += 1;
                self.active.push_back(BinHeap::new());
            }
        }
    }

    /// Retire the shallowest (empty) layer into the spare pool.
    pub fn retire_shallowest(&mut self) {
        if let Some(list) = self.active.pop_front() {
            debug_assert!(list.is_empty());
            self.removed += 1;
            self.spare.push(list);
        }
    }

    /// Drop every layer deeper than `depth`, draining their nodes back
    /// into the pool's free list.
    pub fn truncate_after(&mut self, depth: usize, pool: &mut NodePool<N>) {
        while self.active.len() > depth + 1 {
            let mut list = self.active.pop_back().expect("non-empty ring");
            while let Some(id) = list.pop(pool) {
                pool.destruct(id);
            }
            self.spare.push(list);
        }
    }

    pub fn clear(&mut self, pool: &mut NodePool<N>) {
        while let Some(mut list) = self.active.pop_back() {
            list.clear(pool);
            self.spare.push(list);
        }
    }
}

impl<O: HeapOps<N>, N> Default for LayerRing<O, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{HeapIndex, NO_INDEX};

    #[derive(Debug)]
    struct Item {
        key: i64,
        index: HeapIndex,
    }

    enum KeyOrder {}

    impl HeapOps<Item> for KeyOrder {
        fn before(a: &Item, b: &Item) -> bool {
            a.key < b.key
        }
        fn index(node: &Item) -> HeapIndex {
            node.index
        }
        fn set_index(node: &mut Item, index: HeapIndex) {
            node.index = index;
        }
    }

    #[test]
    fn grow_reuses_retired_layers() {
        let mut ring: LayerRing<KeyOrder, Item> = LayerRing::new();
        ring.grow();
        ring.grow();
        assert_eq!(ring.created, 2);
        ring.retire_shallowest();
        assert_eq!(ring.removed, 1);
        ring.grow();
        assert_eq!(ring.reused, 1);
        assert_eq!(ring.created, 2);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn truncate_drains_deep_layers() {
        let mut pool = NodePool::new();
        let mut ring: LayerRing<KeyOrder, Item> = LayerRing::new();
        for _ in 0..3 {
            ring.grow();
        }
        for depth in 0..3 {
            let id = pool.construct(Item {
                key: depth as i64,
                index: NO_INDEX,
            });
            ring.get_mut(depth).push(&mut pool, id);
        }
        ring.truncate_after(0, &mut pool);
        assert_eq!(ring.len(), 1);
        // The two deeper nodes were reclaimed.
        assert_eq!(pool.len(), 1);
        ring.grow();
        assert_eq!(ring.reused, 2);
    }
}
