use crate::collections::{HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use std::marker::PhantomData;

/// Double-ended indexed heap over pool-allocated nodes, laid out as a
/// min-max heap: even levels order toward the front of the policy's
/// `before`, odd levels toward the back. `pop_min` returns the element
/// that `before` places first, `pop_max` the one it places last; both are
/// O(log n), `reinit` is O(n).
#[derive(Debug)]
pub struct MinMaxHeap<O, N> {
    items: Vec<NodeId>,
    _ops: PhantomData<fn() -> (O, N)>,
}

impl<O: HeapOps<N>, N> MinMaxHeap<O, N> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _ops: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.items
    }

    pub fn peek_min(&self) -> Option<NodeId> {
        self.items.first().copied()
    }

    pub fn peek_max(&self, pool: &NodePool<N>) -> Option<NodeId> {
        match self.items.len() {
            0 => None,
            1 => Some(self.items[0]),
            2 => Some(self.items[1]),
            _ => Some(self.items[self.max_position(pool)]),
        }
    }

    pub fn push(&mut self, pool: &mut NodePool<N>, id: NodeId) {
        debug_assert!(
            O::index(pool.get(id)) < 0,
            "pushing a node that is already a member"
        );
        self.items.push(id);
        let at = self.items.len() - 1;
        O::set_index(pool.get_mut(id), at as HeapIndex);
        self.bubble_up(pool, at);
    }

    pub fn pop_min(&mut self, pool: &mut NodePool<N>) -> Option<NodeId> {
        self.remove_at(pool, 0)
    }

    pub fn pop_max(&mut self, pool: &mut NodePool<N>) -> Option<NodeId> {
        match self.items.len() {
            0 => None,
            1 => self.remove_at(pool, 0),
            2 => self.remove_at(pool, 1),
            _ => {
                let at = self.max_position(pool);
                self.remove_at(pool, at)
            }
        }
    }

    /// Restore ordering around `index` after the node's key changed.
    pub fn update(&mut self, pool: &mut NodePool<N>, index: HeapIndex) {
        assert!(
            index >= 0 && (index as usize) < self.items.len(),
            "updating an invalid heap index: {index}"
        );
        let at = index as usize;
        let moved = self.bubble_up(pool, at);
        if moved == at {
            self.trickle_down(pool, at);
        }
    }

    /// Push if the node is not a member, update its position otherwise.
    pub fn push_or_update(&mut self, pool: &mut NodePool<N>, id: NodeId) {
        let index = O::index(pool.get(id));
        if index < 0 {
            self.push(pool, id);
        } else {
            self.update(pool, index);
        }
    }

    pub fn clear(&mut self, pool: &mut NodePool<N>) {
        for &id in &self.items {
            O::set_index(pool.get_mut(id), NO_INDEX);
        }
        self.items.clear();
    }

    /// Re-establish the min-max property in O(n) after members' keys
    /// changed behind the heap's back.
    pub fn reinit(&mut self, pool: &mut NodePool<N>) {
        for (at, &id) in self.items.iter().enumerate() {
            O::set_index(pool.get_mut(id), at as HeapIndex);
        }
        for at in (0..self.items.len() / 2).rev() {
            self.trickle_down(pool, at);
        }
    }

    pub fn kind(&self) -> &'static str {
        "min-max heap"
    }

    fn max_position(&self, pool: &NodePool<N>) -> usize {
        debug_assert!(self.items.len() >= 3);
        if self.before(pool, 2, 1) {
            1
        } else {
            2
        }
    }

    fn before(&self, pool: &NodePool<N>, a: usize, b: usize) -> bool {
        O::before(pool.get(self.items[a]), pool.get(self.items[b]))
    }

    /// `before` on min levels, its reverse on max levels.
    fn directed(&self, pool: &NodePool<N>, a: usize, b: usize, min_side: bool) -> bool {
        if min_side {
            self.before(pool, a, b)
        } else {
            self.before(pool, b, a)
        }
    }

    fn swap(&mut self, pool: &mut NodePool<N>, a: usize, b: usize) {
        self.items.swap(a, b);
        O::set_index(pool.get_mut(self.items[a]), a as HeapIndex);
        O::set_index(pool.get_mut(self.items[b]), b as HeapIndex);
    }

    fn is_min_level(at: usize) -> bool {
        (at + 1).ilog2() % 2 == 0
    }

    fn remove_at(&mut self, pool: &mut NodePool<N>, at: usize) -> Option<NodeId> {
        if at >= self.items.len() {
            return None;
        }
        let removed = self.items[at];
        O::set_index(pool.get_mut(removed), NO_INDEX);
        let last = self.items.pop().expect("non-empty heap");
        if at < self.items.len() {
            self.items[at] = last;
            O::set_index(pool.get_mut(last), at as HeapIndex);
            let moved = self.bubble_up(pool, at);
            if moved == at {
                self.trickle_down(pool, at);
            }
        }
        Some(removed)
    }

    fn bubble_up(&mut self, pool: &mut NodePool<N>, at: usize) -> usize {
        if at == 0 {
            return 0;
        }
        let parent = (at - 1) / 2;
        let min_side = Self::is_min_level(at);
        if self.directed(pool, parent, at, min_side) {
            // Belongs on the other side of the ordering than its parent.
            self.swap(pool, at, parent);
            self.bubble_up_grand(pool, parent, !min_side)
        } else {
            self.bubble_up_grand(pool, at, min_side)
        }
    }

    fn bubble_up_grand(&mut self, pool: &mut NodePool<N>, mut at: usize, min_side: bool) -> usize {
        while at >= 3 {
            let grandparent = ((at - 1) / 2 - 1) / 2;
            if self.directed(pool, at, grandparent, min_side) {
                self.swap(pool, at, grandparent);
                at = grandparent;
            } else {
                break;
            }
        }
        at
    }

    fn trickle_down(&mut self, pool: &mut NodePool<N>, mut at: usize) {
        let min_side = Self::is_min_level(at);
        loop {
            let len = self.items.len();
            let left = 2 * at + 1;
            if left >= len {
                return;
            }
            // Extreme among children and grandchildren under this side's
            // ordering.
            let mut extreme = left;
            let mut is_grandchild = false;
            let candidates = [
                (left + 1, false),
                (2 * left + 1, true),
                (2 * left + 2, true),
                (2 * (left + 1) + 1, true),
                (2 * (left + 1) + 2, true),
            ];
            for (candidate, grandchild) in candidates {
                if candidate < len && self.directed(pool, candidate, extreme, min_side) {
                    extreme = candidate;
                    is_grandchild = grandchild;
                }
            }
            if is_grandchild {
                if self.directed(pool, extreme, at, min_side) {
                    self.swap(pool, extreme, at);
                    let parent = (extreme - 1) / 2;
                    if self.directed(pool, parent, extreme, min_side) {
                        self.swap(pool, extreme, parent);
                    }
                    at = extreme;
                    continue;
                }
                return;
            }
            if self.directed(pool, extreme, at, min_side) {
                self.swap(pool, extreme, at);
            }
            return;
        }
    }
}

impl<O: HeapOps<N>, N> Default for MinMaxHeap<O, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

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

    fn filled(keys: &[i64]) -> (NodePool<Item>, MinMaxHeap<KeyOrder, Item>) {
        let mut pool = NodePool::new();
        let mut heap = MinMaxHeap::new();
        for &key in keys {
            let id = pool.construct(Item {
                key,
                index: NO_INDEX,
            });
            heap.push(&mut pool, id);
        }
        (pool, heap)
    }

    fn check_indices(heap: &MinMaxHeap<KeyOrder, Item>, pool: &NodePool<Item>) {
        for (at, &id) in heap.ids().iter().enumerate() {
            assert_eq!(KeyOrder::index(pool.get(id)), at as HeapIndex);
        }
    }

    #[test]
    fn pop_min_is_sorted_ascending() {
        let mut rng = SmallRng::seed_from_u64(7);
        let keys: Vec<i64> = (0..500).map(|_| rng.gen_range(0..100)).collect();
        let (mut pool, mut heap) = filled(&keys);
        let mut out = Vec::new();
        while let Some(id) = heap.pop_min(&mut pool) {
            out.push(pool.get(id).key);
            check_indices(&heap, &pool);
        }
        let mut expected = keys;
        expected.sort_unstable();
        assert_eq!(out, expected);
    }

    #[test]
    fn pop_max_is_sorted_descending() {
        let mut rng = SmallRng::seed_from_u64(13);
        let keys: Vec<i64> = (0..500).map(|_| rng.gen_range(0..100)).collect();
        let (mut pool, mut heap) = filled(&keys);
        let mut out = Vec::new();
        while let Some(id) = heap.pop_max(&mut pool) {
            out.push(pool.get(id).key);
            check_indices(&heap, &pool);
        }
        let mut expected = keys;
        expected.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(out, expected);
    }

    #[test]
    fn interleaved_pops_match_a_sorted_model() {
        let mut rng = SmallRng::seed_from_u64(42);
        let keys: Vec<i64> = (0..1000).map(|_| rng.gen_range(0..250)).collect();
        let (mut pool, mut heap) = filled(&keys);

        let mut model = keys;
        model.sort_unstable();
        let mut lo = 0usize;
        let mut hi = model.len();
        while lo < hi {
            if (hi - lo) % 2 == 0 {
                let id = heap.pop_min(&mut pool).expect("heap ran dry early");
                assert_eq!(pool.get(id).key, model[lo]);
                lo += 1;
            } else {
                let id = heap.pop_max(&mut pool).expect("heap ran dry early");
                assert_eq!(pool.get(id).key, model[hi - 1]);
                hi -= 1;
            }
            assert_eq!(heap.len(), hi - lo);
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn peeks_agree_with_pops() {
        let (mut pool, mut heap) = filled(&[4, 9, 1, 6, 2]);
        let min = heap.peek_min().unwrap();
        assert_eq!(pool.get(min).key, 1);
        let max = heap.peek_max(&pool).unwrap();
        assert_eq!(pool.get(max).key, 9);
        assert_eq!(heap.pop_min(&mut pool), Some(min));
        assert_eq!(heap.pop_max(&mut pool), Some(max));
    }

    #[test]
    fn update_moves_member_to_both_ends() {
        let (mut pool, mut heap) = filled(&[10, 20, 30, 40, 50]);
        let target = heap.ids()[3];

        pool.get_mut(target).key = 0;
        let index = KeyOrder::index(pool.get(target));
        heap.update(&mut pool, index);
        check_indices(&heap, &pool);
        assert_eq!(heap.peek_min(), Some(target));

        pool.get_mut(target).key = 99;
        let index = KeyOrder::index(pool.get(target));
        heap.update(&mut pool, index);
        check_indices(&heap, &pool);
        assert_eq!(heap.peek_max(&pool), Some(target));
    }

    #[test]
    fn reinit_after_bulk_key_change() {
        let mut rng = SmallRng::seed_from_u64(3);
        let keys: Vec<i64> = (0..200).map(|_| rng.gen_range(0..50)).collect();
        let (mut pool, mut heap) = filled(&keys);

        let mut expected = Vec::new();
        for &id in heap.ids() {
            let flipped = -pool.get(id).key;
            pool.get_mut(id).key = flipped;
            expected.push(flipped);
        }
        heap.reinit(&mut pool);
        check_indices(&heap, &pool);

        expected.sort_unstable();
        let mut out = Vec::new();
        while let Some(id) = heap.pop_min(&mut pool) {
            out.push(pool.get(id).key);
        }
        assert_eq!(out, expected);
    }
}
