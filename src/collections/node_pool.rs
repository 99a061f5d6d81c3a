use segvec::{Linear, SegVec};

/// Stable handle to a node record owned by a [`NodePool`]. Ids stay valid
/// until the slot is destructed or the pool is reset; every open list and
/// the closed table refer to nodes through these rather than owning them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena allocator for the per-search node records. Slots freed with
/// [`NodePool::destruct`] go onto a free list and are handed out again by
/// the next [`NodePool::construct`]; nothing is returned to the global
/// allocator until [`NodePool::reset`].
#[derive(Debug)]
pub struct NodePool<N> {
    slots: SegVec<Option<N>, Linear>,
    free: Vec<NodeId>,
}

impl<N> NodePool<N> {
    pub fn new() -> Self {
        Self {
            slots: SegVec::new(),
            free: Vec::new(),
        }
    }

    pub fn construct(&mut self, node: N) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                let slot = self
                    .slots
                    .get_mut(id.index())
                    .expect("free list holds an out-of-range id");
                debug_assert!(slot.is_none(), "free list holds a live id");
                *slot = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Return a slot to the free list. The id must not be used afterwards;
    /// accessing a destructed node panics.
    pub fn destruct(&mut self, id: NodeId) {
        let slot = self
            .slots
            .get_mut(id.index())
            .expect("destructing an out-of-range id");
        assert!(slot.take().is_some(), "double destruct of a node");
        self.free.push(id);
    }

    pub fn get(&self, id: NodeId) -> &N {
        self.slots
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .expect("stale node id")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut N {
        self.slots
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .expect("stale node id")
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard every slot, live or free.
    pub fn reset(&mut self) {
        self.slots.truncate(0);
        self.free.clear();
    }
}

impl<N> Default for NodePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_returns_distinct_ids() {
        let mut pool = NodePool::new();
        let a = pool.construct(1);
        let b = pool.construct(2);
        assert_ne!(a, b);
        assert_eq!(*pool.get(a), 1);
        assert_eq!(*pool.get(b), 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn destructed_slots_are_reused() {
        let mut pool = NodePool::new();
        let a = pool.construct("a");
        let _b = pool.construct("b");
        pool.destruct(a);
        assert_eq!(pool.len(), 1);
        let c = pool.construct("c");
        assert_eq!(c, a);
        assert_eq!(*pool.get(c), "c");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    #[should_panic(expected = "stale node id")]
    fn stale_access_panics() {
        let mut pool = NodePool::new();
        let a = pool.construct(7);
        pool.destruct(a);
        pool.get(a);
    }

    #[test]
    fn reset_discards_everything() {
        let mut pool = NodePool::new();
        for i in 0..16 {
            pool.construct(i);
        }
        pool.reset();
        assert!(pool.is_empty());
        let id = pool.construct(42);
        assert_eq!(*pool.get(id), 42);
    }
}
