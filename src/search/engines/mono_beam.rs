use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Monotonic beam search: every node is stamped with the beam slot it was
/// admitted at (`width_seen`), kids inherit the stamp, and a duplicate
/// only re-enters if it was seen at a strictly thinner slot. Expansion
/// and selection interleave over a persistent beam instead of rebuilding
/// the frontier per layer.
#[derive(Debug)]
pub struct MonoBeamSearch<D: Domain> {
    width: usize,
    pool: NodePool<Node<D>>,
    open: BinHeap<FOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    cand: Option<NodeId>,
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    op: D::Oper,
    pop: D::Oper,
    parent: Option<NodeId>,
    g: Cost,
    f: Cost,
    width_seen: usize,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum FOrder {}

impl<D: Domain> HeapOps<Node<D>> for FOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.f == b.f {
            return a.g > b.g;
        }
        a.f < b.f
    }
    fn index(node: &Node<D>) -> HeapIndex {
        node.open_index
    }
    fn set_index(node: &mut Node<D>, index: HeapIndex) {
        node.open_index = index;
    }
}

impl<D: Domain> PathNode<D> for Node<D> {
    fn packed(&self) -> &D::Packed {
        &self.packed
    }
    fn op(&self) -> D::Oper {
        self.op
    }
    fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    fn g(&self) -> Cost {
        self.g
    }
}

impl<D: Domain> MonoBeamSearch<D> {
    pub fn new(limit: Limit, width: usize) -> Self {
        assert!(width > 0, "beam width must be positive");
        Self {
            width,
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            cand: None,
        }
    }

    /// A duplicate is better only when admitted at a thinner beam slot;
    /// at a thinner slot its cheaper `g` also patches through.
    fn dedup(&mut self, id: NodeId) -> Option<NodeId> {
        let packed = self.pool.get(id).packed.clone();
        match self.closed.find(&packed) {
            None => {
                self.closed.insert(packed, id);
                Some(id)
            }
            Some(dup) => {
                if self.pool.get(id).width_seen < self.pool.get(dup).width_seen {
                    self.stats.duplicate();
                    self.stats.reopening();
                    let (width_seen, g, f, parent, op, pop) = {
                        let n = self.pool.get(id);
                        (n.width_seen, n.g, n.f, n.parent, n.op, n.pop)
                    };
                    let node = self.pool.get_mut(dup);
                    node.width_seen = width_seen;
                    if g < node.g {
                        node.f = f;
                        node.g = g;
                        node.parent = parent;
                        node.op = op;
                        node.pop = pop;
                    }
                    Some(id)
                } else {
                    None
                }
            }
        }
    }

    fn expand(&mut self, d: &D, n: NodeId, state: &D::State) {
        self.stats.expansion();
        let pop = self.pool.get(n).pop;
        for op in d.operators(state) {
            if op == pop {
                continue;
            }
            self.stats.generation();
            self.consider_kid(d, n, state, op);
        }
    }

    fn consider_kid(&mut self, d: &D, parent: NodeId, state: &D::State, op: D::Oper) {
        let edge = d.edge(state, op);
        let (g, width_seen) = {
            let p = self.pool.get(parent);
            (p.g + edge.cost, p.width_seen)
        };
        let kid = self.pool.construct(Node {
            packed: d.pack(&edge.state),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f: g + d.h(&edge.state),
            width_seen,
            open_index: NO_INDEX,
        });
        let improves = match self.cand {
            None => true,
            Some(cand) => g < self.pool.get(cand).g,
        };
        if d.is_goal(&edge.state) && improves {
            self.cand = Some(kid);
        }
        self.open.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for MonoBeamSearch<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;

        let packed0 = d.pack(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            width_seen: 0,
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);

        let mut beam: Vec<Option<NodeId>> = vec![None; self.width];
        beam[0] = Some(root);
        let mut used = 1;

        let mut solution = None;
        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            let mut slot = 0;
            while slot < used
                && slot < self.width
                && !done
                && !self.limit.reached(&self.stats)
            {
                if let Some(n) = beam[slot] {
                    let state = d.unpack(&self.pool.get(n).packed);
                    self.expand(d, n, &state);
                }
                beam[slot] = None;
                while beam[slot].is_none() && !self.open.is_empty() {
                    let n = self.open.pop(&mut self.pool).expect("non-empty open");
                    self.pool.get_mut(n).width_seen = slot;
                    beam[slot] = self.dedup(n);
                }
                slot += 1;
            }

            let mut fill = slot;
            while fill < self.width && !self.open.is_empty() {
                let n = self.open.pop(&mut self.pool).expect("non-empty open");
                self.pool.get_mut(n).width_seen = fill;
                beam[fill] = self.dedup(n);
                if beam[fill].is_some() {
                    fill += 1;
                }
            }

            used = fill;
            // Leftover frontier nodes are abandoned in the arena; the
            // next round starts from the beam alone.
            self.open.clear(&mut self.pool);

            if beam.iter().take(used).all(Option::is_none) {
                done = true;
            }

            if let Some(cand) = self.cand {
                solution = Some(extract_solution(d, &self.pool, cand));
                done = true;
            }
        }
        self.stats.finalise();

        match solution {
            Some(solution) => SearchResult::Solved(solution),
            None if self.limit.was_tripped() => SearchResult::LimitReached,
            None => SearchResult::Exhausted,
        }
    }

    fn reset(&mut self) {
        self.open.clear(&mut self.pool);
        self.closed.clear();
        self.pool.reset();
        self.limit.restart();
        self.cand = None;
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn solves_a_small_pancake_stack() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = MonoBeamSearch::new(Limit::none(), 3);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("monobeam must find the goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn width_one_is_hill_climbing_on_blocksworld() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = MonoBeamSearch::new(Limit::none(), 1);
        let result = engine.search(&domain, domain.initial_state());
        // The slot stamp never exceeds zero at width one.
        if let Some(solution) = result.solution() {
            assert!(domain.path_cost(&solution.ops).is_some());
        }
    }

    #[test]
    fn empty_beam_terminates() {
        // A two-cake stack exhausts immediately once the goal is taken.
        let domain = Pancake::new(vec![1, 0], CostModel::Unit);
        let mut engine = MonoBeamSearch::new(Limit::none(), 2);
        let result = engine.search(&domain, domain.initial_state());
        assert!(result.solution().is_some());
    }
}
