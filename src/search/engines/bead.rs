use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Distance-guided beam search: layers select by `d` rather than `f`, so
/// the beam chases states that look close to a goal regardless of cost.
/// A cheaper duplicate reopens by patching the closed entry in place,
/// and once an incumbent exists kids with `f` at or above its cost are
/// pruned at generation.
#[derive(Debug)]
pub struct BeadSearch<D: Domain> {
    width: usize,
    dropdups: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<DOrder, Node<D>>,
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
    d: Cost,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum DOrder {}

impl<D: Domain> HeapOps<Node<D>> for DOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.d == b.d {
            return a.g > b.g;
        }
        a.d < b.d
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

impl<D: Domain> BeadSearch<D> {
    pub fn new(limit: Limit, width: usize, dropdups: bool) -> Self {
        assert!(width > 0, "beam width must be positive");
        Self {
            width,
            dropdups,
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            cand: None,
        }
    }

    /// Admit fresh states; on a cheaper duplicate, reopen by patching
    /// the closed entry and still give the popped node a beam slot.
    fn select(&mut self, id: NodeId) -> Option<NodeId> {
        let packed = self.pool.get(id).packed.clone();
        match self.closed.find(&packed) {
            None => {
                self.closed.insert(packed, id);
                Some(id)
            }
            Some(dup) => {
                self.stats.duplicate();
                let improves = self.pool.get(id).g < self.pool.get(dup).g;
                if !self.dropdups && improves {
                    self.stats.reopening();
                    let (g, f, dist, parent, op, pop) = {
                        let n = self.pool.get(id);
                        (n.g, n.f, n.d, n.parent, n.op, n.pop)
                    };
                    let node = self.pool.get_mut(dup);
                    node.f = f;
                    node.g = g;
                    node.d = dist;
                    node.parent = parent;
                    node.op = op;
                    node.pop = pop;
                    Some(id)
                } else {
                    self.pool.destruct(id);
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
        let g = self.pool.get(parent).g + edge.cost;
        let f = g + d.h(&edge.state);
        let improves = match self.cand {
            None => true,
            Some(cand) => g < self.pool.get(cand).g,
        };
        let is_goal = d.is_goal(&edge.state);
        if !(is_goal && improves) {
            if let Some(cand) = self.cand {
                if self.pool.get(cand).g <= f {
                    return;
                }
            }
        }
        let kid = self.pool.construct(Node {
            packed: d.pack(&edge.state),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f,
            d: d.d(&edge.state),
            open_index: NO_INDEX,
        });
        if is_goal && improves {
            self.cand = Some(kid);
        }
        self.open.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for BeadSearch<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;

        let root = self.pool.construct(Node {
            packed: d.pack(&s0),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            d: cost(0.0),
            open_index: NO_INDEX,
        });
        self.open.push(&mut self.pool, root);

        let mut solution = None;
        let mut done = false;
        while !self.open.is_empty() && !done && !self.limit.reached(&self.stats) {
            let mut beam = Vec::with_capacity(self.width);
            while beam.len() < self.width && !self.open.is_empty() {
                let n = self.open.pop(&mut self.pool).expect("non-empty open");
                if let Some(selected) = self.select(n) {
                    beam.push(selected);
                }
            }

            if beam.is_empty() {
                done = true;
            }

            while let Some(id) = self.open.pop(&mut self.pool) {
                self.pool.destruct(id);
            }

            for at in 0..beam.len() {
                if done || self.limit.reached(&self.stats) {
                    break;
                }
                let n = beam[at];
                let state = d.unpack(&self.pool.get(n).packed);
                self.expand(d, n, &state);
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
    fn finds_the_adjacent_goal() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = BeadSearch::new(Limit::none(), 2, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("bead must find the goal");
        assert!(solution.cost <= cost(2.0));
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn solves_blocksworld_with_a_wide_beam() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = BeadSearch::new(Limit::none(), 16, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("bead must solve the tower");
        assert!(domain.path_cost(&solution.ops).is_some());
    }
}
