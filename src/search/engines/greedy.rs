use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Greedy best-first search on `h`, or on `d` when constructed as Speedy.
/// Duplicates are discarded outright; the first goal popped is returned
/// with no optimality claim.
#[derive(Debug)]
pub struct Greedy<D: Domain> {
    speedy: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<HOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    op: D::Oper,
    pop: D::Oper,
    parent: Option<NodeId>,
    g: Cost,
    /// `h` or `d`, depending on the mode.
    h: Cost,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum HOrder {}

impl<D: Domain> HeapOps<Node<D>> for HOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.h == b.h {
            return a.g > b.g;
        }
        a.h < b.h
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

impl<D: Domain> Greedy<D> {
    pub fn new(limit: Limit, speedy: bool) -> Self {
        Self {
            speedy,
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
        }
    }

    fn estimate(&self, d: &D, state: &D::State) -> Cost {
        if self.speedy {
            d.d(state)
        } else {
            d.h(state)
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
        let packed = d.pack(&edge.state);
        if self.closed.find(&packed).is_some() {
            self.stats.duplicate();
            return;
        }
        let kid = self.pool.construct(Node {
            packed: packed.clone(),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g: self.pool.get(parent).g + edge.cost,
            h: self.estimate(d, &edge.state),
            open_index: NO_INDEX,
        });
        self.closed.insert(packed, kid);
        self.open.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for Greedy<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();

        let packed0 = d.pack(&s0);
        let h0 = self.estimate(d, &s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            h: h0,
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);
        self.open.push(&mut self.pool, root);

        let mut solution = None;
        while !self.open.is_empty() && !self.limit.reached(&self.stats) {
            let n = self.open.pop(&mut self.pool).expect("non-empty open");
            let state = d.unpack(&self.pool.get(n).packed);

            if d.is_goal(&state) {
                solution = Some(extract_solution(d, &self.pool, n));
                break;
            }

            self.expand(d, n, &state);
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
    use crate::domains::{CostModel, Pancake, SynthTree, Tiles};

    #[test]
    fn greedy_finds_a_pancake_solution() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = Greedy::new(Limit::none(), false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("greedy must find a solution");
        assert!(domain.path_cost(&solution.ops).is_some());
    }

    #[test]
    fn speedy_orders_by_distance() {
        let domain = Tiles::new(3, 3, vec![1, 0, 2, 3, 4, 5, 6, 7, 8], CostModel::Heavy);
        let mut engine = Greedy::new(Limit::none(), true);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("speedy must find a solution");
        assert_eq!(solution.cost, cost(1.0));
    }

    #[test]
    fn exact_synthetic_heuristic_stays_within_the_cost_ceiling() {
        // With zero heuristic error greedy walks straight down; each of
        // the at most AGD steps costs at most the generator maximum.
        let domain = SynthTree::new(42, 10, 0.0);
        let mut engine = Greedy::new(Limit::none(), false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("greedy must reach the goal");
        assert!(solution.cost <= cost(100.0), "cost {} too high", solution.cost);
    }
}
