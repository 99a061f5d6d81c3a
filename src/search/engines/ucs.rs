use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Uniform-cost search: a single open list ordered by `g`. The first goal
/// popped is optimal for non-negative edge costs.
#[derive(Debug)]
pub struct UniformCost<D: Domain> {
    pool: NodePool<Node<D>>,
    open: BinHeap<GOrder, Node<D>>,
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
    open_index: HeapIndex,
}

#[derive(Debug)]
enum GOrder {}

impl<D: Domain> HeapOps<Node<D>> for GOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        a.g < b.g
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

impl<D: Domain> UniformCost<D> {
    pub fn new(limit: Limit) -> Self {
        Self {
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
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
        let packed = d.pack(&edge.state);

        if let Some(dup) = self.closed.find(&packed) {
            self.stats.duplicate();
            if g >= self.pool.get(dup).g {
                return;
            }
            let is_open = self.open.contains(self.pool.get(dup));
            if is_open {
                let index = self.open.pre_update(self.pool.get(dup));
                let node = self.pool.get_mut(dup);
                node.g = g;
                node.parent = Some(parent);
                node.op = op;
                node.pop = edge.revop;
                self.open.post_update(&mut self.pool, index);
            } else {
                let node = self.pool.get_mut(dup);
                node.g = g;
                node.parent = Some(parent);
                node.op = op;
                node.pop = edge.revop;
                self.stats.reopening();
                self.open.push(&mut self.pool, dup);
            }
        } else {
            let kid = self.pool.construct(Node {
                packed: packed.clone(),
                op,
                pop: edge.revop,
                parent: Some(parent),
                g,
                open_index: NO_INDEX,
            });
            self.closed.insert(packed, kid);
            self.open.push(&mut self.pool, kid);
        }
    }
}

impl<D: Domain> SearchEngine<D> for UniformCost<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();

        let packed0 = d.pack(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: Cost::from(0.0),
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
    use crate::domains::{Blocksworld, CostModel, Pancake};
    use crate::search::cost;

    fn run<D: Domain>(d: &D) -> SearchResult<D> {
        let mut engine = UniformCost::new(Limit::none());
        engine.search(d, d.initial_state())
    }

    #[test]
    fn reversed_pancake_solves_in_one_flip() {
        let domain = Pancake::new(vec![4, 3, 2, 1, 0], CostModel::Unit);
        let result = run(&domain);
        let solution = result.solution().expect("ucs must solve pancake");
        assert_eq!(solution.cost, cost(1.0));
        assert_eq!(solution.ops, vec![4]);
    }

    #[test]
    fn heavy_pancake_pays_the_top_cake() {
        let domain = Pancake::new(vec![4, 3, 2, 1, 0], CostModel::Heavy);
        let result = run(&domain);
        let solution = result.solution().expect("ucs must solve pancake");
        assert_eq!(solution.cost, cost(5.0));
    }

    #[test]
    fn blocksworld_tower_reversal_takes_three_moves() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let result = run(&domain);
        let solution = result.solution().expect("ucs must solve blocksworld");
        assert_eq!(solution.cost, cost(3.0));
        assert_eq!(solution.length(), 3);
    }

    #[test]
    fn expansion_limit_stops_the_search() {
        let domain = Pancake::new(vec![5, 4, 3, 2, 1, 0], CostModel::Unit);
        let mut engine = UniformCost::new(Limit::new(None, Some(1), None));
        let result = engine.search(&domain, domain.initial_state());
        assert!(matches!(result, SearchResult::LimitReached));
    }

    #[test]
    fn reset_allows_a_second_search() {
        let domain = Pancake::new(vec![2, 1, 0], CostModel::Unit);
        let mut engine = UniformCost::new(Limit::none());
        let first = engine.search(&domain, domain.initial_state());
        assert!(first.solution().is_some());
        engine.reset();
        let second = engine.search(&domain, domain.initial_state());
        assert_eq!(
            second.solution().unwrap().cost,
            first.solution().unwrap().cost
        );
    }
}
