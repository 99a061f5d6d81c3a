use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Width-bounded layer search: each layer selects up to `width` best
/// nodes by `f` from the frontier, discards the rest, and expands the
/// survivors into the next frontier. Duplicate detection happens at
/// selection; a cheaper duplicate replaces the closed entry unless
/// `dropdups` forbids reopening. The first goal ends the layer.
#[derive(Debug)]
pub struct BeamSearch<D: Domain> {
    width: usize,
    dropdups: bool,
    dump: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<FOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    cand: Option<NodeId>,
    depth: u64,
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    op: D::Oper,
    pop: D::Oper,
    parent: Option<NodeId>,
    g: Cost,
    f: Cost,
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

impl<D: Domain> BeamSearch<D> {
    pub fn new(limit: Limit, width: usize, dropdups: bool, dump: bool) -> Self {
        assert!(width > 0, "beam width must be positive");
        Self {
            width,
            dropdups,
            dump,
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            cand: None,
            depth: 0,
        }
    }

    /// Selection-time duplicate handling: admit fresh states, replace the
    /// closed entry when strictly cheaper, skip otherwise.
    fn select(&mut self, id: NodeId) -> Option<NodeId> {
        let packed = self.pool.get(id).packed.clone();
        match self.closed.find(&packed) {
            None => {
                self.closed.insert(packed, id);
                Some(id)
            }
            Some(dup) => {
                self.stats.duplicate();
                if !self.dropdups && self.pool.get(id).g < self.pool.get(dup).g {
                    self.closed.insert(packed, id);
                    Some(id)
                } else {
                    self.pool.destruct(id);
                    None
                }
            }
        }
    }

    /// Discard (and optionally dump) whatever the layer did not select.
    fn dump_and_clear(&mut self, d: &D, beam: &[NodeId]) {
        if self.dump {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "depth: {}", self.depth);
            let _ = writeln!(err, "used states:");
            for &id in beam {
                let state = d.unpack(&self.pool.get(id).packed);
                let _ = d.dump_state(&mut err, &state);
                let _ = writeln!(err, "g: {}", self.pool.get(id).g);
                let _ = writeln!(err, "h: {}", d.h(&state));
                let _ = writeln!(err, "d: {}", d.d(&state));
                let _ = writeln!(err);
            }
            let _ = writeln!(err, "unused states:");
            while let Some(id) = self.open.pop(&mut self.pool) {
                let state = d.unpack(&self.pool.get(id).packed);
                let _ = d.dump_state(&mut err, &state);
                let _ = writeln!(err, "g: {}", self.pool.get(id).g);
                let _ = writeln!(err);
                self.pool.destruct(id);
            }
        } else {
            while let Some(id) = self.open.pop(&mut self.pool) {
                self.pool.destruct(id);
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
        let kid = self.pool.construct(Node {
            packed: d.pack(&edge.state),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f: g + d.h(&edge.state),
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

impl<D: Domain> SearchEngine<D> for BeamSearch<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;
        self.depth = 0;

        let root = self.pool.construct(Node {
            packed: d.pack(&s0),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            open_index: NO_INDEX,
        });
        self.open.push(&mut self.pool, root);

        let mut solution = None;
        let mut done = false;
        while !self.open.is_empty() && !done && !self.limit.reached(&self.stats) {
            self.depth += 1;

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

            self.dump_and_clear(d, &beam);

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
        self.depth = 0;
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "final depth", &self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{CostModel, Pancake};
    use crate::search::engines::UniformCost;

    #[test]
    fn narrow_beam_solves_the_nearby_goal() {
        let text = crate::test_utils::PANCAKE_NEARBY5_TEXT;
        let domain =
            Pancake::from_reader(&mut text.as_bytes(), CostModel::Unit).expect("parse failed");
        let mut engine = BeamSearch::new(Limit::none(), 2, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("beam must find the goal");
        assert!(solution.cost <= cost(2.0));
    }

    #[test]
    fn wide_beam_matches_breadth_first_completeness() {
        // Width at or above the branching factor degenerates to
        // breadth-first layering, which must find a solution whenever
        // one exists at the explored depth.
        let domain = Pancake::new(vec![3, 1, 4, 2, 0], CostModel::Unit);
        let branching = domain.operators(&domain.initial_state()).len();
        let mut engine = BeamSearch::new(Limit::none(), branching * branching, false, false);
        let result = engine.search(&domain, domain.initial_state());
        assert!(result.solution().is_some(), "wide beam must be complete");
    }

    #[test]
    fn beam_solution_is_a_valid_path() {
        let domain = Pancake::new(vec![4, 2, 0, 3, 1], CostModel::Unit);
        let mut engine = BeamSearch::new(Limit::none(), 3, false, false);
        if let Some(solution) = engine
            .search(&domain, domain.initial_state())
            .solution()
        {
            assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
        }
    }

    #[test]
    fn dropdups_never_reopens() {
        let domain = Pancake::new(vec![1, 0, 3, 2, 4], CostModel::Unit);
        let mut engine = BeamSearch::new(Limit::none(), 4, true, false);
        engine.search(&domain, domain.initial_state());
        assert_eq!(engine.stats().reopened, 0);
    }

    #[test]
    fn beam_cost_is_no_better_than_optimal() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut ucs = UniformCost::new(Limit::none());
        let optimal = ucs
            .search(&domain, domain.initial_state())
            .solution()
            .unwrap()
            .cost;
        let mut engine = BeamSearch::new(Limit::none(), 2, false, false);
        let beam_cost = engine
            .search(&domain, domain.initial_state())
            .solution()
            .unwrap()
            .cost;
        assert!(beam_cost >= optimal);
    }
}
