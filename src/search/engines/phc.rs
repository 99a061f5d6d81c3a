use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Parallel hill climbing: each beam slot runs its own climb. Expanding
/// slot `i` keeps that slot's best surviving child and spills the other
/// kids into a shared open list, which refills empty slots until the
/// beam has been full once. Stops on an incumbent first admitted at
/// slot zero or when every climb dies out.
#[derive(Debug)]
pub struct ParallelHillClimbing<D: Domain> {
    width: usize,
    dropdups: bool,
    dump: bool,
    pool: NodePool<Node<D>>,
    candidates: BinHeap<FOrder, Node<D>>,
    open: BinHeap<FOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    cand: Option<NodeId>,
    depth: u64,
    sol_count: u64,
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

impl<D: Domain> ParallelHillClimbing<D> {
    pub fn new(limit: Limit, width: usize, dropdups: bool, dump: bool) -> Self {
        assert!(width > 0, "beam width must be positive");
        Self {
            width,
            dropdups,
            dump,
            pool: NodePool::new(),
            candidates: BinHeap::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            cand: None,
            depth: 0,
            sol_count: 0,
        }
    }

    fn dedup(&mut self, id: NodeId) -> Option<NodeId> {
        let packed = self.pool.get(id).packed.clone();
        match self.closed.find(&packed) {
            None => {
                self.closed.insert(packed, id);
                Some(id)
            }
            Some(dup) => {
                self.stats.duplicate();
                let (id_seen, id_g) = {
                    let n = self.pool.get(id);
                    (n.width_seen, n.g)
                };
                let (dup_seen, dup_g) = {
                    let n = self.pool.get(dup);
                    (n.width_seen, n.g)
                };
                if id_seen < dup_seen {
                    self.closed.insert(packed, id);
                    Some(id)
                } else if self.dropdups || id_g >= dup_g {
                    self.pool.destruct(id);
                    None
                } else {
                    self.stats.reopening();
                    if id_seen == dup_seen {
                        self.closed.insert(packed, id);
                    }
                    Some(id)
                }
            }
        }
    }

    fn dump_and_clear(&mut self, d: &D, beam: &[Option<NodeId>]) {
        if self.dump {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "depth: {}", self.depth);
            let _ = writeln!(err, "used states:");
            for id in beam.iter().flatten() {
                let state = d.unpack(&self.pool.get(*id).packed);
                let _ = d.dump_state(&mut err, &state);
                let _ = writeln!(err, "g: {}", self.pool.get(*id).g);
            }
            let _ = writeln!(err, "unused states:");
            while let Some(id) = self.open.pop(&mut self.pool) {
                let state = d.unpack(&self.pool.get(id).packed);
                let _ = d.dump_state(&mut err, &state);
                let _ = writeln!(err, "g: {}", self.pool.get(id).g);
                self.pool.destruct(id);
            }
        } else {
            while let Some(id) = self.open.pop(&mut self.pool) {
                self.pool.destruct(id);
            }
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
            self.sol_count += 1;
            let mut out = io::stdout().lock();
            let _ = metrics::row(
                &mut out,
                "incumbent",
                &[
                    metrics::Value::Count(self.sol_count),
                    metrics::Value::Count(self.stats.expanded),
                    metrics::Value::Count(self.stats.generated),
                    metrics::Value::Count(self.depth),
                    metrics::Value::Real(g.into_inner()),
                    metrics::Value::Real(self.stats.elapsed_seconds()),
                ],
            );
            return;
        }
        self.candidates.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for ParallelHillClimbing<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;
        self.depth = 0;
        self.sol_count = 0;

        let mut beam: Vec<Option<NodeId>> = vec![None; self.width];
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
        beam[0] = Some(root);

        {
            let mut out = io::stdout().lock();
            let _ = metrics::row_header(
                &mut out,
                "incumbent",
                &[
                    "num",
                    "nodes expanded",
                    "nodes generated",
                    "solution depth",
                    "solution cost",
                    "wall time",
                ],
            );
        }

        let mut has_filled = false;
        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            self.depth += 1;

            let mut filled = 0;
            for slot in 0..self.width {
                if self.limit.reached(&self.stats) {
                    break;
                }
                let Some(n) = beam[slot] else {
                    continue;
                };

                self.stats.expansion();
                let state = d.unpack(&self.pool.get(n).packed);
                let pop = self.pool.get(n).pop;
                for op in d.operators(&state) {
                    if op == pop {
                        continue;
                    }
                    self.stats.generation();
                    self.consider_kid(d, n, &state, op);
                }

                // This climb continues from its best surviving child;
                // the rest spill into the shared open list.
                let mut best_child = None;
                while best_child.is_none() && !self.candidates.is_empty() {
                    let c = self.candidates.pop(&mut self.pool).expect("non-empty");
                    best_child = self.dedup(c);
                }
                if let Some(bc) = best_child {
                    beam[filled] = Some(bc);
                    filled = slot + 1;
                }
                while let Some(c) = self.candidates.pop(&mut self.pool) {
                    self.open.push(&mut self.pool, c);
                }
            }

            let mut slot = filled;
            while !done && !self.open.is_empty() && slot < self.width && !has_filled {
                beam[slot] = None;
                let mut refill = None;
                while refill.is_none() && !self.open.is_empty() {
                    let n = self.open.pop(&mut self.pool).expect("non-empty open");
                    refill = self.dedup(n);
                }
                if let Some(n) = refill {
                    beam[slot] = Some(n);
                    filled = slot + 1;
                }
                slot += 1;
            }

            if filled == self.width {
                has_filled = true;
            }

            self.dump_and_clear(d, &beam);

            if filled == 0 {
                done = true;
            }
            if let Some(cand) = self.cand {
                if self.pool.get(cand).width_seen == 0 {
                    done = true;
                }
            }
        }

        let solution = self
            .cand
            .map(|cand| extract_solution(d, &self.pool, cand));
        self.stats.finalise();

        match solution {
            Some(solution) => SearchResult::Solved(solution),
            None if self.limit.was_tripped() => SearchResult::LimitReached,
            None => SearchResult::Exhausted,
        }
    }

    fn reset(&mut self) {
        self.open.clear(&mut self.pool);
        self.candidates.clear(&mut self.pool);
        self.closed.clear();
        self.pool.reset();
        self.limit.restart();
        self.cand = None;
        self.depth = 0;
        self.sol_count = 0;
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.candidates.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn climbs_to_a_nearby_goal() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = ParallelHillClimbing::new(Limit::none(), 3, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("phc must find the goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn solves_blocksworld_reversal() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = ParallelHillClimbing::new(Limit::none(), 4, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("phc must find the goal");
        assert!(domain.path_cost(&solution.ops).is_some());
    }
}
