use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Monotonic bead search: the interleaved beam of monotonic beam search
/// ordered by depth-distance `fd = gd + d`, breaking ties toward low `f`
/// and high `g`. Keeps searching after an incumbent until a whole layer
/// is admitted at or above the incumbent's cost, streaming one
/// `incumbent` row per improvement.
#[derive(Debug)]
pub struct MonoBeadSearch<D: Domain> {
    width: usize,
    dropdups: bool,
    dump: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<FdOrder, Node<D>>,
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
    /// Depth from the root in edges.
    gd: Cost,
    /// `gd` plus the domain's remaining-edge estimate.
    fd: Cost,
    width_seen: usize,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum FdOrder {}

impl<D: Domain> HeapOps<Node<D>> for FdOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.fd == b.fd {
            if a.f == b.f {
                return a.g > b.g;
            }
            return a.f < b.f;
        }
        a.fd < b.fd
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

impl<D: Domain> MonoBeadSearch<D> {
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
            sol_count: 0,
        }
    }

    /// Thinner slot wins outright; at the same slot the cheaper `g`
    /// takes over the closed entry. Everything else is dropped.
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
        let (g, gd, width_seen) = {
            let p = self.pool.get(parent);
            (p.g + edge.cost, p.gd + cost(1.0), p.width_seen)
        };
        let kid = self.pool.construct(Node {
            packed: d.pack(&edge.state),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f: g + d.h(&edge.state),
            gd,
            fd: gd + d.d(&edge.state),
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
                    metrics::Value::Count(width_seen as u64),
                    metrics::Value::Real(self.stats.elapsed_seconds()),
                ],
            );
            return;
        }
        self.open.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for MonoBeadSearch<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;
        self.depth = 0;
        self.sol_count = 0;

        let packed0 = d.pack(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            gd: cost(0.0),
            fd: d.d(&s0),
            width_seen: 0,
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);

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
                    "width seen",
                    "wall time",
                ],
            );
        }

        let mut beam: Vec<Option<NodeId>> = vec![None; self.width];
        beam[0] = Some(root);
        let mut used = 1;

        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            self.depth += 1;
            let mut slot = 0;
            let mut first_filled = self.width;
            let mut f_min: Option<Cost> = None;

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
                if let Some(filled) = beam[slot] {
                    first_filled = first_filled.min(slot);
                    let f = self.pool.get(filled).f;
                    f_min = Some(f_min.map_or(f, |m: Cost| m.min(f)));
                }
                slot += 1;
            }

            let mut fill = slot;
            while fill < self.width && !self.open.is_empty() {
                let n = self.open.pop(&mut self.pool).expect("non-empty open");
                self.pool.get_mut(n).width_seen = fill;
                beam[fill] = self.dedup(n);
                if let Some(filled) = beam[fill] {
                    let f = self.pool.get(filled).f;
                    f_min = Some(f_min.map_or(f, |m: Cost| m.min(f)));
                    fill += 1;
                }
            }

            used = fill;
            self.dump_and_clear(d, &beam);

            if first_filled == self.width || used == 0 {
                done = true;
            }
            if let (Some(cand), Some(f_min)) = (self.cand, f_min) {
                if f_min >= self.pool.get(cand).g {
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
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "final depth", &self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn keeps_improving_until_the_layer_bound_closes() {
        let domain = Pancake::new(vec![3, 1, 4, 2, 0], CostModel::Unit);
        let mut engine = MonoBeadSearch::new(Limit::none(), 4, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("monobead must find a goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn dropdups_mode_still_terminates() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = MonoBeadSearch::new(Limit::none(), 3, true, false);
        let result = engine.search(&domain, domain.initial_state());
        if let Some(solution) = result.solution() {
            assert!(domain.path_cost(&solution.ops).is_some());
        }
    }
}
