use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Monotonic beam search with a floor: the leading `width - n` beam slots
/// interleave expansion and selection as usual, while the trailing `n`
/// slots are only refilled from the leftover frontier, all stamped at the
/// floor slot. Stops once an incumbent was admitted at slot zero.
#[derive(Debug)]
pub struct MonoFloorSearch<D: Domain> {
    width: usize,
    trailing: usize,
    dropdups: bool,
    dump: bool,
    pool: NodePool<Node<D>>,
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

impl<D: Domain> MonoFloorSearch<D> {
    pub fn new(limit: Limit, width: usize, trailing: usize, dropdups: bool, dump: bool) -> Self {
        assert!(width > 0, "beam width must be positive");
        assert!(trailing > 0, "trailing slot count must be positive");
        Self {
            width,
            trailing,
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
                    // Never taken while refilling the trailing slots.
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
        let (g, width_seen) = {
            let p = self.pool.get(parent);
            (p.g + edge.cost, p.width_seen)
        };
        let f = g + d.h(&edge.state);
        let improves = match self.cand {
            None => true,
            Some(cand) => g < self.pool.get(cand).g,
        };
        if d.is_goal(&edge.state) && improves {
            let kid = self.pool.construct(Node {
                packed: d.pack(&edge.state),
                op,
                pop: edge.revop,
                parent: Some(parent),
                g,
                f,
                width_seen,
                open_index: NO_INDEX,
            });
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
        if let Some(cand) = self.cand {
            if self.pool.get(cand).g <= f {
                return;
            }
        }
        let kid = self.pool.construct(Node {
            packed: d.pack(&edge.state),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f,
            width_seen,
            open_index: NO_INDEX,
        });
        self.open.push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for MonoFloorSearch<D> {
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

        let floor = self.width.saturating_sub(self.trailing);
        let mut beam: Vec<Option<NodeId>> = vec![None; self.width];
        beam[0] = Some(root);

        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            self.depth += 1;
            let mut taken = 0;
            let mut slot = 0;
            let mut count = 0;

            while taken < self.width
                && slot < self.width
                && !done
                && !self.limit.reached(&self.stats)
            {
                let expanding = beam[taken].take();
                taken += 1;
                let first_part = slot < floor;

                if let Some(n) = expanding {
                    let state = d.unpack(&self.pool.get(n).packed);
                    self.expand(d, n, &state);
                }

                if !first_part {
                    continue;
                }

                beam[slot] = None;
                while beam[slot].is_none() && !self.open.is_empty() {
                    let n = self.open.pop(&mut self.pool).expect("non-empty open");
                    self.pool.get_mut(n).width_seen = slot;
                    beam[slot] = self.dedup(n);
                }
                if beam[slot].is_some() {
                    count += 1;
                }
                slot += 1;
            }

            while slot < self.width && !self.open.is_empty() {
                let first_part = slot < floor;
                let n = self.open.pop(&mut self.pool).expect("non-empty open");
                self.pool.get_mut(n).width_seen = if first_part { slot } else { floor };
                beam[slot] = self.dedup(n);
                if beam[slot].is_some() {
                    slot += 1;
                    count += 1;
                }
            }

            self.dump_and_clear(d, &beam);

            if count == 0 {
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
    fn finds_a_goal_and_reports_a_valid_path() {
        let domain = Pancake::new(vec![3, 1, 4, 2, 0], CostModel::Unit);
        let mut engine = MonoFloorSearch::new(Limit::none(), 4, 1, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("monofloor must find a goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn trailing_slots_share_the_floor_stamp() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = MonoFloorSearch::new(Limit::none(), 3, 2, false, false);
        let result = engine.search(&domain, domain.initial_state());
        if let Some(solution) = result.solution() {
            assert!(domain.path_cost(&solution.ops).is_some());
        }
    }
}
