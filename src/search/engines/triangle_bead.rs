use crate::collections::{HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::ring::LayerRing;
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Triangle bead search: one open list per depth, arranged as a reusable
/// ring. Every sweep walks from the shallowest layer to the deepest,
/// expanding one dedup'd node per layer into the next layer, and grows a
/// fresh deepest layer at the end; each sweep therefore deepens the
/// explored triangle by one. Layers deeper than the last expansion are
/// pruned after every sweep.
#[derive(Debug)]
pub struct TriangleBeadSearch<D: Domain> {
    dropdups: bool,
    pool: NodePool<Node<D>>,
    layers: LayerRing<DOrder, Node<D>>,
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

impl<D: Domain> TriangleBeadSearch<D> {
    pub fn new(limit: Limit, dropdups: bool) -> Self {
        Self {
            dropdups,
            pool: NodePool::new(),
            layers: LayerRing::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            cand: None,
            depth: 0,
            sol_count: 0,
        }
    }

    /// Incumbent pruning plus the bead duplicate rule: a cheaper
    /// duplicate patches the closed entry and still gets expanded.
    fn dedup(&mut self, id: NodeId) -> Option<NodeId> {
        if let Some(cand) = self.cand {
            if self.pool.get(id).f >= self.pool.get(cand).g {
                self.pool.destruct(id);
                return None;
            }
        }
        let packed = self.pool.get(id).packed.clone();
        match self.closed.find(&packed) {
            None => {
                self.closed.insert(packed, id);
                Some(id)
            }
            Some(dup) => {
                self.stats.duplicate();
                if !self.dropdups && self.pool.get(id).g < self.pool.get(dup).g {
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

    fn expand(&mut self, d: &D, n: NodeId, state: &D::State, into: usize) {
        self.stats.expansion();
        let pop = self.pool.get(n).pop;
        for op in d.operators(state) {
            if op == pop {
                continue;
            }
            self.stats.generation();
            self.consider_kid(d, n, state, op, into);
        }
    }

    fn consider_kid(&mut self, d: &D, parent: NodeId, state: &D::State, op: D::Oper, into: usize) {
        let edge = d.edge(state, op);
        let g = self.pool.get(parent).g + edge.cost;
        let f = g + d.h(&edge.state);
        let improves = match self.cand {
            None => true,
            Some(cand) => g < self.pool.get(cand).g,
        };
        let is_goal = d.is_goal(&edge.state);
        if is_goal && improves {
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
                    metrics::Value::Real(g.into_inner()),
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
            d: d.d(&edge.state),
            open_index: NO_INDEX,
        });
        self.layers.get_mut(into).push(&mut self.pool, kid);
    }
}

impl<D: Domain> SearchEngine<D> for TriangleBeadSearch<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;
        self.depth = 1;
        self.sol_count = 0;

        let packed0 = d.pack(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            d: cost(0.0),
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);

        self.layers.grow();
        self.expand(d, root, &s0, 0);

        {
            let mut out = io::stdout().lock();
            let _ = metrics::row_header(
                &mut out,
                "incumbent",
                &["num", "nodes expanded", "nodes generated", "solution cost", "wall time"],
            );
        }

        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            done = true;
            self.depth += 1;

            let mut at = 0;
            let mut looped = false;
            let mut last_filled: Option<usize> = None;

            while !looped && !self.limit.reached(&self.stats) {
                let mut n = None;
                while n.is_none() && !self.layers.get_mut(at).is_empty() {
                    let popped = self
                        .layers
                        .get_mut(at)
                        .pop(&mut self.pool)
                        .expect("non-empty layer");
                    n = self.dedup(popped);
                }

                if at + 1 == self.layers.len() {
                    self.layers.grow();
                    looped = true;
                }
                at += 1;

                match n {
                    Some(n) => {
                        last_filled = Some(at);
                        let state = d.unpack(&self.pool.get(n).packed);
                        self.expand(d, n, &state, at);
                        done = false;
                    }
                    None => {
                        if done {
                            // Leading layers that stayed empty all sweep
                            // are retired for reuse.
                            self.layers.retire_shallowest();
                            at -= 1;
                        }
                    }
                }
            }

            if let Some(last_filled) = last_filled {
                self.layers.truncate_after(last_filled, &mut self.pool);
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
        self.layers.clear(&mut self.pool);
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
        metrics::pair(out, "open lists created", &self.layers.created)?;
        metrics::pair(out, "open lists reused", &self.layers.reused)?;
        metrics::pair(out, "open list type", &"binary heap")?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "final depth", &self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn sweeps_to_a_goal_on_pancake() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = TriangleBeadSearch::new(Limit::none(), false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("trianglebead must find the goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn prunes_to_termination_once_an_incumbent_exists() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = TriangleBeadSearch::new(Limit::none(), false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("trianglebead must find the goal");
        assert!(domain.path_cost(&solution.ops).is_some());
    }

    #[test]
    fn dropdups_mode_reports_no_reopenings() {
        let domain = Pancake::new(vec![3, 1, 4, 2, 0], CostModel::Unit);
        let mut engine = TriangleBeadSearch::new(Limit::none(), true);
        engine.search(&domain, domain.initial_state());
        assert_eq!(engine.stats().reopened, 0);
    }
}
