use crate::collections::{HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::ring::LayerRing;
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Rectangle bead search: like the triangle sweep, but the per-layer
/// expansion budget grows with the iteration count (`base` nodes per
/// ordinary layer, `iteration * base` at the deepest), and each sweep may
/// deepen the ring by up to `height` layers, optionally doubling the
/// height step every sweep. The explored region therefore widens as it
/// deepens instead of staying one node per layer.
#[derive(Debug)]
pub struct RectangleBeadSearch<D: Domain> {
    delta_height: f64,
    delta_base: f64,
    exponential: bool,
    dropdups: bool,
    dump: bool,
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

impl<D: Domain> RectangleBeadSearch<D> {
    pub fn new(
        limit: Limit,
        delta_height: f64,
        delta_base: f64,
        exponential: bool,
        dropdups: bool,
        dump: bool,
    ) -> Self {
        assert!(delta_height >= 1.0, "height step must be at least 1");
        assert!(delta_base >= 1.0, "base step must be at least 1");
        Self {
            delta_height,
            delta_base,
            exponential,
            dropdups,
            dump,
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

    fn dump_expansion(&self, d: &D, state: &D::State, depth: usize, g: Cost) {
        if !self.dump {
            return;
        }
        let mut err = io::stderr().lock();
        let _ = write!(err, "{depth},{},", self.stats.expanded);
        let _ = d.dump_state(&mut err, state);
        let _ = writeln!(err, ",{}", g);
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

impl<D: Domain> SearchEngine<D> for RectangleBeadSearch<D> {
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
            d: d.d(&s0),
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);

        self.layers.grow();
        self.dump_expansion(d, &s0, 0, cost(0.0));
        self.expand(d, root, &s0, 0);

        {
            let mut out = io::stdout().lock();
            let _ = metrics::row_header(
                &mut out,
                "incumbent",
                &["num", "nodes expanded", "nodes generated", "solution cost", "wall time"],
            );
        }

        let width_step = self.delta_base as usize;
        let mut height = self.delta_height;
        let mut iteration = 0usize;

        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            done = true;
            self.depth += 1;
            iteration += 1;

            // Every sweep starts by opening one new deepest layer; more
            // may be added mid-sweep, bounded by the height step.
            self.layers.grow();
            let mut height_todo = height as i64;
            if self.exponential {
                height *= 2.0;
            }

            let mut at = 0;
            let mut current_depth = self.layers.removed;
            let mut last_filled: Option<usize> = None;

            while at + 1 < self.layers.len() && !self.limit.reached(&self.stats) {
                current_depth += 1;

                let budget = if at + 2 < self.layers.len() {
                    width_step
                } else {
                    // The deepest drained layer gets the widening
                    // budget, and the ring may deepen further.
                    if height_todo > 0 && !self.layers.get_mut(at).is_empty() {
                        self.layers.grow();
                        height_todo -= 1;
                    } else {
                        break;
                    }
                    iteration * width_step
                };
                let budget = budget.min(self.layers.get_mut(at).len());

                let mut batch = Vec::with_capacity(budget);
                let mut some_expansion = false;
                for _ in 0..budget {
                    let mut n = None;
                    while n.is_none() && !self.layers.get_mut(at).is_empty() {
                        let popped = self
                            .layers
                            .get_mut(at)
                            .pop(&mut self.pool)
                            .expect("non-empty layer");
                        n = self.dedup(popped);
                    }
                    if n.is_some() {
                        some_expansion = true;
                    }
                    batch.push(n);
                }

                at += 1;
                if some_expansion {
                    last_filled = Some(at);
                }
                if !some_expansion && done {
                    self.layers.retire_shallowest();
                    at -= 1;
                    continue;
                }

                for n in batch.into_iter().flatten() {
                    let state = d.unpack(&self.pool.get(n).packed);
                    self.dump_expansion(d, &state, current_depth, self.pool.get(n).g);
                    self.expand(d, n, &state, at);
                }
                done = false;
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
    fn widening_sweeps_reach_a_goal() {
        let domain = Pancake::new(vec![2, 1, 0, 3, 4], CostModel::Unit);
        let mut engine = RectangleBeadSearch::new(Limit::none(), 1.0, 1.0, false, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("rectanglebead must find the goal");
        assert_eq!(domain.path_cost(&solution.ops), Some(solution.cost));
    }

    #[test]
    fn exponential_height_growth_still_terminates() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = RectangleBeadSearch::new(Limit::none(), 1.0, 2.0, true, false, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("rectanglebead must find the goal");
        assert!(domain.path_cost(&solution.ops).is_some());
    }
}
