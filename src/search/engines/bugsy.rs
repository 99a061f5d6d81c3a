use crate::collections::{HeapIndex, HeapOps, MinMaxHeap, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;
use std::time::Instant;

/// Utility-guided best-first search: priority is
/// `u = -(wf * f + wt * t)` where `t = timeper * d` and `timeper` is the
/// running mean wall time per expansion, re-estimated by a three-state
/// clock watcher. When the estimate changes, every open utility is
/// recomputed and the open list is re-heapified in one pass.
#[derive(Debug)]
pub struct Bugsy<D: Domain> {
    wf: f64,
    wt: f64,
    pool: NodePool<Node<D>>,
    open: MinMaxHeap<UtilityOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,

    // Nodes-per-second estimation.
    timeper: f64,
    resorts: u64,
    pertick: u64,
    nexp: u64,
    clock_state: ClockState,
    start_time: f64,
    last_tick: f64,
    epoch: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    WaitTick,
    ExpandSome,
    WaitExpand,
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
    u: f64,
    t: f64,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum UtilityOrder {}

impl<D: Domain> HeapOps<Node<D>> for UtilityOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.u != b.u {
            return a.u > b.u;
        }
        if a.t != b.t {
            return a.t < b.t;
        }
        if a.f != b.f {
            return a.f < b.f;
        }
        a.g > b.g
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

fn compute_util<D: Domain>(wf: f64, wt: f64, timeper: f64, node: &mut Node<D>) {
    node.t = timeper * node.d.into_inner();
    node.u = -(wf * node.f.into_inner() + wt * node.t);
}

impl<D: Domain> Bugsy<D> {
    /// `wf` and `wt` are the non-negative utility weights on solution
    /// cost and remaining search time.
    pub fn new(limit: Limit, wf: f64, wt: f64) -> Self {
        assert!(wf >= 0.0 && wt >= 0.0, "utility weights must be non-negative");
        Self {
            wf,
            wt,
            pool: NodePool::new(),
            open: MinMaxHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            timeper: 0.0,
            resorts: 0,
            pertick: 20,
            nexp: 0,
            clock_state: ClockState::WaitTick,
            start_time: 0.0,
            last_tick: 0.0,
            epoch: Instant::now(),
        }
    }

    fn walltime(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn update_time(&mut self) {
        self.nexp += 1;
        match self.clock_state {
            ClockState::WaitTick => {
                let now = self.walltime();
                if now <= self.last_tick {
                    return;
                }
                self.start_time = now;
                self.clock_state = ClockState::ExpandSome;
            }
            ClockState::ExpandSome => {
                if self.nexp < self.pertick {
                    return;
                }
                self.last_tick = self.walltime();
                self.clock_state = ClockState::WaitExpand;
            }
            ClockState::WaitExpand => {
                let now = self.walltime();
                if now <= self.last_tick {
                    return;
                }
                self.resort_open();
                self.timeper = (now - self.start_time) / self.nexp as f64;
                // 9/5 comes from the original utility-guided solver.
                self.pertick = self.nexp * 9 / 5;
                self.nexp = 0;
                self.start_time = now;
                self.clock_state = ClockState::ExpandSome;
            }
        }
    }

    fn resort_open(&mut self) {
        self.resorts += 1;
        for &id in self.open.ids() {
            compute_util(self.wf, self.wt, self.timeper, self.pool.get_mut(id));
        }
        self.open.reinit(&mut self.pool);
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
            self.stats.reopening();
            let (wf, wt, timeper) = (self.wf, self.wt, self.timeper);
            let node = self.pool.get_mut(dup);
            node.f = node.f - node.g + g;
            node.g = g;
            compute_util(wf, wt, timeper, node);
            node.parent = Some(parent);
            node.op = op;
            node.pop = edge.revop;
            self.open.push_or_update(&mut self.pool, dup);
        } else {
            let h = d.h(&edge.state);
            let mut node = Node {
                packed: packed.clone(),
                op,
                pop: edge.revop,
                parent: Some(parent),
                g,
                f: g + h,
                d: d.d(&edge.state),
                u: 0.0,
                t: 0.0,
                open_index: NO_INDEX,
            };
            compute_util(self.wf, self.wt, self.timeper, &mut node);
            let kid = self.pool.construct(node);
            self.closed.insert(packed, kid);
            self.open.push(&mut self.pool, kid);
        }
    }
}

impl<D: Domain> SearchEngine<D> for Bugsy<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();

        let packed0 = d.pack(&s0);
        let h0 = d.h(&s0);
        let mut root = Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: h0,
            d: d.d(&s0),
            u: 0.0,
            t: 0.0,
            open_index: NO_INDEX,
        };
        compute_util(self.wf, self.wt, self.timeper, &mut root);
        let root = self.pool.construct(root);
        self.closed.insert(packed0, root);
        self.open.push(&mut self.pool, root);

        self.last_tick = self.walltime();
        let mut solution = None;
        while !self.open.is_empty() && !self.limit.reached(&self.stats) {
            self.update_time();

            let n = self.open.pop_min(&mut self.pool).expect("non-empty open");
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
        // The open list is retained across searches: cleared, not rebuilt.
        self.open.clear(&mut self.pool);
        self.closed.clear();
        self.pool.reset();
        self.limit.restart();
        self.timeper = 0.0;
        self.clock_state = ClockState::WaitTick;
        self.pertick = 20;
        self.nexp = 0;
        self.resorts = 0;
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "wf", &self.wf)?;
        metrics::pair(out, "wt", &self.wt)?;
        metrics::pair(out, "final time per expand", &self.timeper)?;
        metrics::pair(out, "number of resorts", &self.resorts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn pure_cost_weighting_is_optimal_on_pancake() {
        // With wt = 0 the utility order collapses to f, so the first
        // goal popped is optimal here.
        let domain = Pancake::new(vec![4, 3, 2, 1, 0], CostModel::Unit);
        let mut engine = Bugsy::new(Limit::none(), 1.0, 0.0);
        let result = engine.search(&domain, domain.initial_state());
        assert_eq!(result.solution().expect("must solve").cost, cost(1.0));
    }

    #[test]
    fn time_weighting_still_reaches_a_goal() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = Bugsy::new(Limit::none(), 1.0, 100.0);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("must solve");
        assert!(domain.path_cost(&solution.ops).is_some());
    }

    #[test]
    fn reset_clears_the_estimator() {
        let domain = Pancake::new(vec![2, 1, 0], CostModel::Unit);
        let mut engine = Bugsy::new(Limit::none(), 1.0, 1.0);
        engine.search(&domain, domain.initial_state());
        engine.reset();
        let again = engine.search(&domain, domain.initial_state());
        assert!(again.solution().is_some());
    }
}
