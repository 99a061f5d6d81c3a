use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::mem::size_of;

/// Smoothing prior: the error means behave as if this many error-free
/// expansions preceded the search, damping early noise.
const IMAGINED_EXPANSIONS: f64 = 10.0;
/// Keeps `derror` strictly below one so `d / (1 - derror)` stays finite.
const ERROR_EPSILON: f64 = 1e-9;

/// Anytime Explicit-Estimation Search: bounded-suboptimal anytime search
/// over three synchronized orderings — cleanup by `f` (the lower bound),
/// open by the corrected `f_hat`, and focal, the subset of open within
/// `weight * fhatmin`, by the corrected `d_hat`. Heuristic and distance
/// errors are learned online from the best child of each expansion.
///
/// This is the binary-heap variant: focal membership is refreshed when a
/// node is pushed or updated, with no rescan sweep when `fhatmin` moves.
#[derive(Debug)]
pub struct AnytimeEes<D: Domain> {
    weight: f64,
    dropdups: bool,
    pool: NodePool<Node<D>>,
    /// Ordered by `f_hat`; holds the whole frontier.
    open: BinHeap<FHatOrder, Node<D>>,
    /// Ordered by `d_hat`; the focal subset of open.
    focal: BinHeap<DHatOrder, Node<D>>,
    /// Ordered by `f`; bounds any future solution cost.
    cleanup: BinHeap<FOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    herror: f64,
    derror: f64,
    cand: Option<NodeId>,
    pub incumbents: Vec<Incumbent>,
}

/// One row of the incumbent stream, kept for inspection as well as
/// printed.
#[derive(Debug, Clone, Copy)]
pub struct Incumbent {
    pub num: u64,
    pub expanded: u64,
    pub generated: u64,
    pub bound: f64,
    pub cost: f64,
    pub wall: f64,
    /// `f` at the front of cleanup when this incumbent was recorded;
    /// `cost <= bound * lower_bound` is the suboptimality guarantee.
    pub lower_bound: f64,
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    op: D::Oper,
    pop: D::Oper,
    parent: Option<NodeId>,
    g: Cost,
    h: Cost,
    f: Cost,
    d: Cost,
    h_hat: f64,
    d_hat: f64,
    f_hat: f64,
    open_index: HeapIndex,
    focal_index: HeapIndex,
    cleanup_index: HeapIndex,
}

#[derive(Debug)]
enum FOrder {}

impl<D: Domain> HeapOps<Node<D>> for FOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.f == b.f {
            if a.d == b.d {
                return a.g > b.g;
            }
            return a.d < b.d;
        }
        a.f < b.f
    }
    fn index(node: &Node<D>) -> HeapIndex {
        node.cleanup_index
    }
    fn set_index(node: &mut Node<D>, index: HeapIndex) {
        node.cleanup_index = index;
    }
}

#[derive(Debug)]
enum DHatOrder {}

impl<D: Domain> HeapOps<Node<D>> for DHatOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.d_hat == b.d_hat {
            if a.f_hat == b.f_hat {
                return a.g > b.g;
            }
            return a.f_hat < b.f_hat;
        }
        a.d_hat < b.d_hat
    }
    fn index(node: &Node<D>) -> HeapIndex {
        node.focal_index
    }
    fn set_index(node: &mut Node<D>, index: HeapIndex) {
        node.focal_index = index;
    }
}

#[derive(Debug)]
enum FHatOrder {}

impl<D: Domain> HeapOps<Node<D>> for FHatOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.f_hat == b.f_hat {
            if a.d == b.d {
                return a.g > b.g;
            }
            return a.d < b.d;
        }
        a.f_hat < b.f_hat
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

impl<D: Domain> AnytimeEes<D> {
    /// `weight` is the initial suboptimality bound, at least one.
    pub fn new(limit: Limit, weight: f64, dropdups: bool) -> Self {
        assert!(weight >= 1.0, "the starting weight must be at least 1");
        Self {
            weight,
            dropdups,
            pool: NodePool::new(),
            open: BinHeap::new(),
            focal: BinHeap::new(),
            cleanup: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            herror: 0.0,
            derror: 0.0,
            cand: None,
            incumbents: Vec::new(),
        }
    }

    fn d_hat(&self, d: f64) -> f64 {
        d / (1.0 - self.derror)
    }

    fn h_hat(&self, h: f64, d_hat: f64) -> f64 {
        h + self.herror * d_hat
    }

    /// Preferred in order: focal's front, open's front (each while its
    /// `f_hat` stays within `weight` times the best admissible `f`), and
    /// cleanup's front as the fallback. The choice leaves all three
    /// structures.
    fn select_node(&mut self) -> NodeId {
        let best_f = self.cleanup.peek().expect("cleanup empty on selection");
        let bound = self.weight * self.pool.get(best_f).f.into_inner();

        if let Some(best_d_hat) = self.focal.peek() {
            if self.pool.get(best_d_hat).f_hat <= bound {
                self.focal.pop(&mut self.pool);
                self.open.remove_node(&mut self.pool, best_d_hat);
                self.cleanup.remove_node(&mut self.pool, best_d_hat);
                return best_d_hat;
            }
        }

        let best_f_hat = self.open.peek().expect("open empty on selection");
        if self.pool.get(best_f_hat).f_hat <= bound {
            self.open.pop(&mut self.pool);
            self.cleanup.remove_node(&mut self.pool, best_f_hat);
            if self.pool.get(best_f_hat).focal_index >= 0 {
                self.focal.remove_node(&mut self.pool, best_f_hat);
            }
            return best_f_hat;
        }

        self.cleanup.pop(&mut self.pool);
        self.open.remove_node(&mut self.pool, best_f);
        if self.pool.get(best_f).focal_index >= 0 {
            self.focal.remove_node(&mut self.pool, best_f);
        }
        best_f
    }

    fn goal_found(&mut self, n: NodeId) {
        let improves = match self.cand {
            None => true,
            Some(cand) => self.pool.get(n).g < self.pool.get(cand).g,
        };
        if !improves {
            return;
        }
        self.cand = Some(n);
        let cand_g = self.pool.get(n).g.into_inner();
        // Tighten the bound to what the incumbent actually proves.
        let lower_bound = match self.cleanup.peek() {
            Some(front) => self.pool.get(front).f.into_inner(),
            None => cand_g,
        };
        self.weight = if self.cleanup.is_empty() {
            1.0
        } else {
            cand_g / lower_bound
        };
        let incumbent = Incumbent {
            num: self.incumbents.len() as u64 + 1,
            expanded: self.stats.expanded,
            generated: self.stats.generated,
            bound: self.weight,
            cost: cand_g,
            wall: self.stats.elapsed_seconds(),
            lower_bound,
        };
        self.incumbents.push(incumbent);
        let mut out = io::stdout().lock();
        let _ = metrics::row(
            &mut out,
            "incumbent",
            &[
                metrics::Value::Count(incumbent.num),
                metrics::Value::Count(incumbent.expanded),
                metrics::Value::Count(incumbent.generated),
                metrics::Value::Real(incumbent.bound),
                metrics::Value::Real(incumbent.cost),
                metrics::Value::Real(incumbent.wall),
            ],
        );
    }

    fn cand_g(&self) -> Option<Cost> {
        self.cand.map(|cand| self.pool.get(cand).g)
    }

    fn expand(&mut self, d: &D, n: NodeId, state: &D::State) {
        if let Some(cand_g) = self.cand_g() {
            if self.pool.get(n).f > cand_g {
                return;
            }
        }

        self.stats.expansion();
        let pop = self.pool.get(n).pop;
        let (parent_f, parent_d) = {
            let node = self.pool.get(n);
            (node.f, node.d)
        };

        // Best child by h_hat, for the online error estimate.
        let mut best_kid: Option<NodeId> = None;

        for op in d.operators(state) {
            if op == pop {
                continue;
            }
            self.stats.generation();

            let edge = d.edge(state, op);
            let g = self.pool.get(n).g + edge.cost;
            let h = d.h(&edge.state);
            let f = g + h;
            if self.cand_g().is_some_and(|cand_g| f >= cand_g) {
                continue;
            }
            let kid_d = d.d(&edge.state);
            let packed = d.pack(&edge.state);

            let placed = if let Some(dup) = self.closed.find(&packed) {
                self.stats.duplicate();
                if self.dropdups || g >= self.pool.get(dup).g {
                    continue;
                }
                if self.pool.get(dup).open_index < 0 {
                    self.stats.reopening();
                }
                let d_hat = self.d_hat(self.pool.get(dup).d.into_inner());
                let h_hat = self.h_hat(self.pool.get(dup).h.into_inner(), d_hat);
                {
                    let node = self.pool.get_mut(dup);
                    node.f = node.f - node.g + g;
                    node.g = g;
                    node.d_hat = d_hat;
                    node.h_hat = h_hat;
                    node.f_hat = g.into_inner() + h_hat;
                    node.parent = Some(n);
                    node.op = op;
                    node.pop = edge.revop;
                }
                self.open.push_or_update(&mut self.pool, dup);
                self.cleanup.push_or_update(&mut self.pool, dup);
                self.refresh_focal(dup);
                dup
            } else {
                let d_hat = self.d_hat(kid_d.into_inner());
                let h_hat = self.h_hat(h.into_inner(), d_hat);
                let kid = self.pool.construct(Node {
                    packed: packed.clone(),
                    op,
                    pop: edge.revop,
                    parent: Some(n),
                    g,
                    h,
                    f,
                    d: kid_d,
                    h_hat,
                    d_hat,
                    f_hat: g.into_inner() + h_hat,
                    open_index: NO_INDEX,
                    focal_index: NO_INDEX,
                    cleanup_index: NO_INDEX,
                });
                // Goal nodes stay out of closed; they are recorded, not
                // expanded, so nothing deduplicates against them.
                if !d.is_goal(&edge.state) {
                    self.closed.insert(packed, kid);
                }
                self.open.push(&mut self.pool, kid);
                self.cleanup.push(&mut self.pool, kid);
                self.refresh_focal(kid);
                kid
            };

            let replace = match best_kid {
                None => true,
                Some(best) => self.pool.get(placed).h_hat < self.pool.get(best).h_hat,
            };
            if replace {
                best_kid = Some(placed);
            }
        }

        if let Some(best) = best_kid {
            let best = self.pool.get(best);
            let herr = (best.f - parent_f).into_inner().max(0.0);
            let derr = ((best.d.into_inner() + 1.0) - parent_d.into_inner())
                .clamp(0.0, 1.0 - ERROR_EPSILON);
            // Count-weighted means over every expansion so far plus the
            // imagined error-free prior.
            let expansions = self.stats.expanded as f64;
            let past_h = self.herror * (expansions + IMAGINED_EXPANSIONS - 1.0);
            self.herror = (herr + past_h) / (expansions + IMAGINED_EXPANSIONS);
            let past_d = self.derror * (expansions + IMAGINED_EXPANSIONS - 1.0);
            self.derror = (derr + past_d) / (expansions + IMAGINED_EXPANSIONS);
        }
    }

    /// Admit into focal iff within the bound of the current best `f_hat`
    /// in open; evict if present but no longer admissible.
    fn refresh_focal(&mut self, id: NodeId) {
        let fhatmin = self
            .open
            .peek()
            .map(|front| self.pool.get(front).f_hat)
            .expect("refresh against an empty open");
        let node_f_hat = self.pool.get(id).f_hat;
        if node_f_hat <= self.weight * fhatmin {
            self.focal.push_or_update(&mut self.pool, id);
        } else if self.pool.get(id).focal_index >= 0 {
            self.focal.remove_node(&mut self.pool, id);
        }
    }
}

impl<D: Domain> SearchEngine<D> for AnytimeEes<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;
        self.incumbents.clear();

        let packed0 = d.pack(&s0);
        let h0 = d.h(&s0);
        let d0 = d.d(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            h: h0,
            f: h0,
            d: d0,
            h_hat: h0.into_inner(),
            d_hat: d0.into_inner(),
            f_hat: h0.into_inner(),
            open_index: NO_INDEX,
            focal_index: NO_INDEX,
            cleanup_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);
        self.open.push(&mut self.pool, root);
        self.focal.push(&mut self.pool, root);
        self.cleanup.push(&mut self.pool, root);

        {
            let mut out = io::stdout().lock();
            let _ = metrics::row_header(
                &mut out,
                "incumbent",
                &[
                    "num",
                    "nodes expanded",
                    "nodes generated",
                    "solution bound",
                    "solution cost",
                    "wall time",
                ],
            );
        }

        while !self.open.is_empty() && !self.limit.reached(&self.stats) {
            let n = self.select_node();
            let state = d.unpack(&self.pool.get(n).packed);

            if d.is_goal(&state) {
                self.goal_found(n);
                continue;
            }

            self.expand(d, n, &state);
        }
        self.stats.finalise();

        let outcome = match self.cand {
            Some(cand) => SearchResult::Solved(extract_solution(d, &self.pool, cand)),
            None if self.limit.was_tripped() => SearchResult::LimitReached,
            None => SearchResult::Exhausted,
        };
        outcome
    }

    fn reset(&mut self) {
        self.open.clear(&mut self.pool);
        self.focal.clear(&mut self.pool);
        self.cleanup.clear(&mut self.pool);
        self.closed.clear();
        self.pool.reset();
        self.limit.restart();
        self.herror = 0.0;
        self.derror = 0.0;
        self.cand = None;
        self.incumbents.clear();
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "weight", &self.weight)?;
        metrics::pair(out, "h error last", &self.herror)?;
        metrics::pair(out, "d error last", &self.derror)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{CostModel, Pancake, Tiles};
    use crate::search::engines::UniformCost;

    fn optimal_cost<D: Domain>(d: &D) -> Cost {
        let mut ucs = UniformCost::new(Limit::none());
        ucs.search(d, d.initial_state())
            .solution()
            .expect("ucs baseline must solve")
            .cost
    }

    #[test]
    fn incumbents_respect_the_advertised_bound() {
        let text = crate::test_utils::TILES_EASY8_TEXT;
        let domain =
            Tiles::from_reader(&mut text.as_bytes(), CostModel::Unit).expect("parse failed");
        let optimal = optimal_cost(&domain);

        let mut engine = AnytimeEes::new(Limit::none(), 3.0, false);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("aees must solve the puzzle");

        assert!(!engine.incumbents.is_empty(), "no incumbent rows emitted");
        for incumbent in &engine.incumbents {
            assert!(
                incumbent.cost <= 3.0 * optimal.into_inner() + 1e-9,
                "incumbent {} worse than the starting bound",
                incumbent.cost
            );
            assert!(
                incumbent.cost <= incumbent.bound * incumbent.lower_bound + 1e-9,
                "incumbent violates its own bound"
            );
        }
        // Run to exhaustion, so the final incumbent is optimal.
        assert_eq!(solution.cost, optimal);
    }

    #[test]
    fn weight_tightens_monotonically() {
        let domain = Pancake::new(vec![3, 1, 4, 2, 0], CostModel::Unit);
        let mut engine = AnytimeEes::new(Limit::none(), 2.5, false);
        engine.search(&domain, domain.initial_state());
        let bounds: Vec<f64> = engine.incumbents.iter().map(|i| i.bound).collect();
        for pair in bounds.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "weight increased: {bounds:?}");
        }
    }

    #[test]
    fn dropdups_still_solves() {
        let domain = Pancake::new(vec![2, 0, 3, 1, 4], CostModel::Unit);
        let mut engine = AnytimeEes::new(Limit::none(), 2.0, true);
        let result = engine.search(&domain, domain.initial_state());
        let solution = result.solution().expect("aees must solve");
        assert!(domain.path_cost(&solution.ops).is_some());
    }
}
