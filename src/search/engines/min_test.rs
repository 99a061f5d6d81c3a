use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, metrics, ClosedList, Cost, Domain, Limit, SearchResult, SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Local-minimum instrumentation: drains the whole space in deepest-basin
/// order (`mindepth` descending, `h` ascending), tracking the running
/// high-water mark of `h`. A popped node below its recorded mark sits in
/// a local minimum; consecutive such pops form a basin whose sizes,
/// count, maximum, and mean are reported to stderr when open drains.
#[derive(Debug)]
pub struct MinTest<D: Domain> {
    dump: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<BasinOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    high_water: Cost,
    pub basins: BasinStats,
}

/// The measurements this engine exists to produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasinStats {
    pub count: u64,
    pub max_size: u64,
    pub total: u64,
}

impl BasinStats {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    pop: D::Oper,
    h: Cost,
    /// High-water mark of `h` when this node was generated.
    hwm: Cost,
    /// Consecutive ancestors already below the mark.
    mindepth: u32,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum BasinOrder {}

impl<D: Domain> HeapOps<Node<D>> for BasinOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.mindepth == b.mindepth {
            return a.h < b.h;
        }
        a.mindepth > b.mindepth
    }
    fn index(node: &Node<D>) -> HeapIndex {
        node.open_index
    }
    fn set_index(node: &mut Node<D>, index: HeapIndex) {
        node.open_index = index;
    }
}

impl<D: Domain> MinTest<D> {
    pub fn new(limit: Limit, dump: bool) -> Self {
        Self {
            dump,
            pool: NodePool::new(),
            open: BinHeap::new(),
            closed: ClosedList::new(),
            stats: SearchStats::start(),
            limit,
            high_water: cost(0.0),
            basins: BasinStats::default(),
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
        let h = d.h(&edge.state);
        let packed = d.pack(&edge.state);
        let mindepth = if h < self.high_water {
            self.pool.get(parent).mindepth + 1
        } else {
            0
        };

        if let Some(dup) = self.closed.find(&packed) {
            self.stats.duplicate();
            if self.open.contains(self.pool.get(dup)) {
                let index = self.open.pre_update(self.pool.get(dup));
                let node = self.pool.get_mut(dup);
                node.mindepth = node.mindepth.max(mindepth);
                self.open.post_update(&mut self.pool, index);
            }
        } else {
            let kid = self.pool.construct(Node {
                packed: packed.clone(),
                pop: edge.revop,
                h,
                hwm: self.high_water.max(h),
                mindepth,
                open_index: NO_INDEX,
            });
            self.closed.insert(packed, kid);
            self.open.push(&mut self.pool, kid);
        }
    }
}

impl<D: Domain> SearchEngine<D> for MinTest<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.high_water = cost(0.0);
        self.basins = BasinStats::default();

        let packed0 = d.pack(&s0);
        let root = self.pool.construct(Node {
            packed: packed0.clone(),
            pop: D::NOP,
            h: d.h(&s0),
            hwm: cost(0.0),
            mindepth: 0,
            open_index: NO_INDEX,
        });
        self.closed.insert(packed0, root);
        self.open.push(&mut self.pool, root);

        let mut err = io::stderr().lock();
        let _ = writeln!(err, "Local min sizes:");
        let mut basin_size = 0u64;
        let mut basin_hwm = cost(0.0);
        let mut basin_start_expansion = 0u64;

        while !self.open.is_empty() && !self.limit.reached(&self.stats) {
            let n = self.open.pop(&mut self.pool).expect("non-empty open");
            let state = d.unpack(&self.pool.get(n).packed);
            let (h, hwm, mindepth) = {
                let node = self.pool.get(n);
                (node.h, node.hwm, node.mindepth)
            };

            if h < hwm {
                // Entering (or continuing) a basin below the mark.
                if mindepth == 1 {
                    if basin_size > 0 {
                        let _ = writeln!(
                            err,
                            "size: {} hwm: {} expanded: {}",
                            basin_size, basin_hwm, basin_start_expansion
                        );
                        self.basins.count += 1;
                        self.basins.total += basin_size;
                        self.basins.max_size = self.basins.max_size.max(basin_size);
                        basin_size = 0;
                    }
                    basin_start_expansion = self.stats.expanded;
                }
                basin_hwm = self.high_water;
                basin_size += 1;
            } else if h > self.high_water {
                self.high_water = h;
            }

            if self.dump {
                let _ = writeln!(err, "expanded state:");
                let _ = d.dump_state(&mut err, &state);
            }

            self.expand(d, n, &state);
        }

        if basin_size > 0 {
            let _ = writeln!(
                err,
                "size: {} hwm: {} expanded: {}",
                basin_size, basin_hwm, basin_start_expansion
            );
            self.basins.count += 1;
            self.basins.total += basin_size;
            self.basins.max_size = self.basins.max_size.max(basin_size);
        }

        let _ = writeln!(err, "local min count: {}", self.basins.count);
        let _ = writeln!(err, "max local min size: {}", self.basins.max_size);
        let _ = writeln!(err, "mean local min size: {:.2}", self.basins.mean());
        let _ = writeln!(err, "total nodes in local minima: {}", self.basins.total);
        drop(err);
        self.stats.finalise();

        // Instrumentation only: the run never reports a plan.
        if self.limit.was_tripped() {
            SearchResult::LimitReached
        } else {
            SearchResult::Exhausted
        }
    }

    fn reset(&mut self) {
        self.open.clear(&mut self.pool);
        self.closed.clear();
        self.pool.reset();
        self.limit.restart();
        self.high_water = cost(0.0);
        self.basins = BasinStats::default();
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.closed.report(out)?;
        metrics::pair(out, "open list type", &self.open.kind())?;
        metrics::pair(out, "node size", &size_of::<Node<D>>())?;
        metrics::pair(out, "local min count", &self.basins.count)?;
        metrics::pair(out, "max local min size", &self.basins.max_size)?;
        metrics::pair(out, "total nodes in local minima", &self.basins.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{Blocksworld, CostModel, Pancake};

    #[test]
    fn drains_a_small_space_completely() {
        let domain = Pancake::new(vec![2, 0, 1], CostModel::Unit);
        let mut engine = MinTest::new(Limit::none(), false);
        let result = engine.search(&domain, domain.initial_state());
        assert!(matches!(result, SearchResult::Exhausted));
        // Every distinct permutation is reachable and visited once.
        assert_eq!(engine.stats().expanded, 6);
    }

    #[test]
    fn basin_totals_are_consistent() {
        let domain = Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0]);
        let mut engine = MinTest::new(Limit::none(), false);
        engine.search(&domain, domain.initial_state());
        let basins = engine.basins;
        assert!(basins.max_size <= basins.total);
        assert!(basins.count == 0 || basins.mean() >= 1.0);
    }
}
