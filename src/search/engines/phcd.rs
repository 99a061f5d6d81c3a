use crate::collections::{BinHeap, HeapIndex, HeapOps, NodeId, NodePool, NO_INDEX};
use crate::search::engines::SearchEngine;
use crate::search::{
    cost, extract_solution, metrics, ClosedList, Cost, Domain, Limit, PathNode, SearchResult,
    SearchStats,
};
use std::io;
use std::io::Write;
use std::mem::size_of;

/// Distance-guided parallel hill climbing: slots climb on
/// `fd = depth + d` with `f` as the tie-break, the best child is chosen
/// during expansion rather than through a candidate queue, and the
/// closed table records only nodes that actually enter the beam. Stops
/// at the end of the first round that produced an incumbent.
#[derive(Debug)]
pub struct ParallelHillClimbingD<D: Domain> {
    width: usize,
    dropdups: bool,
    dump: bool,
    pool: NodePool<Node<D>>,
    open: BinHeap<FdOrder, Node<D>>,
    closed: ClosedList<D::Packed>,
    stats: SearchStats,
    limit: Limit,
    cand: Option<NodeId>,
}

#[derive(Debug)]
struct Node<D: Domain> {
    packed: D::Packed,
    op: D::Oper,
    pop: D::Oper,
    parent: Option<NodeId>,
    g: Cost,
    f: Cost,
    gd: Cost,
    fd: Cost,
    open_index: HeapIndex,
}

#[derive(Debug)]
enum FdOrder {}

impl<D: Domain> HeapOps<Node<D>> for FdOrder {
    fn before(a: &Node<D>, b: &Node<D>) -> bool {
        if a.fd == b.fd {
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

impl<D: Domain> ParallelHillClimbingD<D> {
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
        }
    }

    fn dump_and_clear(&mut self, d: &D, beam: &[Option<NodeId>], depth: u64) {
        if self.dump {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "depth: {depth}");
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

    /// Generate one kid; it either becomes the slot's best child so far
    /// (displacing the previous best into open), spills into open, or
    /// dies as a duplicate.
    fn consider_kid(
        &mut self,
        d: &D,
        parent: NodeId,
        state: &D::State,
        op: D::Oper,
        best_child: &mut Option<NodeId>,
    ) {
        let edge = d.edge(state, op);
        let (g, gd) = {
            let p = self.pool.get(parent);
            (p.g + edge.cost, p.gd + cost(1.0))
        };
        let packed = d.pack(&edge.state);
        let kid = self.pool.construct(Node {
            packed: packed.clone(),
            op,
            pop: edge.revop,
            parent: Some(parent),
            g,
            f: g + d.h(&edge.state),
            gd,
            fd: gd + d.d(&edge.state),
            open_index: NO_INDEX,
        });

        if let Some(dup) = self.closed.find(&packed) {
            self.stats.duplicate();
            if !self.dropdups && g < self.pool.get(dup).g {
                self.stats.reopening();
                let (f, fd) = {
                    let k = self.pool.get(kid);
                    (k.f, k.fd)
                };
                let node = self.pool.get_mut(dup);
                node.f = f;
                node.g = g;
                node.fd = fd;
                node.gd = gd;
                node.parent = Some(parent);
                node.op = op;
                node.pop = edge.revop;
            } else {
                self.pool.destruct(kid);
                return;
            }
        }

        let improves = match self.cand {
            None => true,
            Some(cand) => g < self.pool.get(cand).g,
        };
        if d.is_goal(&edge.state) && improves {
            self.cand = Some(kid);
            return;
        }

        let displaces = match *best_child {
            None => true,
            Some(best) => FdOrder::before(self.pool.get(kid), self.pool.get(best)),
        };
        if displaces {
            if let Some(previous) = best_child.take() {
                self.open.push(&mut self.pool, previous);
            }
            *best_child = Some(kid);
        } else {
            self.open.push(&mut self.pool, kid);
        }
    }
}

impl<D: Domain> SearchEngine<D> for ParallelHillClimbingD<D> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D> {
        self.stats = SearchStats::start();
        self.limit.restart();
        self.cand = None;

        let mut beam: Vec<Option<NodeId>> = vec![None; self.width];
        let root = self.pool.construct(Node {
            packed: d.pack(&s0),
            op: D::NOP,
            pop: D::NOP,
            parent: None,
            g: cost(0.0),
            f: d.h(&s0),
            gd: cost(0.0),
            fd: d.d(&s0),
            open_index: NO_INDEX,
        });
        beam[0] = Some(root);

        let mut depth = 0u64;
        let mut done = false;
        while !done && !self.limit.reached(&self.stats) {
            depth += 1;

            let mut filled = 0;
            for slot in 0..self.width {
                if self.limit.reached(&self.stats) {
                    break;
                }
                let Some(n) = beam[slot] else {
                    break;
                };

                self.stats.expansion();
                let state = d.unpack(&self.pool.get(n).packed);
                let pop = self.pool.get(n).pop;
                let mut best_child = None;
                for op in d.operators(&state) {
                    if op == pop {
                        continue;
                    }
                    self.stats.generation();
                    self.consider_kid(d, n, &state, op, &mut best_child);
                }

                beam[filled] = best_child;
                if let Some(bc) = best_child {
                    let packed = self.pool.get(bc).packed.clone();
                    self.closed.insert(packed, bc);
                    filled += 1;
                }
            }

            if filled == 0 {
                done = true;
            }

            let mut slot = filled;
            while !done && !self.open.is_empty() && slot < self.width {
                let n = self.open.pop(&mut self.pool).expect("non-empty open");
                let packed = self.pool.get(n).packed.clone();
                self.closed.insert(packed, n);
                beam[slot] = Some(n);
                slot += 1;
            }

            self.dump_and_clear(d, &beam, depth);

            if self.cand.is_some() {
                done = true;
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
