use crate::collections::{NodeId, NodePool};
use crate::search::{Cost, Domain};
use tracing::warn;

/// The slice of a node record the harness needs to walk a solution back
/// to the root. Every engine's node type implements this.
pub trait PathNode<D: Domain> {
    fn packed(&self) -> &D::Packed;
    fn op(&self) -> D::Oper;
    fn parent(&self) -> Option<NodeId>;
    fn g(&self) -> Cost;
}

/// A reconstructed solution: the operator sequence from the root, the
/// states along it, and the cost the engine reported for the goal node.
#[derive(Debug, Clone)]
pub struct Solution<D: Domain> {
    pub cost: Cost,
    pub ops: Vec<D::Oper>,
    pub path: Vec<D::State>,
}

impl<D: Domain> Solution<D> {
    pub fn length(&self) -> usize {
        self.ops.len()
    }
}

#[derive(Debug, Clone)]
pub enum SearchResult<D: Domain> {
    Solved(Solution<D>),
    /// The reachable space was exhausted without finding a goal. For the
    /// incomplete engines this does not prove unsolvability.
    Exhausted,
    /// A time, expansion, or memory limit fired before a goal was
    /// accepted.
    LimitReached,
}

impl<D: Domain> SearchResult<D> {
    pub fn solution(&self) -> Option<&Solution<D>> {
        match self {
            SearchResult::Solved(solution) => Some(solution),
            _ => None,
        }
    }
}

/// Walk parent links from `goal` to the root, then re-apply the operator
/// sequence on a fresh initial state to verify the reported cost.
pub fn extract_solution<D, N>(domain: &D, pool: &NodePool<N>, goal: NodeId) -> Solution<D>
where
    D: Domain,
    N: PathNode<D>,
{
    let cost = pool.get(goal).g();
    let mut ops = Vec::new();
    let mut path = Vec::new();
    let mut current = Some(goal);
    while let Some(id) = current {
        let node = pool.get(id);
        path.push(domain.unpack(node.packed()));
        if node.parent().is_some() {
            ops.push(node.op());
        }
        current = node.parent();
    }
    ops.reverse();
    path.reverse();

    match domain.path_cost(&ops) {
        Some(total) => {
            if total != cost {
                warn!(
                    reported = cost.into_inner(),
                    replayed = total.into_inner(),
                    "solution cost mismatch"
                );
                debug_assert_eq!(total, cost, "replayed path cost disagrees with goal g");
            }
        }
        None => {
            warn!("reconstructed operator sequence does not reach a goal");
            debug_assert!(false, "reconstructed path must end in a goal");
        }
    }

    Solution { cost, ops, path }
}
