use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::fmt::Debug;
use std::hash::Hash;
use std::io;

/// Costs, heuristic values, and distance estimates share one totally
/// ordered numeric type across the framework. Integer-cost domains embed
/// exactly.
pub type Cost = OrderedFloat<f64>;

/// Shorthand for building a [`Cost`] from a float literal.
pub fn cost(value: f64) -> Cost {
    OrderedFloat(value)
}

/// Applicable operators for one state. Fan-out is small for every bundled
/// domain, so the list usually lives on the stack.
pub type OperatorList<O> = SmallVec<[O; 16]>;

/// One state transition: the successor state together with the cost of
/// the step and the operator (and cost) that would undo it. `revop` is
/// what engines match against to suppress immediate reversals.
#[derive(Debug)]
pub struct Edge<D: Domain + ?Sized> {
    pub state: D::State,
    pub cost: Cost,
    pub revop: D::Oper,
    pub revcost: Cost,
}

/// The contract every problem plugs in through. Engines are generic over
/// this trait; they pack states into node records, store the packed form
/// in the closed table (hashing and equality come from the `Packed`
/// bounds), and unpack again for expansion.
pub trait Domain {
    /// Unpacked representation used during expansion.
    type State: Clone + Debug;
    /// Stored representation, the hash/equality key for duplicate
    /// detection.
    type Packed: Clone + Eq + Hash + Debug;
    /// Operator identifier. [`Domain::NOP`] denotes "no operator" and is
    /// used on the root and as "no reverse".
    type Oper: Copy + Eq + Debug;

    const NOP: Self::Oper;

    fn initial_state(&self) -> Self::State;

    /// Heuristic cost-to-go estimate, non-negative.
    fn h(&self, state: &Self::State) -> Cost;

    /// Estimated number of remaining edges to a goal, non-negative. Used
    /// for tie-breaking and error correction, never for bounding.
    fn d(&self, state: &Self::State) -> Cost;

    fn is_goal(&self, state: &Self::State) -> bool;

    /// Every operator applicable in `state`. Duplicate successors are the
    /// engine's problem.
    fn operators(&self, state: &Self::State) -> OperatorList<Self::Oper>;

    /// Apply `op` to `state`, yielding the successor edge. For every
    /// reversible operator, `edge(edge(s, op).state, revop).state`
    /// packs equal to `s`.
    fn edge(&self, state: &Self::State, op: Self::Oper) -> Edge<Self>;

    fn pack(&self, state: &Self::State) -> Self::Packed;

    fn unpack(&self, packed: &Self::Packed) -> Self::State;

    fn dump_state(&self, out: &mut dyn io::Write, state: &Self::State) -> io::Result<()>;

    /// Re-apply `ops` from a fresh initial state and return the summed
    /// cost, or `None` if the sequence does not end in a goal. Engines use
    /// this to verify reconstructed solutions.
    fn path_cost(&self, ops: &[Self::Oper]) -> Option<Cost> {
        let mut state = self.initial_state();
        let mut total = cost(0.0);
        for &op in ops {
            let edge = self.edge(&state, op);
            total += edge.cost;
            state = edge.state;
        }
        self.is_goal(&state).then_some(total)
    }
}
