use crate::domains::{malformed, CostModel, ParseError};
use crate::search::{cost, Cost, Domain, Edge, OperatorList};
use itertools::Itertools;
use std::io;

/// The pancake-sorting puzzle: a permutation of `0..n`, where operator
/// `k` flips the prefix `0..=k`. The goal is the identity permutation.
/// The heuristic is the gap count; under the `heavy` cost model a flip
/// costs the weight of the lifted top cake plus one and each gap is
/// weighted by the lighter cake beside it.
#[derive(Debug)]
pub struct Pancake {
    init: Vec<u8>,
    heavy: bool,
}

/// Cached heuristic values ride along with the permutation so engines
/// evaluating `h` and `d` per generated kid pay nothing extra.
#[derive(Debug, Clone)]
pub struct PancakeState {
    cakes: Vec<u8>,
    h: Cost,
    d: Cost,
}

impl Pancake {
    pub fn new(init: Vec<u8>, cost_model: CostModel) -> Self {
        Self {
            init,
            heavy: cost_model == CostModel::Heavy,
        }
    }

    pub fn from_reader(reader: &mut dyn io::BufRead, cost_model: CostModel) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut numbers = text.split_whitespace().map(|token| {
            token
                .parse::<usize>()
                .map_err(|_| malformed(format!("expected an integer, got {token:?}")))
        });
        let ncakes = numbers
            .next()
            .ok_or_else(|| malformed("missing cake count"))??;
        if ncakes < 2 {
            return Err(malformed("need at least two cakes"));
        }
        let init: Vec<u8> = numbers
            .take(ncakes)
            .map(|n| n.map(|v| v as u8))
            .collect::<Result<_, _>>()?;
        if init.len() != ncakes {
            return Err(malformed("fewer cakes than the declared count"));
        }
        let mut seen = vec![false; ncakes];
        for &cake in &init {
            if (cake as usize) >= ncakes || seen[cake as usize] {
                return Err(malformed("cakes must form a permutation of 0..n"));
            }
            seen[cake as usize] = true;
        }
        Ok(Self::new(init, cost_model))
    }

    fn ncakes(&self) -> usize {
        self.init.len()
    }

    /// Is there a gap between positions `at` and `at + 1`? The last
    /// position has a gap unless it holds the largest cake.
    fn gap(cakes: &[u8], at: usize) -> bool {
        if at == cakes.len() - 1 {
            cakes[at] as usize != cakes.len() - 1
        } else {
            cakes[at].abs_diff(cakes[at + 1]) != 1
        }
    }

    fn evaluate(&self, cakes: &[u8]) -> (Cost, Cost) {
        let mut h = 0.0;
        let mut d = 0.0;
        for at in 0..cakes.len() {
            if !Self::gap(cakes, at) {
                continue;
            }
            d += 1.0;
            h += if self.heavy {
                let lighter = if at == cakes.len() - 1 {
                    cakes[at]
                } else {
                    cakes[at].min(cakes[at + 1])
                };
                lighter as f64 + 1.0
            } else {
                1.0
            };
        }
        (cost(h), cost(d))
    }

    fn flip_cost(&self, cakes: &[u8]) -> Cost {
        if self.heavy {
            cost(cakes[0] as f64 + 1.0)
        } else {
            cost(1.0)
        }
    }

    fn state_for(&self, cakes: Vec<u8>) -> PancakeState {
        let (h, d) = self.evaluate(&cakes);
        PancakeState { cakes, h, d }
    }
}

impl Domain for Pancake {
    type State = PancakeState;
    type Packed = Vec<u8>;
    type Oper = usize;

    const NOP: usize = usize::MAX;

    fn initial_state(&self) -> PancakeState {
        self.state_for(self.init.clone())
    }

    fn h(&self, state: &PancakeState) -> Cost {
        state.h
    }

    fn d(&self, state: &PancakeState) -> Cost {
        state.d
    }

    fn is_goal(&self, state: &PancakeState) -> bool {
        state.h == cost(0.0)
    }

    fn operators(&self, _state: &PancakeState) -> OperatorList<usize> {
        (1..self.ncakes()).collect()
    }

    fn edge(&self, state: &PancakeState, op: usize) -> Edge<Self> {
        debug_assert!(op >= 1 && op < self.ncakes());
        let step_cost = self.flip_cost(&state.cakes);
        let mut cakes = state.cakes.clone();
        cakes[0..=op].reverse();
        let revcost = self.flip_cost(&cakes);
        Edge {
            state: self.state_for(cakes),
            cost: step_cost,
            revop: op,
            revcost,
        }
    }

    fn pack(&self, state: &PancakeState) -> Vec<u8> {
        state.cakes.clone()
    }

    fn unpack(&self, packed: &Vec<u8>) -> PancakeState {
        self.state_for(packed.clone())
    }

    fn dump_state(&self, out: &mut dyn io::Write, state: &PancakeState) -> io::Result<()> {
        writeln!(out, "{}", state.cakes.iter().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reversed(n: usize) -> Vec<u8> {
        (0..n as u8).rev().collect()
    }

    #[test]
    fn gap_heuristic_on_reversed_stack() {
        let domain = Pancake::new(reversed(5), CostModel::Unit);
        let s0 = domain.initial_state();
        // Only the bottom position is out of order: one gap.
        assert_eq!(domain.h(&s0), cost(1.0));
        assert_eq!(domain.d(&s0), cost(1.0));
        assert!(!domain.is_goal(&s0));
    }

    #[test]
    fn full_flip_sorts_the_reversed_stack() {
        let domain = Pancake::new(reversed(5), CostModel::Unit);
        let s0 = domain.initial_state();
        let edge = domain.edge(&s0, 4);
        assert_eq!(edge.cost, cost(1.0));
        assert!(domain.is_goal(&edge.state));
    }

    #[test]
    fn heavy_flip_costs_top_cake_weight() {
        let domain = Pancake::new(reversed(5), CostModel::Heavy);
        let s0 = domain.initial_state();
        let edge = domain.edge(&s0, 4);
        // The lifted top cake is 4.
        assert_eq!(edge.cost, cost(5.0));
        assert!(domain.is_goal(&edge.state));
    }

    #[test]
    fn edges_reverse_cleanly() {
        let domain = Pancake::new(vec![2, 0, 3, 1, 4], CostModel::Heavy);
        let s0 = domain.initial_state();
        for op in domain.operators(&s0) {
            let there = domain.edge(&s0, op);
            let back = domain.edge(&there.state, there.revop);
            assert_eq!(domain.pack(&back.state), domain.pack(&s0));
            assert_eq!(back.cost, there.revcost);
        }
    }

    #[test]
    fn parses_instance_text() {
        let text = crate::test_utils::PANCAKE_REVERSED5_TEXT;
        let domain =
            Pancake::from_reader(&mut text.as_bytes(), CostModel::Unit).expect("parse failed");
        assert_eq!(domain.initial_state().cakes, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn rejects_non_permutations() {
        let text = "3\n0 0 2\n";
        assert!(Pancake::from_reader(&mut text.as_bytes(), CostModel::Unit).is_err());
    }
}
