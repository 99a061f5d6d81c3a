use crate::domains::{malformed, ParseError};
use crate::search::{cost, Cost, Domain, Edge, OperatorList};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io;

/// Branching factor of every interior node.
const BRANCHING: usize = 25;
/// Largest edge cost the generator draws.
const MAX_COST: i64 = 10;

/// A synthetic search tree grown deterministically from seeds: a state is
/// its seed plus the actual goal distance `agd`, and each operator is the
/// seed of the child it leads to. The heuristic is `agd` corrupted by up
/// to `max_err` relative error, drifting by at most one per step.
#[derive(Debug)]
pub struct SynthTree {
    seed: i64,
    start_agd: i64,
    max_err: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthState {
    seed: i64,
    agd: i64,
    h: i64,
    d: i64,
}

impl SynthState {
    /// Relative error of the current heuristic value.
    fn err(&self) -> f64 {
        if self.agd > 0 {
            (self.agd - self.h) as f64 / self.agd as f64
        } else {
            0.0
        }
    }
}

impl SynthTree {
    pub fn new(seed: i64, start_agd: i64, max_err: f64) -> Self {
        Self {
            seed,
            start_agd,
            max_err,
        }
    }

    pub fn from_reader(
        reader: &mut dyn io::BufRead,
        start_agd: i64,
        max_err: f64,
    ) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let seed = text
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<i64>().ok())
            .ok_or_else(|| malformed("missing random seed"))?;
        Ok(Self::new(seed, start_agd, max_err))
    }

    fn distance_for(h: i64) -> i64 {
        h / MAX_COST + (h % MAX_COST != 0) as i64
    }
}

impl Domain for SynthTree {
    type State = SynthState;
    type Packed = SynthState;
    type Oper = i64;

    const NOP: i64 = -1;

    fn initial_state(&self) -> SynthState {
        let mut rng = SmallRng::seed_from_u64(self.seed as u64);
        let err = rng.gen::<f64>() * self.max_err;
        let h = self.start_agd - (err * self.start_agd as f64) as i64;
        SynthState {
            seed: self.seed,
            agd: self.start_agd,
            h,
            d: Self::distance_for(h),
        }
    }

    fn h(&self, state: &SynthState) -> Cost {
        cost(state.h as f64)
    }

    fn d(&self, state: &SynthState) -> Cost {
        cost(state.d as f64)
    }

    fn is_goal(&self, state: &SynthState) -> bool {
        state.agd == 0
    }

    fn operators(&self, state: &SynthState) -> OperatorList<i64> {
        let mut rng = SmallRng::seed_from_u64(state.seed as u64);
        (0..BRANCHING).map(|_| rng.gen_range(0..i64::MAX)).collect()
    }

    fn edge(&self, state: &SynthState, op: i64) -> Edge<Self> {
        let parent_err = state.err();
        let mut rng = SmallRng::seed_from_u64(op as u64);
        let step_cost = rng.gen_range(0..=MAX_COST);
        let drift = rng.gen_range(-step_cost..=step_cost);
        let agd = (state.agd - drift).max(0);

        // Inherit the parent's relative error, drifting one unit toward
        // or away from the truth depending on a fresh error draw.
        let inherited = agd - (parent_err * agd as f64) as i64;
        let err = rng.gen::<f64>() * self.max_err;
        let h = if err > parent_err {
            let floor = (agd as f64 - self.max_err * agd as f64) as i64;
            (inherited - 1).max(0).min(floor)
        } else {
            (inherited + 1).min(agd)
        };

        Edge {
            state: SynthState {
                seed: op,
                agd,
                h,
                d: Self::distance_for(h),
            },
            cost: cost(step_cost as f64),
            revop: state.seed,
            revcost: cost(step_cost as f64),
        }
    }

    fn pack(&self, state: &SynthState) -> SynthState {
        state.clone()
    }

    fn unpack(&self, packed: &SynthState) -> SynthState {
        packed.clone()
    }

    fn dump_state(&self, out: &mut dyn io::Write, state: &SynthState) -> io::Result<()> {
        writeln!(
            out,
            "seed={} agd={} h={} d={}",
            state.seed, state.agd, state.h, state.d
        )
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_heuristic_with_zero_error() {
        let domain = SynthTree::new(42, 10, 0.0);
        let s0 = domain.initial_state();
        assert_eq!(s0.h, s0.agd);
        assert_eq!(s0.d, 1);
    }

    #[test]
    fn children_are_deterministic_per_seed() {
        let domain = SynthTree::new(42, 10, 0.0);
        let s0 = domain.initial_state();
        let ops_a = domain.operators(&s0);
        let ops_b = domain.operators(&s0);
        assert_eq!(ops_a, ops_b);
        assert_eq!(ops_a.len(), BRANCHING);
        let kid_a = domain.edge(&s0, ops_a[3]);
        let kid_b = domain.edge(&s0, ops_a[3]);
        assert_eq!(kid_a.state, kid_b.state);
        assert_eq!(kid_a.cost, kid_b.cost);
    }

    #[test]
    fn goal_distance_never_goes_negative() {
        let domain = SynthTree::new(7, 5, 0.5);
        let mut state = domain.initial_state();
        for _ in 0..50 {
            let ops = domain.operators(&state);
            let edge = domain.edge(&state, ops[0]);
            assert!(edge.state.agd >= 0);
            assert!(edge.state.h >= 0);
            assert!(edge.state.h <= edge.state.agd);
            state = edge.state;
        }
    }

    #[test]
    fn parses_seed_from_text() {
        let text = crate::test_utils::SYNTH_SEED_TEXT;
        let domain = SynthTree::from_reader(&mut text.as_bytes(), 500, 0.0).expect("parse failed");
        assert_eq!(domain.initial_state().seed, 42);
    }
}
