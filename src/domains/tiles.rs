use crate::domains::{malformed, CostModel, ParseError};
use crate::search::{cost, Cost, Domain, Edge, OperatorList};
use itertools::Itertools;
use std::io;

/// Sliding-tile puzzle over a `width x height` board. The goal places
/// tile `t` at position `t` with the blank at 0. The heuristic is
/// Manhattan distance over a precomputed table, weighted by the cost
/// model; `d` is the unweighted tile distance.
#[derive(Debug)]
pub struct Tiles {
    width: usize,
    ntiles: usize,
    init: Vec<u8>,
    /// `md[t][pos]`: moves tile `t` needs from `pos` to its goal position.
    md: Vec<Vec<u32>>,
    /// Neighbor positions of each blank position.
    moves: Vec<Vec<usize>>,
    costs: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TilesState {
    ts: Vec<u8>,
    blank: usize,
    h: Cost,
    d: Cost,
}

impl Tiles {
    pub fn new(width: usize, height: usize, init: Vec<u8>, cost_model: CostModel) -> Self {
        let ntiles = width * height;
        assert_eq!(init.len(), ntiles);
        let md = (0..ntiles)
            .map(|tile| {
                let row = tile / width;
                let col = tile % width;
                (0..ntiles)
                    .map(|pos| {
                        let r = pos / width;
                        let c = pos % width;
                        (row.abs_diff(r) + col.abs_diff(c)) as u32
                    })
                    .collect()
            })
            .collect();
        let moves = (0..ntiles)
            .map(|pos| {
                let mut out = Vec::with_capacity(4);
                if pos >= width {
                    out.push(pos - width);
                }
                if pos + width < ntiles {
                    out.push(pos + width);
                }
                if pos % width > 0 {
                    out.push(pos - 1);
                }
                if pos % width < width - 1 {
                    out.push(pos + 1);
                }
                out
            })
            .collect();
        let costs = (0..ntiles)
            .map(|tile| {
                if tile == 0 {
                    return 0.0;
                }
                let t = tile as f64;
                let n = ntiles as f64;
                match cost_model {
                    CostModel::Unit => 1.0,
                    CostModel::Heavy => t,
                    CostModel::Sqrt => t.sqrt(),
                    CostModel::Inverse => 1.0 / t,
                    CostModel::Reverse => n - t,
                    CostModel::Revinv => 1.0 / (n - t),
                }
            })
            .collect();
        Self {
            width,
            ntiles,
            init,
            md,
            moves,
            costs,
        }
    }

    pub fn from_reader(
        reader: &mut dyn io::BufRead,
        cost_model: CostModel,
    ) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut numbers = text.split_whitespace().map(|token| {
            token
                .parse::<usize>()
                .map_err(|_| malformed(format!("expected an integer, got {token:?}")))
        });
        let width = numbers
            .next()
            .ok_or_else(|| malformed("missing board width"))??;
        let height = numbers
            .next()
            .ok_or_else(|| malformed("missing board height"))??;
        if width < 2 || height < 2 {
            return Err(malformed("board must be at least 2x2"));
        }
        let ntiles = width * height;
        let init: Vec<u8> = numbers
            .take(ntiles)
            .map(|n| n.map(|v| v as u8))
            .collect::<Result<_, _>>()?;
        if init.len() != ntiles {
            return Err(malformed("fewer tiles than the board holds"));
        }
        let mut seen = vec![false; ntiles];
        for &tile in &init {
            if (tile as usize) >= ntiles || seen[tile as usize] {
                return Err(malformed("tiles must form a permutation of 0..n"));
            }
            seen[tile as usize] = true;
        }
        Ok(Self::new(width, height, init, cost_model))
    }

    fn state_for(&self, ts: Vec<u8>) -> TilesState {
        let mut h = 0.0;
        let mut d = 0.0;
        let mut blank = 0;
        for (pos, &tile) in ts.iter().enumerate() {
            if tile == 0 {
                blank = pos;
            } else {
                h += self.costs[tile as usize] * self.md[tile as usize][pos] as f64;
                d += self.md[tile as usize][pos] as f64;
            }
        }
        TilesState {
            ts,
            blank,
            h: cost(h),
            d: cost(d),
        }
    }
}

impl Domain for Tiles {
    type State = TilesState;
    type Packed = Vec<u8>;
    type Oper = usize;

    const NOP: usize = usize::MAX;

    fn initial_state(&self) -> TilesState {
        self.state_for(self.init.clone())
    }

    fn h(&self, state: &TilesState) -> Cost {
        state.h
    }

    fn d(&self, state: &TilesState) -> Cost {
        state.d
    }

    fn is_goal(&self, state: &TilesState) -> bool {
        state.d == cost(0.0)
    }

    /// Operators name the position the blank slides to.
    fn operators(&self, state: &TilesState) -> OperatorList<usize> {
        self.moves[state.blank].iter().copied().collect()
    }

    fn edge(&self, state: &TilesState, op: usize) -> Edge<Self> {
        let tile = state.ts[op] as usize;
        debug_assert_ne!(tile, 0, "sliding the blank onto itself");
        let step_cost = cost(self.costs[tile]);
        let mut ts = state.ts.clone();
        ts.swap(state.blank, op);
        let delta = self.md[tile][state.blank] as f64 - self.md[tile][op] as f64;
        Edge {
            state: TilesState {
                ts,
                blank: op,
                h: state.h + cost(self.costs[tile] * delta),
                d: state.d + cost(delta),
            },
            cost: step_cost,
            revop: state.blank,
            revcost: step_cost,
        }
    }

    fn pack(&self, state: &TilesState) -> Vec<u8> {
        state.ts.clone()
    }

    fn unpack(&self, packed: &Vec<u8>) -> TilesState {
        self.state_for(packed.clone())
    }

    fn dump_state(&self, out: &mut dyn io::Write, state: &TilesState) -> io::Result<()> {
        for row in state.ts.chunks(self.width) {
            writeln!(out, "{}", row.iter().join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn eight_puzzle(init: Vec<u8>, cost_model: CostModel) -> Tiles {
        Tiles::new(3, 3, init, cost_model)
    }

    #[test]
    fn manhattan_distance_of_one_swap() {
        // Blank at 0; tile 1 one step away.
        let domain = eight_puzzle(vec![1, 0, 2, 3, 4, 5, 6, 7, 8], CostModel::Unit);
        let s0 = domain.initial_state();
        assert_eq!(domain.h(&s0), cost(1.0));
        assert_eq!(domain.d(&s0), cost(1.0));
        assert!(!domain.is_goal(&s0));
    }

    #[test]
    fn incremental_h_matches_recomputation() {
        let domain = eight_puzzle(vec![3, 1, 2, 0, 4, 5, 6, 7, 8], CostModel::Sqrt);
        let mut state = domain.initial_state();
        // Walk a few moves and compare cached values against a rebuild.
        for _ in 0..4 {
            let op = domain.operators(&state)[0];
            state = domain.edge(&state, op).state;
            let rebuilt = domain.unpack(&domain.pack(&state));
            assert_approx_eq!(state.h.into_inner(), rebuilt.h.into_inner());
            assert_approx_eq!(state.d.into_inner(), rebuilt.d.into_inner());
        }
    }

    #[test]
    fn edges_reverse_cleanly() {
        let domain = eight_puzzle(vec![1, 0, 2, 3, 4, 5, 6, 7, 8], CostModel::Heavy);
        let s0 = domain.initial_state();
        for op in domain.operators(&s0) {
            let there = domain.edge(&s0, op);
            let back = domain.edge(&there.state, there.revop);
            assert_eq!(domain.pack(&back.state), domain.pack(&s0));
            assert_eq!(back.cost, there.revcost);
        }
    }

    #[test]
    fn solves_in_one_move() {
        let domain = eight_puzzle(vec![1, 0, 2, 3, 4, 5, 6, 7, 8], CostModel::Unit);
        let s0 = domain.initial_state();
        // Slide tile 1 (at position 0) into the blank.
        let edge = domain.edge(&s0, 0);
        assert!(domain.is_goal(&edge.state));
        assert_eq!(domain.path_cost(&[0]), Some(cost(1.0)));
    }

    #[test]
    fn parses_instance_text() {
        let text = "3 3\n1 0 2 3 4 5 6 7 8\n";
        let domain =
            Tiles::from_reader(&mut text.as_bytes(), CostModel::Unit).expect("parse failed");
        assert_eq!(domain.initial_state().blank, 1);
    }
}
