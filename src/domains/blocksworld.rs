use crate::domains::{malformed, ParseError};
use crate::search::{cost, Cost, Domain, Edge, OperatorList};
use std::io;

/// Blocksworld with table space: blocks are numbered from 1 and `below[b-1]`
/// names the block that `b` rests on (0 = table). A move picks up a clear
/// block and puts it on another clear block or the table, at unit cost.
/// The heuristic counts blocks sitting above the lowest mismatch of their
/// stack, which is also the distance estimate.
#[derive(Debug)]
pub struct Blocksworld {
    nblocks: usize,
    init: Vec<u8>,
    goal: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BlocksState {
    below: Vec<u8>,
    above: Vec<u8>,
    h: Cost,
}

/// A move, encoded as `(from - 1) * nblocks + (to - 1)`; `to == from`
/// means "put `from` on the table".
pub type Move = usize;

impl Blocksworld {
    pub fn new(init: Vec<u8>, goal: Vec<u8>) -> Self {
        assert_eq!(init.len(), goal.len());
        Self {
            nblocks: init.len(),
            init,
            goal,
        }
    }

    pub fn from_reader(reader: &mut dyn io::BufRead) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        // Instance shape: the block count, the "below" array of the
        // initial configuration, then the goal's. Header lines of the
        // classic format are tolerated and skipped.
        let mut numbers = text
            .split_whitespace()
            .filter_map(|token| token.parse::<usize>().ok());
        let nblocks = numbers
            .next()
            .ok_or_else(|| malformed("missing block count"))?;
        if nblocks == 0 {
            return Err(malformed("need at least one block"));
        }
        let mut read_array = |what: &str| -> Result<Vec<u8>, ParseError> {
            let array: Vec<u8> = numbers.by_ref().take(nblocks).map(|v| v as u8).collect();
            if array.len() != nblocks {
                return Err(malformed(format!("short {what} array")));
            }
            if array.iter().any(|&b| b as usize > nblocks) {
                return Err(malformed(format!("{what} array names an unknown block")));
            }
            Ok(array)
        };
        let init = read_array("initial")?;
        let goal = read_array("goal")?;
        Ok(Self::new(init, goal))
    }

    fn encode(&self, from: u8, to: u8) -> Move {
        let to = if to == 0 { from } else { to };
        (from as usize - 1) * self.nblocks + (to as usize - 1)
    }

    fn decode(&self, op: Move) -> (u8, u8) {
        let from = (op / self.nblocks) as u8 + 1;
        let to = (op % self.nblocks) as u8 + 1;
        if to == from {
            (from, 0)
        } else {
            (from, to)
        }
    }

    fn above_of(below: &[u8]) -> Vec<u8> {
        let mut above = vec![0; below.len()];
        for (at, &under) in below.iter().enumerate() {
            if under != 0 {
                above[under as usize - 1] = at as u8 + 1;
            }
        }
        above
    }

    /// Blocks above (and including) the lowest out-of-place block of each
    /// stack.
    fn out_of_place(&self, below: &[u8], above: &[u8]) -> u32 {
        let mut count = 0;
        for bottom in 1..=self.nblocks as u8 {
            if below[bottom as usize - 1] != 0 {
                continue;
            }
            let mut mismatched = false;
            let mut block = bottom;
            while block != 0 {
                mismatched = mismatched || below[block as usize - 1] != self.goal[block as usize - 1];
                if mismatched {
                    count += 1;
                }
                block = above[block as usize - 1];
            }
        }
        count
    }

    fn state_for(&self, below: Vec<u8>) -> BlocksState {
        let above = Self::above_of(&below);
        let h = cost(self.out_of_place(&below, &above) as f64);
        BlocksState { below, above, h }
    }
}

impl Domain for Blocksworld {
    type State = BlocksState;
    type Packed = Vec<u8>;
    type Oper = Move;

    const NOP: Move = usize::MAX;

    fn initial_state(&self) -> BlocksState {
        self.state_for(self.init.clone())
    }

    fn h(&self, state: &BlocksState) -> Cost {
        state.h
    }

    fn d(&self, state: &BlocksState) -> Cost {
        state.h
    }

    fn is_goal(&self, state: &BlocksState) -> bool {
        state.h == cost(0.0)
    }

    fn operators(&self, state: &BlocksState) -> OperatorList<Move> {
        let tops: Vec<u8> = (1..=self.nblocks as u8)
            .filter(|&b| state.above[b as usize - 1] == 0)
            .collect();
        let mut ops = OperatorList::new();
        for &pick_up in &tops {
            for &put_on in &tops {
                if pick_up != put_on {
                    ops.push(self.encode(pick_up, put_on));
                } else if state.below[pick_up as usize - 1] != 0 {
                    ops.push(self.encode(pick_up, 0));
                }
            }
        }
        ops
    }

    fn edge(&self, state: &BlocksState, op: Move) -> Edge<Self> {
        let (pick_up, put_on) = self.decode(op);
        debug_assert_eq!(state.above[pick_up as usize - 1], 0, "moved block not clear");
        let revop = self.encode(pick_up, state.below[pick_up as usize - 1]);
        let mut below = state.below.clone();
        below[pick_up as usize - 1] = put_on;
        Edge {
            state: self.state_for(below),
            cost: cost(1.0),
            revop,
            revcost: cost(1.0),
        }
    }

    fn pack(&self, state: &BlocksState) -> Vec<u8> {
        state.below.clone()
    }

    fn unpack(&self, packed: &Vec<u8>) -> BlocksState {
        self.state_for(packed.clone())
    }

    fn dump_state(&self, out: &mut dyn io::Write, state: &BlocksState) -> io::Result<()> {
        for bottom in 1..=self.nblocks as u8 {
            if state.below[bottom as usize - 1] != 0 {
                continue;
            }
            let mut stack = Vec::new();
            let mut block = bottom;
            while block != 0 {
                stack.push(block);
                block = state.above[block as usize - 1];
            }
            let rendered: Vec<String> = stack.iter().map(|b| b.to_string()).collect();
            writeln!(out, "{}", rendered.join(" "))?;
        }
        writeln!(out, "h: {}", state.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tower 3-on-2-on-1 with the goal tower 1-on-2-on-3.
    fn reversal_instance() -> Blocksworld {
        Blocksworld::new(vec![0, 1, 2], vec![2, 3, 0])
    }

    #[test]
    fn initial_heuristic_counts_every_misplaced_block() {
        let domain = reversal_instance();
        let s0 = domain.initial_state();
        assert_eq!(domain.h(&s0), cost(3.0));
    }

    #[test]
    fn only_clear_blocks_move() {
        let domain = reversal_instance();
        let s0 = domain.initial_state();
        let ops = domain.operators(&s0);
        // Block 3 is the only clear block and it is not on the table:
        // it can move only to the table.
        assert_eq!(ops.len(), 1);
        let edge = domain.edge(&s0, ops[0]);
        assert_eq!(edge.state.below, vec![0, 1, 0]);
    }

    #[test]
    fn three_moves_reverse_the_tower() {
        let domain = reversal_instance();
        // 3 to the table, 2 onto 3, 1 onto 2.
        let ops = [
            domain.encode(3, 0),
            domain.encode(2, 3),
            domain.encode(1, 2),
        ];
        assert_eq!(domain.path_cost(&ops), Some(cost(3.0)));
    }

    #[test]
    fn edges_reverse_cleanly() {
        let domain = reversal_instance();
        let mid = domain.unpack(&vec![0, 1, 0]);
        for op in domain.operators(&mid) {
            let there = domain.edge(&mid, op);
            let back = domain.edge(&there.state, there.revop);
            assert_eq!(domain.pack(&back.state), domain.pack(&mid));
        }
    }

    #[test]
    fn parses_classic_instance_text() {
        let text = crate::test_utils::BLOCKSWORLD_REVERSAL_TEXT;
        let domain = Blocksworld::from_reader(&mut text.as_bytes()).expect("parse failed");
        assert_eq!(domain.initial_state().below, vec![0, 1, 2]);
        assert_eq!(domain.h(&domain.initial_state()), cost(3.0));
    }
}
