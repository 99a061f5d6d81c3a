use crate::domains::{malformed, CostModel, ParseError};
use crate::search::{cost, Cost, Domain, Edge, OperatorList};
use std::io;

/// A robot on a grid with dirty cells. Moving costs the robot's current
/// weight, sucking up dirt costs one; under the `heavy` model each
/// collected dirt adds one to the weight, otherwise the weight stays at
/// one. The heuristic boxes the robot and the remaining dirt.
#[derive(Debug)]
pub struct Vacuum {
    width: usize,
    height: usize,
    blocked: Vec<bool>,
    /// Cell index to dirt id, where dirty.
    dirt_at: Vec<Option<usize>>,
    dirt_locs: Vec<(usize, usize)>,
    start: usize,
    cost_mod: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VacuumState {
    loc: usize,
    dirt: Vec<bool>,
    ndirt: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VacuumOp {
    Up,
    Down,
    Left,
    Right,
    Suck,
    Nop,
}

impl Vacuum {
    pub fn from_reader(
        reader: &mut dyn io::BufRead,
        cost_model: CostModel,
    ) -> Result<Self, ParseError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| malformed("missing grid size"))?;
        let mut dims = header.split_whitespace();
        let width: usize = dims
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| malformed("bad grid width"))?;
        let height: usize = dims
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| malformed("bad grid height"))?;
        if width == 0 || height == 0 {
            return Err(malformed("grid must be non-empty"));
        }

        let mut blocked = vec![false; width * height];
        let mut dirt_at = vec![None; width * height];
        let mut dirt_locs = Vec::new();
        let mut start = None;
        for (y, line) in lines.take(height).enumerate() {
            for (x, glyph) in line.chars().take(width).enumerate() {
                let cell = y * width + x;
                match glyph {
                    '#' => blocked[cell] = true,
                    '*' => {
                        dirt_at[cell] = Some(dirt_locs.len());
                        dirt_locs.push((x, y));
                    }
                    '@' | 'V' => start = Some(cell),
                    '.' | ' ' | '_' => {}
                    other => {
                        return Err(malformed(format!("unknown grid glyph {other:?}")));
                    }
                }
            }
        }
        let start = start.ok_or_else(|| malformed("missing robot start cell"))?;
        Ok(Self {
            width,
            height,
            blocked,
            dirt_at,
            dirt_locs,
            start,
            cost_mod: if cost_model == CostModel::Heavy {
                1.0
            } else {
                0.0
            },
        })
    }

    fn coord(&self, cell: usize) -> (usize, usize) {
        (cell % self.width, cell / self.width)
    }

    fn weight(&self, state: &VacuumState) -> f64 {
        1.0 + self.cost_mod * (self.dirt_locs.len() - state.ndirt) as f64
    }

    /// Remaining dirt plus the span of the box holding the robot and all
    /// of it; `weighted` scales the travel term by the robot weight.
    fn box_estimate(&self, state: &VacuumState, weighted: bool) -> Cost {
        if state.ndirt == 0 {
            return cost(0.0);
        }
        let (x, y) = self.coord(state.loc);
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
        for (id, &(dx, dy)) in self.dirt_locs.iter().enumerate() {
            if !state.dirt[id] {
                continue;
            }
            min_x = min_x.min(dx);
            max_x = max_x.max(dx);
            min_y = min_y.min(dy);
            max_y = max_y.max(dy);
        }
        let travel = ((max_x - min_x) + (max_y - min_y)) as f64;
        let scale = if weighted { self.weight(state) } else { 1.0 };
        cost(state.ndirt as f64 + travel * scale)
    }

    fn target(&self, loc: usize, op: VacuumOp) -> Option<usize> {
        let (x, y) = self.coord(loc);
        let (nx, ny) = match op {
            VacuumOp::Up => (x as isize, y as isize - 1),
            VacuumOp::Down => (x as isize, y as isize + 1),
            VacuumOp::Left => (x as isize - 1, y as isize),
            VacuumOp::Right => (x as isize + 1, y as isize),
            VacuumOp::Suck | VacuumOp::Nop => return None,
        };
        if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
            return None;
        }
        let cell = ny as usize * self.width + nx as usize;
        (!self.blocked[cell]).then_some(cell)
    }

    fn reverse(op: VacuumOp) -> VacuumOp {
        match op {
            VacuumOp::Up => VacuumOp::Down,
            VacuumOp::Down => VacuumOp::Up,
            VacuumOp::Left => VacuumOp::Right,
            VacuumOp::Right => VacuumOp::Left,
            VacuumOp::Suck | VacuumOp::Nop => VacuumOp::Nop,
        }
    }
}

impl Domain for Vacuum {
    type State = VacuumState;
    type Packed = VacuumState;
    type Oper = VacuumOp;

    const NOP: VacuumOp = VacuumOp::Nop;

    fn initial_state(&self) -> VacuumState {
        VacuumState {
            loc: self.start,
            dirt: vec![true; self.dirt_locs.len()],
            ndirt: self.dirt_locs.len(),
        }
    }

    fn h(&self, state: &VacuumState) -> Cost {
        self.box_estimate(state, true)
    }

    fn d(&self, state: &VacuumState) -> Cost {
        self.box_estimate(state, false)
    }

    fn is_goal(&self, state: &VacuumState) -> bool {
        state.ndirt == 0
    }

    fn operators(&self, state: &VacuumState) -> OperatorList<VacuumOp> {
        let mut ops = OperatorList::new();
        if self
            .dirt_at[state.loc]
            .is_some_and(|dirt| state.dirt[dirt])
        {
            ops.push(VacuumOp::Suck);
        }
        for op in [VacuumOp::Up, VacuumOp::Down, VacuumOp::Left, VacuumOp::Right] {
            if self.target(state.loc, op).is_some() {
                ops.push(op);
            }
        }
        ops
    }

    fn edge(&self, state: &VacuumState, op: VacuumOp) -> Edge<Self> {
        match op {
            VacuumOp::Suck => {
                let dirt = self.dirt_at[state.loc].expect("sucking a clean cell");
                debug_assert!(state.dirt[dirt]);
                let mut next = state.clone();
                next.dirt[dirt] = false;
                next.ndirt -= 1;
                Edge {
                    state: next,
                    cost: cost(1.0),
                    revop: VacuumOp::Nop,
                    revcost: cost(-1.0),
                }
            }
            VacuumOp::Nop => unreachable!("applying the no-op"),
            direction => {
                let cell = self.target(state.loc, direction).expect("move off the grid");
                let mut next = state.clone();
                next.loc = cell;
                let step_cost = cost(self.weight(state));
                Edge {
                    state: next,
                    cost: step_cost,
                    revop: Self::reverse(direction),
                    revcost: step_cost,
                }
            }
        }
    }

    fn pack(&self, state: &VacuumState) -> VacuumState {
        state.clone()
    }

    fn unpack(&self, packed: &VacuumState) -> VacuumState {
        packed.clone()
    }

    fn dump_state(&self, out: &mut dyn io::Write, state: &VacuumState) -> io::Result<()> {
        let (x, y) = self.coord(state.loc);
        write!(out, "({x}, {y}), ndirt={}", state.ndirt)?;
        for &dirty in &state.dirt {
            write!(out, " {}", dirty as u8)?;
        }
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid(cost_model: CostModel) -> Vacuum {
        let text = crate::test_utils::VACUUM_SMALL_TEXT;
        Vacuum::from_reader(&mut text.as_bytes(), cost_model).expect("parse failed")
    }

    #[test]
    fn parses_grid_and_boxes_the_dirt() {
        let domain = small_grid(CostModel::Unit);
        let s0 = domain.initial_state();
        assert_eq!(s0.ndirt, 2);
        // Box spans x 0..3, y 0..2: travel 5, plus two sucks.
        assert_eq!(domain.h(&s0), cost(7.0));
        assert_eq!(domain.d(&s0), cost(7.0));
    }

    #[test]
    fn walls_and_edges_block_moves() {
        let domain = small_grid(CostModel::Unit);
        let s0 = domain.initial_state();
        let ops = domain.operators(&s0);
        // Top-left corner: only down and right remain.
        assert!(!ops.contains(&VacuumOp::Up));
        assert!(!ops.contains(&VacuumOp::Left));
        assert!(ops.contains(&VacuumOp::Down));
        assert!(ops.contains(&VacuumOp::Right));
    }

    #[test]
    fn sucking_clears_a_cell_and_reaches_the_goal() {
        let domain = small_grid(CostModel::Unit);
        let mut state = domain.initial_state();
        for op in [
            VacuumOp::Down,
            VacuumOp::Down,
            VacuumOp::Suck,
            VacuumOp::Up,
            VacuumOp::Up,
            VacuumOp::Right,
            VacuumOp::Right,
            VacuumOp::Right,
            VacuumOp::Suck,
        ] {
            assert!(domain.operators(&state).contains(&op), "{op:?} inapplicable");
            state = domain.edge(&state, op).state;
        }
        assert!(domain.is_goal(&state));
        assert_eq!(domain.h(&state), cost(0.0));
    }

    #[test]
    fn heavy_robot_pays_more_after_collecting() {
        let domain = small_grid(CostModel::Heavy);
        let mut state = domain.initial_state();
        let before = domain.edge(&state, VacuumOp::Down).cost;
        assert_eq!(before, cost(1.0));
        state = domain.edge(&state, VacuumOp::Down).state;
        state = domain.edge(&state, VacuumOp::Down).state;
        state = domain.edge(&state, VacuumOp::Suck).state;
        let after = domain.edge(&state, VacuumOp::Up).cost;
        assert_eq!(after, cost(2.0));
    }

    #[test]
    fn moves_reverse_cleanly() {
        let domain = small_grid(CostModel::Unit);
        let s0 = domain.initial_state();
        for op in domain.operators(&s0) {
            if op == VacuumOp::Suck {
                continue;
            }
            let there = domain.edge(&s0, op);
            let back = domain.edge(&there.state, there.revop);
            assert_eq!(domain.pack(&back.state), domain.pack(&s0));
        }
    }
}
