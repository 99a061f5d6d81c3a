//! Instance texts shared by tests, in the same plain formats the driver
//! reads from stdin.

/// Five pancakes, fully reversed: one flip from sorted.
pub const PANCAKE_REVERSED5_TEXT: &str = "5\n4 3 2 1 0\n";

/// Five pancakes with the top three reversed.
pub const PANCAKE_NEARBY5_TEXT: &str = "5\n2 1 0 3 4\n";

/// Three blocks stacked 3-2-1, goal stacked 1-2-3.
pub const BLOCKSWORLD_REVERSAL_TEXT: &str =
    "3\nWhat each block is on:\n0\n1\n2\nGoal:\n2\n3\n0\n";

/// Eight-puzzle three moves from the goal.
pub const TILES_EASY8_TEXT: &str = "3 3\n1 4 2 3 7 5 6 0 8\n";

/// Small grid with two dirt cells and one wall.
pub const VACUUM_SMALL_TEXT: &str = "4 3\n@..*\n.#..\n*...\n";

/// Seed for the synthetic tree.
pub const SYNTH_SEED_TEXT: &str = "42\n";
