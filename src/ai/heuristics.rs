use serde::{Deserialize, Serialize};

use crate::game::{Board, CELL_COUNT, GRID_SIZE, MAX_EXPONENT};

/// Flat penalty applied when a reward is computed over an unchanged tile
/// set.
pub const STAGNATION_PENALTY: f64 = -0.5;

/// Upper bound on the summed monotone log2 rises over all eight lines: a
/// line can rise at most twice over the full exponent range.
const MONOTONICITY_NORM: f64 = (2 * GRID_SIZE * 2 * MAX_EXPONENT as usize) as f64;

/// Upper bound on the summed |log2 difference| over the 24 adjacent pairs.
const SMOOTHNESS_NORM: f64 =
    (2 * GRID_SIZE * (GRID_SIZE - 1) * MAX_EXPONENT as usize) as f64;

/// Weights for the composite board evaluation and reward. Passed by
/// value, never mutated in place. All weights are non-negative except
/// `game_over_penalty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub merge_bonus: f64,
    pub empty_tiles: f64,
    pub monotonicity: f64,
    pub corner_bonus: f64,
    pub smoothness: f64,
    pub max_tile_bonus: f64,
    pub game_over_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        RewardWeights {
            merge_bonus: 1.0,
            empty_tiles: 1.5,
            monotonicity: 1.0,
            corner_bonus: 1.5,
            smoothness: 0.5,
            max_tile_bonus: 1.0,
            game_over_penalty: -10.0,
        }
    }
}

fn log_grid(board: &Board) -> [[f64; GRID_SIZE]; GRID_SIZE] {
    let values = board.value_grid();
    let mut grid = [[0.0f64; GRID_SIZE]; GRID_SIZE];
    for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            if values[y][x] > 0 {
                grid[y][x] = values[y][x].trailing_zeros() as f64;
            }
        }
    }
    grid
}

fn line_monotonicity(line: [f64; GRID_SIZE]) -> f64 {
    let mut ascending = 0.0;
    let mut descending = 0.0;
    for i in 0..GRID_SIZE - 1 {
        let diff = line[i + 1] - line[i];
        if diff > 0.0 {
            ascending += diff;
        } else {
            descending -= diff;
        }
    }
    ascending.max(descending)
}

/// How consistently values trend toward one end of each row and column,
/// in [0, 1].
pub fn monotonicity(board: &Board) -> f64 {
    let grid = log_grid(board);
    let mut total = 0.0;
    for y in 0..GRID_SIZE {
        total += line_monotonicity(grid[y]);
    }
    for x in 0..GRID_SIZE {
        let column = [grid[0][x], grid[1][x], grid[2][x], grid[3][x]];
        total += line_monotonicity(column);
    }
    total / MONOTONICITY_NORM
}

/// `log2(max)/17` when the highest tile sits in a corner, else 0.
pub fn corner_bonus(board: &Board) -> f64 {
    let Some((x, y)) = board.max_tile_pos() else {
        return 0.0;
    };
    let edge = (GRID_SIZE - 1) as u8;
    let in_corner = (x == 0 || x == edge) && (y == 0 || y == edge);
    if in_corner {
        max_tile_bonus(board)
    } else {
        0.0
    }
}

/// One minus the normalized sum of |log2 differences| between adjacent
/// occupied cells, in [0, 1]. Neighboring tiles close in value score high.
pub fn smoothness(board: &Board) -> f64 {
    let grid = log_grid(board);
    let values = board.value_grid();
    let mut roughness = 0.0;
    for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            if values[y][x] == 0 {
                continue;
            }
            if x + 1 < GRID_SIZE && values[y][x + 1] > 0 {
                roughness += (grid[y][x] - grid[y][x + 1]).abs();
            }
            if y + 1 < GRID_SIZE && values[y + 1][x] > 0 {
                roughness += (grid[y][x] - grid[y + 1][x]).abs();
            }
        }
    }
    1.0 - roughness / SMOOTHNESS_NORM
}

/// `log2(max)/17`, with 17 the maximum representable exponent.
pub fn max_tile_bonus(board: &Board) -> f64 {
    let max = board.max_tile();
    if max == 0 {
        return 0.0;
    }
    max.trailing_zeros() as f64 / MAX_EXPONENT as f64
}

/// Fraction of cells that are empty.
pub fn empty_fraction(board: &Board) -> f64 {
    board.empty_count() as f64 / CELL_COUNT as f64
}

/// Scalar evaluation of a board position, used by the lookahead search to
/// score reachable states. Terminal boards additionally pay the game-over
/// penalty.
pub fn evaluate(board: &Board, weights: &RewardWeights) -> f64 {
    let mut score = empty_fraction(board) * weights.empty_tiles
        + monotonicity(board) * weights.monotonicity
        + corner_bonus(board) * weights.corner_bonus
        + smoothness(board) * weights.smoothness
        + max_tile_bonus(board) * weights.max_tile_bonus;
    if board.is_game_over() {
        score += weights.game_over_penalty;
    }
    score
}

/// Composite reward for one recorded transition. `score_delta` is the
/// merge gain of the step; the stagnation penalty fires only when the
/// non-ghost tile set did not change between the snapshots.
pub fn reward(
    prev: &Board,
    next: &Board,
    score_delta: u32,
    game_over: bool,
    weights: &RewardWeights,
) -> f64 {
    let merge = if score_delta > 0 {
        (score_delta as f64).log2()
    } else {
        0.0
    };
    let mut reward = weights.merge_bonus * merge
        + empty_fraction(next) * weights.empty_tiles
        + monotonicity(next) * weights.monotonicity
        + corner_bonus(next) * weights.corner_bonus
        + smoothness(next) * weights.smoothness
        + max_tile_bonus(next) * weights.max_tile_bonus;
    if prev.signature() == next.signature() {
        reward += STAGNATION_PENALTY;
    }
    if game_over {
        reward += weights.game_over_penalty;
    }
    reward
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(cells: &[(u8, u8, u32)]) -> Board {
        let mut board = Board::new();
        for &(x, y, value) in cells {
            board.place_tile(x, y, value);
        }
        board
    }

    #[test]
    fn test_empty_fraction() {
        assert_eq!(empty_fraction(&Board::new()), 1.0);
        let board = board_from(&[(0, 0, 2), (1, 0, 2), (2, 0, 2), (3, 0, 2)]);
        assert!((empty_fraction(&board) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_sub_scores_stay_in_unit_interval() {
        let boards = [
            Board::new(),
            board_from(&[(0, 0, 131072), (3, 3, 2)]),
            board_from(&[(0, 0, 2), (1, 0, 131072), (2, 0, 2), (3, 0, 131072)]),
        ];
        for board in &boards {
            for score in [
                monotonicity(board),
                corner_bonus(board),
                smoothness(board),
                max_tile_bonus(board),
                empty_fraction(board),
            ] {
                assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
    }

    #[test]
    fn test_monotonicity_rewards_directional_gradients() {
        let ordered = board_from(&[(0, 0, 16), (1, 0, 8), (2, 0, 4), (3, 0, 2)]);
        let flat = board_from(&[(0, 0, 4), (1, 0, 4), (2, 0, 4), (3, 0, 4)]);
        assert!(monotonicity(&ordered) > monotonicity(&flat));
    }

    #[test]
    fn test_corner_bonus_requires_corner() {
        let cornered = board_from(&[(0, 0, 64), (1, 1, 2)]);
        let centered = board_from(&[(1, 1, 64), (0, 0, 2)]);
        assert!(corner_bonus(&cornered) > 0.0);
        assert_eq!(corner_bonus(&centered), 0.0);
        assert!((corner_bonus(&cornered) - 6.0 / 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothness_prefers_equal_neighbors() {
        let smooth = board_from(&[(0, 0, 8), (1, 0, 8), (0, 1, 8)]);
        let rough = board_from(&[(0, 0, 2), (1, 0, 512), (0, 1, 2)]);
        assert!(smoothness(&smooth) > smoothness(&rough));
        assert_eq!(smoothness(&smooth), 1.0);
    }

    #[test]
    fn test_max_tile_bonus_scales_with_exponent() {
        let board = board_from(&[(0, 0, 2048)]);
        assert!((max_tile_bonus(&board) - 11.0 / 17.0).abs() < 1e-9);
        assert_eq!(max_tile_bonus(&Board::new()), 0.0);
    }

    #[test]
    fn test_reward_merge_component_strictly_increasing() {
        let weights = RewardWeights::default();
        let prev = board_from(&[(0, 0, 2), (1, 0, 2)]);
        let next = board_from(&[(0, 0, 4), (3, 3, 2)]);
        let small = reward(&prev, &next, 4, false, &weights);
        let bigger = reward(&prev, &next, 8, false, &weights);
        let biggest = reward(&prev, &next, 64, false, &weights);
        assert!(small < bigger);
        assert!(bigger < biggest);
    }

    #[test]
    fn test_reward_zero_delta_has_no_merge_term() {
        let weights = RewardWeights {
            merge_bonus: 100.0,
            ..RewardWeights::default()
        };
        let prev = board_from(&[(0, 0, 2)]);
        let next = board_from(&[(1, 0, 2), (3, 3, 2)]);
        let base = reward(&prev, &next, 0, false, &weights);
        // With delta 0 the huge merge weight must not contribute.
        assert!(base.abs() < 10.0);
    }

    #[test]
    fn test_stagnation_penalty_on_unchanged_tiles() {
        let weights = RewardWeights::default();
        let board = board_from(&[(0, 0, 2), (3, 3, 4)]);
        let same = board.clone();
        let stagnant = reward(&board, &same, 0, false, &weights);
        let positional = empty_fraction(&same) * weights.empty_tiles
            + monotonicity(&same) * weights.monotonicity
            + corner_bonus(&same) * weights.corner_bonus
            + smoothness(&same) * weights.smoothness
            + max_tile_bonus(&same) * weights.max_tile_bonus;
        assert!((stagnant - (positional + STAGNATION_PENALTY)).abs() < 1e-9);
    }

    #[test]
    fn test_game_over_penalty_applied() {
        let weights = RewardWeights::default();
        let prev = board_from(&[(0, 0, 2)]);
        let next = board_from(&[(1, 0, 2), (3, 3, 2)]);
        let alive = reward(&prev, &next, 0, false, &weights);
        let dead = reward(&prev, &next, 0, true, &weights);
        assert!((alive - dead - (-weights.game_over_penalty)).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_penalizes_terminal_boards() {
        let weights = RewardWeights::default();
        let mut full = Board::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                let value = if (x + y) % 2 == 0 { 2 } else { 4 };
                full.place_tile(x, y, value);
            }
        }
        assert!(full.is_game_over());
        let open = board_from(&[(0, 0, 4), (1, 0, 2)]);
        assert!(evaluate(&full, &weights) < evaluate(&open, &weights));
    }
}
