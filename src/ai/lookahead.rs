use serde::{Deserialize, Serialize};

use crate::ai::heuristics::{self, RewardWeights};
use crate::game::{Board, Direction, GRID_SIZE};

/// Fixed bias nudging ties toward the funnel direction (Down).
pub const FUNNEL_BIAS: f64 = 0.05;
/// Smaller bias toward the side holding the tail of the halving chain.
pub const LATERAL_BIAS: f64 = 0.02;

/// Search parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LookaheadConfig {
    pub depth: usize,
    pub discount: f64,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        LookaheadConfig {
            depth: 6,
            discount: 0.9,
        }
    }
}

/// Bounded-depth greedy search over board transitions. Every direction is
/// simulated through the tilt engine; leaves are scored by the heuristic
/// evaluation. Overlapping subtrees are deliberately re-expanded — no
/// cross-branch memoization; only no-op detection uses the board
/// signature.
pub struct LookaheadSearch {
    config: LookaheadConfig,
    weights: RewardWeights,
}

impl LookaheadSearch {
    pub fn new(config: LookaheadConfig, weights: RewardWeights) -> Self {
        LookaheadSearch { config, weights }
    }

    pub fn set_weights(&mut self, weights: RewardWeights) {
        self.weights = weights;
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// Score all four directions. A direction whose tilt is a no-op scores
    /// negative infinity; the rest score the heuristic value of the next
    /// board plus the discounted best reachable score below it, with the
    /// tie-break bias added last.
    pub fn score_directions(&self, board: &Board) -> [f64; 4] {
        let signature = board.signature();
        let mut scores = [f64::NEG_INFINITY; 4];
        for direction in Direction::ALL {
            let next = board.tilt(direction);
            if next.signature() == signature {
                continue;
            }
            let depth = self.config.depth.saturating_sub(1);
            scores[direction.index()] = heuristics::evaluate(&next, &self.weights)
                + self.config.discount * self.search(&next, depth);
        }
        self.apply_tie_break_bias(board, &mut scores);
        scores
    }

    /// Greedy maximum over non-no-op directions, bottoming out at the
    /// heuristic evaluation when depth runs out or no move changes the
    /// board.
    fn search(&self, board: &Board, depth: usize) -> f64 {
        if depth == 0 {
            return heuristics::evaluate(board, &self.weights);
        }
        let signature = board.signature();
        let mut best = f64::NEG_INFINITY;
        for direction in Direction::ALL {
            let next = board.tilt(direction);
            if next.signature() == signature {
                continue;
            }
            let score = heuristics::evaluate(&next, &self.weights)
                + self.config.discount * self.search(&next, depth - 1);
            if score > best {
                best = score;
            }
        }
        if best.is_finite() {
            best
        } else {
            heuristics::evaluate(board, &self.weights)
        }
    }

    fn apply_tie_break_bias(&self, board: &Board, scores: &mut [f64; 4]) {
        let down = Direction::Down.index();
        if scores[down].is_finite() {
            scores[down] += FUNNEL_BIAS;
        }
        let side = lateral_funnel_side(board).index();
        if scores[side].is_finite() {
            scores[side] += LATERAL_BIAS;
        }
    }
}

/// Lateral direction pointing toward the tail of the longest halving chain
/// walked from the maximum tile.
fn lateral_funnel_side(board: &Board) -> Direction {
    let Some((mut x, mut y)) = board.max_tile_pos() else {
        return Direction::Left;
    };
    let mut value = board.max_tile();
    let grid = board.value_grid();
    while value > 2 {
        let half = value / 2;
        let mut stepped = false;
        for (dx, dy) in [(0i32, -1i32), (0, 1), (-1, 0), (1, 0)] {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx as usize >= GRID_SIZE || ny as usize >= GRID_SIZE {
                continue;
            }
            if grid[ny as usize][nx as usize] == half {
                x = nx as u8;
                y = ny as u8;
                value = half;
                stepped = true;
                break;
            }
        }
        if !stepped {
            break;
        }
    }
    if (x as usize) < GRID_SIZE / 2 {
        Direction::Left
    } else {
        Direction::Right
    }
}

/// Index of the maximum finite score; 0 when every direction is invalid.
pub fn select_lookahead_action(scores: &[f64; 4]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_finite() && score > best_score {
            best = index;
            best_score = score;
        }
    }
    best
}
