//! Core sliding-tile game logic: the board-transition engine (tilt, slide,
//! merge, spawn) and the mutable game session owned by a training loop.

mod board;
mod session;

pub use board::{Board, Direction, Tile, CELL_COUNT, GRID_SIZE, MAX_EXPONENT};
pub use session::{GameSession, MoveOutcome};
