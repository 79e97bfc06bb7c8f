use rand::rngs::StdRng;
use rand::SeedableRng;

use super::board::{Board, Direction};
use crate::error::EngineError;

/// Result of applying one tilt to a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The tilt changed nothing; the session was not mutated and no tile
    /// was spawned.
    NoOp,
    /// The tilt moved or merged tiles; one new tile has been spawned.
    Moved { gain: u32, game_over: bool },
}

/// The mutable state of one running game: board, score, and move count.
/// Owned and exclusively mutated by a single training-loop instance; the
/// board is replaced wholesale when an episode starts.
#[derive(Debug)]
pub struct GameSession {
    board: Board,
    score: u32,
    moves: usize,
    rng: StdRng,
}

impl GameSession {
    /// Start an episode: an empty board with two spawned tiles.
    pub fn new(rng: StdRng) -> Self {
        let mut session = GameSession {
            board: Board::new(),
            score: 0,
            moves: 0,
            rng,
        };
        session
            .board
            .spawn_random_tile(&mut session.rng)
            .expect("empty board has room");
        session
            .board
            .spawn_random_tile(&mut session.rng)
            .expect("board with one tile has room");
        session
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn is_game_over(&self) -> bool {
        self.board.is_game_over()
    }

    /// Apply one tilt: resolve the board, accumulate the merge gain, spawn
    /// exactly one tile, and check for termination. A no-op tilt leaves
    /// the session untouched. `EngineError::BoardFull` from the spawn is a
    /// precondition violation (game over must be checked first) and
    /// aborts the move with the board unchanged.
    pub fn apply(&mut self, direction: Direction) -> Result<MoveOutcome, EngineError> {
        let tilted = self.board.tilt(direction);
        if tilted.signature() == self.board.signature() {
            return Ok(MoveOutcome::NoOp);
        }

        let mut next = tilted;
        let gain = next.merge_gain();
        next.spawn_random_tile(&mut self.rng)?;

        self.board = next;
        self.score += gain;
        self.moves += 1;
        let game_over = self.board.is_game_over();
        Ok(MoveOutcome::Moved { gain, game_over })
    }
}
