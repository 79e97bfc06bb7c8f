use crate::ai::heuristics::RewardWeights;
use crate::game::Tile;

/// Commands sent from a caller to a training loop. Closed set,
/// exhaustively matched by the loop.
#[derive(Debug, Clone)]
pub enum LoopCommand {
    /// Handshake; the loop answers with `Ready`.
    Init,
    /// Start a fresh episode. Only valid after `Init`.
    StartGame {
        speed_mode: Option<bool>,
        reward_weights: Option<RewardWeights>,
    },
    /// Replace the board wholesale and start a new episode.
    ResetGame {
        speed_mode: Option<bool>,
        reward_weights: Option<RewardWeights>,
    },
    /// Return to Idle. Idempotent.
    StopGame,
    SetSpeedMode(bool),
    SetRewardWeights(RewardWeights),
    /// Persist the online network under `key` (store default when None).
    SaveModel { key: Option<String> },
    /// Restore the online network from `key`; a missing key falls back to
    /// the untrained network.
    LoadModel { key: Option<String> },
    /// Terminate the loop thread.
    Shutdown,
}

/// Events sent from a training loop to its caller.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    Ready {
        backend: String,
    },
    /// Board snapshot for rendering; ghosts included so merges can be
    /// animated. Throttled in speed mode.
    Display {
        tiles: Vec<Tile>,
        score: u32,
        game_over: bool,
    },
    GameOver {
        score: u32,
    },
    TrainResult {
        loss: Option<f32>,
    },
    SaveDone,
    LoadDone,
    Error {
        message: String,
    },
}
