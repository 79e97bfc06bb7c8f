use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ai::dqn::{ValueAgent, BACKEND_LABEL};
use crate::ai::heuristics::{self, RewardWeights};
use crate::ai::lookahead::{select_lookahead_action, LookaheadSearch};
use crate::ai::state_encoding::encode_board_flat;
use crate::checkpoint::ModelStore;
use crate::config::AppConfig;
use crate::game::{Direction, GameSession, MoveOutcome, CELL_COUNT};
use crate::training::messages::{LoopCommand, LoopEvent};
use crate::training::replay_buffer::Experience;

/// Scheduling and phase parameters of a training loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub speed_mode: bool,
    /// Total steps driven purely by the lookahead teacher before blended
    /// selection takes over.
    pub demo_phase_steps: usize,
    /// Auto-save the model every this many training steps (0 disables).
    pub autosave_interval: usize,
    pub min_step_delay_ms: u64,
    pub max_step_delay_ms: u64,
    /// Display throttle while in speed mode.
    pub report_interval_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            speed_mode: false,
            demo_phase_steps: 1000,
            autosave_interval: 2000,
            min_step_delay_ms: 40,
            max_step_delay_ms: 400,
            report_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStatus {
    Idle,
    Running,
    GameOver,
}

/// Handle to a spawned training loop: the command sender, the event
/// receiver, and the join handle. Dropping the handle shuts the loop
/// down.
pub struct LoopHandle {
    commands: Sender<LoopCommand>,
    events: Receiver<LoopEvent>,
    thread: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Send a command; returns false if the loop has terminated.
    pub fn send(&self, command: LoopCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn events(&self) -> &Receiver<LoopEvent> {
        &self.events
    }

    /// Block until the next event or the timeout elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoopEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Request shutdown and wait for the thread to finish.
    pub fn shutdown(mut self) {
        let _ = self.commands.send(LoopCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(LoopCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The training-loop actor. One instance per concurrent game; instances
/// share nothing and run fully in parallel. All mutable game state lives
/// in the owned `GameSession`.
pub struct TrainingLoop {
    config: LoopConfig,
    weights: RewardWeights,
    agent: ValueAgent,
    search: LookaheadSearch,
    store: ModelStore,
    session: Option<GameSession>,
    status: LoopStatus,
    speed_mode: bool,
    initialized: bool,
    total_steps: usize,
    last_report: Option<Instant>,
    events: Sender<LoopEvent>,
    rng: StdRng,
}

/// Spawn a training loop on its own thread.
pub fn spawn(config: AppConfig) -> LoopHandle {
    spawn_with_rng(config, StdRng::from_os_rng())
}

/// Spawn with a fixed seed for deterministic behavior in tests.
pub fn spawn_seeded(config: AppConfig, seed: u64) -> LoopHandle {
    spawn_with_rng(config, StdRng::seed_from_u64(seed))
}

fn spawn_with_rng(config: AppConfig, rng: StdRng) -> LoopHandle {
    let (command_tx, command_rx) = mpsc::channel::<LoopCommand>();
    let (event_tx, event_rx) = mpsc::channel::<LoopEvent>();

    let thread = thread::Builder::new()
        .name("training-loop".to_string())
        .spawn(move || {
            let mut instance = TrainingLoop::new(config, event_tx, rng);
            instance.run(command_rx);
        })
        .expect("spawning the training-loop thread");

    LoopHandle {
        commands: command_tx,
        events: event_rx,
        thread: Some(thread),
    }
}

impl TrainingLoop {
    fn new(config: AppConfig, events: Sender<LoopEvent>, mut rng: StdRng) -> Self {
        let agent_rng = StdRng::seed_from_u64(rng.random());
        TrainingLoop {
            weights: config.rewards,
            agent: ValueAgent::with_rng(config.dqn, agent_rng),
            search: LookaheadSearch::new(config.search, config.rewards),
            store: ModelStore::new(config.store),
            session: None,
            status: LoopStatus::Idle,
            speed_mode: config.game_loop.speed_mode,
            initialized: false,
            total_steps: 0,
            last_report: None,
            events,
            config: config.game_loop,
            rng,
        }
    }

    /// Serve commands until shutdown. The pending step is the
    /// `recv_timeout` deadline: arming a new deadline inherently cancels
    /// the previous one, so at most one step is ever in flight.
    fn run(&mut self, commands: Receiver<LoopCommand>) {
        let mut next_step: Option<Instant> = None;
        loop {
            let command = match next_step {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match commands.recv_timeout(timeout) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            match command {
                Some(LoopCommand::Shutdown) => break,
                Some(command) => next_step = self.handle_command(command, next_step),
                None => next_step = self.step(),
            }
        }
    }

    /// Handle one command, returning the (possibly re-armed) step
    /// deadline.
    fn handle_command(
        &mut self,
        command: LoopCommand,
        next_step: Option<Instant>,
    ) -> Option<Instant> {
        match command {
            LoopCommand::Init => {
                self.initialized = true;
                self.send(LoopEvent::Ready {
                    backend: BACKEND_LABEL.to_string(),
                });
                next_step
            }
            LoopCommand::StartGame {
                speed_mode,
                reward_weights,
            } => {
                if !self.initialized {
                    self.send_error("start requested before init");
                    return next_step;
                }
                if self.status == LoopStatus::Running {
                    self.send_error("game already running");
                    return next_step;
                }
                self.apply_options(speed_mode, reward_weights);
                self.start_episode();
                Some(Instant::now())
            }
            LoopCommand::ResetGame {
                speed_mode,
                reward_weights,
            } => {
                if !self.initialized {
                    self.send_error("reset requested before init");
                    return next_step;
                }
                self.apply_options(speed_mode, reward_weights);
                self.start_episode();
                Some(Instant::now())
            }
            LoopCommand::StopGame => {
                // Idempotent: repeated stops leave the loop Idle.
                self.status = LoopStatus::Idle;
                self.session = None;
                None
            }
            LoopCommand::SetSpeedMode(speed_mode) => {
                self.speed_mode = speed_mode;
                // Cancel the pending timer and arm one under the new pace.
                if self.status == LoopStatus::Running {
                    let empty = self
                        .session
                        .as_ref()
                        .map_or(CELL_COUNT, |s| s.board().empty_count());
                    Some(Instant::now() + self.step_delay(empty))
                } else {
                    next_step
                }
            }
            LoopCommand::SetRewardWeights(weights) => {
                self.weights = weights;
                self.search.set_weights(weights);
                next_step
            }
            LoopCommand::SaveModel { key } => {
                let key = key.unwrap_or_else(|| self.store.default_key().to_string());
                match self.store.save(&key, &self.agent) {
                    Ok(_) => self.send(LoopEvent::SaveDone),
                    Err(e) => {
                        // Non-fatal: the loop keeps stepping.
                        eprintln!("model save failed for key '{key}': {e}");
                        self.send_error(&format!("save failed: {e}"));
                    }
                }
                next_step
            }
            LoopCommand::LoadModel { key } => {
                let key = key.unwrap_or_else(|| self.store.default_key().to_string());
                match self.store.load(&key, &mut self.agent) {
                    Ok(_) => self.send(LoopEvent::LoadDone),
                    Err(crate::error::StoreError::NotFound { .. }) => {
                        // Recoverable: keep the untrained network.
                        eprintln!("no model under key '{key}', starting untrained");
                        self.send(LoopEvent::LoadDone);
                    }
                    Err(e) => {
                        eprintln!("model load failed for key '{key}': {e}");
                        self.send_error(&format!("load failed: {e}"));
                    }
                }
                next_step
            }
            LoopCommand::Shutdown => None, // handled by the caller
        }
    }

    fn apply_options(
        &mut self,
        speed_mode: Option<bool>,
        reward_weights: Option<RewardWeights>,
    ) {
        if let Some(speed_mode) = speed_mode {
            self.speed_mode = speed_mode;
        }
        if let Some(weights) = reward_weights {
            self.weights = weights;
            self.search.set_weights(weights);
        }
    }

    /// Replace the board wholesale and enter Running.
    fn start_episode(&mut self) {
        let session_rng = StdRng::seed_from_u64(self.rng.random());
        let session = GameSession::new(session_rng);
        self.send(LoopEvent::Display {
            tiles: session.board().tiles().to_vec(),
            score: session.score(),
            game_over: false,
        });
        self.session = Some(session);
        self.status = LoopStatus::Running;
        self.last_report = Some(Instant::now());
    }

    /// One scheduled step. Returns the next deadline, or None when the
    /// loop stops scheduling (idle, game over, or internal error).
    fn step(&mut self) -> Option<Instant> {
        if self.status != LoopStatus::Running {
            return None;
        }
        let prev_board = match self.session.as_ref() {
            Some(session) => session.board().clone(),
            None => return None,
        };

        let scores = self.search.score_directions(&prev_board);
        let action = if self.total_steps < self.config.demo_phase_steps {
            select_lookahead_action(&scores)
        } else {
            let encoded = encode_board_flat(&prev_board);
            self.agent.select_action(&encoded, &scores)
        };
        let Ok(direction) = Direction::from_index(action) else {
            self.send_error(&format!("internal error: action index {action}"));
            self.status = LoopStatus::GameOver;
            return None;
        };

        let (outcome, next_board, score) = {
            let session = self.session.as_mut().expect("running loop has a session");
            let outcome = session.apply(direction);
            (outcome, session.board().clone(), session.score())
        };

        let (gain, game_over) = match outcome {
            // A no-op changes nothing: reschedule without recording.
            Ok(MoveOutcome::NoOp) => {
                return Some(Instant::now() + self.step_delay(next_board.empty_count()));
            }
            Ok(MoveOutcome::Moved { gain, game_over }) => (gain, game_over),
            Err(e) => {
                // Spawn-with-full-board: game-over detection was skipped.
                // Abort the step and stop scheduling rather than corrupt
                // the session.
                self.send_error(&format!("internal error: {e}"));
                self.status = LoopStatus::GameOver;
                return None;
            }
        };

        let reward =
            heuristics::reward(&prev_board, &next_board, gain, game_over, &self.weights) as f32;
        self.agent.remember(Experience {
            state: encode_board_flat(&prev_board),
            action,
            reward,
            next_state: encode_board_flat(&next_board),
            done: game_over,
        });

        let loss = match self.agent.train_step() {
            Ok(loss) => loss,
            Err(e) => {
                // Numerical failure is per-step: log and keep going.
                eprintln!("training step failed: {e}");
                None
            }
        };
        self.total_steps += 1;

        if self.config.autosave_interval > 0
            && self.agent.step_count() > 0
            && self.agent.step_count() % self.config.autosave_interval == 0
        {
            let key = self.store.default_key().to_string();
            if let Err(e) = self.store.save(&key, &self.agent) {
                eprintln!("autosave failed for key '{key}': {e}");
            }
        }

        let report_due = !self.speed_mode
            || game_over
            || self.last_report.map_or(true, |t| {
                t.elapsed() >= Duration::from_millis(self.config.report_interval_ms)
            });
        if report_due {
            self.last_report = Some(Instant::now());
            self.send(LoopEvent::Display {
                tiles: next_board.tiles().to_vec(),
                score,
                game_over,
            });
            self.send(LoopEvent::TrainResult { loss });
        }

        if game_over {
            self.agent.end_episode();
            self.status = LoopStatus::GameOver;
            self.send(LoopEvent::GameOver { score });
            None
        } else {
            Some(Instant::now() + self.step_delay(next_board.empty_count()))
        }
    }

    /// Delay before the next step: an exponential ramp from the fast
    /// delay on a nearly empty board to the slow delay on a nearly full
    /// one. Speed mode steps immediately.
    fn step_delay(&self, empty: usize) -> Duration {
        if self.speed_mode {
            return Duration::ZERO;
        }
        let occupied = 1.0 - empty as f64 / CELL_COUNT as f64;
        let min = self.config.min_step_delay_ms as f64;
        let max = self.config.max_step_delay_ms.max(self.config.min_step_delay_ms) as f64;
        let ratio = max / min;
        Duration::from_millis((min * ratio.powf(occupied)).round() as u64)
    }

    fn send(&self, event: LoopEvent) {
        let _ = self.events.send(event);
    }

    fn send_error(&self, message: &str) {
        self.send(LoopEvent::Error {
            message: message.to_string(),
        });
    }
}
