//! Training infrastructure: the loop actor, its channel protocol, the
//! replay memory, and rolling episode metrics.

pub mod game_loop;
pub mod messages;
pub mod metrics;
pub mod replay_buffer;

pub use game_loop::{spawn, spawn_seeded, LoopConfig, LoopHandle};
pub use messages::{LoopCommand, LoopEvent};
pub use replay_buffer::{Experience, ReplayMemory};
