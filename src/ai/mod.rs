//! Agent machinery: heuristic board scoring, bounded-depth lookahead
//! search, one-hot state encoding, and the trainable value agent.

pub mod dqn;
pub mod heuristics;
pub mod lookahead;
pub mod state_encoding;
pub mod value_network;

pub use dqn::{AgentTrainingState, DqnConfig, ValueAgent, BACKEND_LABEL, NUM_ACTIONS};
pub use heuristics::RewardWeights;
pub use lookahead::{select_lookahead_action, LookaheadConfig, LookaheadSearch};
pub use value_network::{ValueNetwork, ValueNetworkConfig};
