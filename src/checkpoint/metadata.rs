use serde::{Deserialize, Serialize};

use crate::ai::dqn::DqnConfig;

/// Metadata written beside the stored weights (`metadata.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub key: String,
    pub timestamp: u64,
    pub training_steps: usize,
    pub episodes: usize,
    pub epsilon: f32,
    pub hyperparameters: DqnConfig,
}
