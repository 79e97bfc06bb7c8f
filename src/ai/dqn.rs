use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::ai::state_encoding::{encode_batch, ENCODED_SIZE, ENCODING_CHANNELS};
use crate::ai::value_network::{ValueNetwork, ValueNetworkConfig};
use crate::error::{StoreError, TrainingError};
use crate::game::GRID_SIZE;
use crate::training::replay_buffer::{Experience, ReplayMemory};

pub type InferBackend = NdArray<f32>;
pub type TrainBackend = Autodiff<InferBackend>;

/// Number of tilt directions, and thus of network outputs.
pub const NUM_ACTIONS: usize = 4;

/// Human-readable label of the tensor backend, reported in `Ready`.
pub const BACKEND_LABEL: &str = "ndarray";

/// Value-learning hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub learning_rate: f64,
    pub gamma: f32,
    pub epsilon_start: f32,
    pub epsilon_min: f32,
    pub epsilon_decay_steps: usize,
    pub target_update_frequency: usize,
    pub batch_size: usize,
    pub memory_capacity: usize,
    /// Weight of the external (lookahead) score in blended selection.
    pub blend_weight: f64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            learning_rate: 1e-4,
            gamma: 0.95,
            epsilon_start: 0.9,
            epsilon_min: 0.05,
            epsilon_decay_steps: 20_000,
            target_update_frequency: 500,
            batch_size: 64,
            memory_capacity: 10_000,
            blend_weight: 0.6,
        }
    }
}

/// Serializable training-progress snapshot, persisted beside the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrainingState {
    pub epsilon: f32,
    pub step_count: usize,
    pub episode_count: usize,
    pub config: DqnConfig,
}

/// Trainable value agent: an online network updated every step, a frozen
/// target network synced periodically, and a replay memory of past
/// transitions.
pub struct ValueAgent {
    online: ValueNetwork<TrainBackend>,
    target: ValueNetwork<InferBackend>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<
        burn::optim::Adam,
        ValueNetwork<TrainBackend>,
        TrainBackend,
    >,
    memory: ReplayMemory,
    config: DqnConfig,
    device: <TrainBackend as Backend>::Device,
    epsilon: f32,
    step_count: usize,
    episode_count: usize,
    rng: StdRng,
}

impl ValueAgent {
    pub fn new(config: DqnConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_rng(config: DqnConfig, rng: StdRng) -> Self {
        let device = Default::default();
        let net_config = ValueNetworkConfig {};
        let online: ValueNetwork<TrainBackend> = net_config.init(&device);
        let target: ValueNetwork<InferBackend> = net_config.init(&device);
        let optimizer = AdamConfig::new().init();

        let epsilon = config.epsilon_start;
        let memory = ReplayMemory::new(config.memory_capacity);

        ValueAgent {
            online,
            target,
            optimizer,
            memory,
            config,
            device,
            epsilon,
            step_count: 0,
            episode_count: 0,
            rng,
        }
    }

    /// Online-network outputs for a single encoded board.
    pub fn q_values(&self, state: &[f32]) -> [f32; NUM_ACTIONS] {
        debug_assert_eq!(state.len(), ENCODED_SIZE);
        let tensor = Tensor::<InferBackend, 1>::from_data(TensorData::from(state), &self.device)
            .reshape([
                1,
                ENCODING_CHANNELS as i32,
                GRID_SIZE as i32,
                GRID_SIZE as i32,
            ]);
        let output = self.online.valid().forward(tensor);
        let values: Vec<f32> = output
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");
        let mut q = [0.0f32; NUM_ACTIONS];
        q.copy_from_slice(&values);
        q
    }

    /// Select a direction index. With probability epsilon, explore
    /// uniformly among the directions the external scorer considers valid
    /// (finite). Otherwise blend the min-max-normalized network outputs
    /// with the normalized external scores and take the argmax, forcing
    /// invalid directions to negative infinity. Falls back to the pure
    /// network argmax when no external score is finite.
    pub fn select_action(&mut self, state: &[f32], external: &[f64; NUM_ACTIONS]) -> usize {
        let valid: Vec<usize> = (0..NUM_ACTIONS)
            .filter(|&i| external[i].is_finite())
            .collect();

        if !valid.is_empty() && self.rng.random_range(0.0..1.0) < self.epsilon as f64 {
            return valid[self.rng.random_range(0..valid.len())];
        }

        let q = self.q_values(state);
        if valid.is_empty() {
            return argmax(&q.map(|v| v as f64));
        }

        let q_norm = min_max_normalize(&q.map(|v| v as f64));
        let ext_norm = min_max_normalize_over(external, &valid);

        let mut combined = [f64::NEG_INFINITY; NUM_ACTIONS];
        for &i in &valid {
            combined[i] = (1.0 - self.config.blend_weight) * q_norm[i]
                + self.config.blend_weight * ext_norm[i];
        }
        argmax(&combined)
    }

    /// Push a transition into the replay memory.
    pub fn remember(&mut self, experience: Experience) {
        self.memory.push(experience);
    }

    /// One training update. Returns `Ok(None)` until the memory holds a
    /// full batch. A non-finite loss aborts the update without touching
    /// the weights.
    pub fn train_step(&mut self) -> Result<Option<f32>, TrainingError> {
        if self.memory.len() < self.config.batch_size {
            return Ok(None);
        }

        let batch = self.memory.sample(self.config.batch_size);
        let batch_size = batch.len();

        let states: Vec<Vec<f32>> = batch.iter().map(|e| e.state.clone()).collect();
        let next_states: Vec<Vec<f32>> = batch.iter().map(|e| e.next_state.clone()).collect();
        let actions: Vec<usize> = batch.iter().map(|e| e.action).collect();
        let rewards: Vec<f32> = batch.iter().map(|e| e.reward).collect();
        let dones: Vec<bool> = batch.iter().map(|e| e.done).collect();

        // Forward pass on current states: [B, 4]
        let state_tensors = encode_batch::<TrainBackend>(&states, &self.device);
        let q_all = self.online.forward(state_tensors);

        // One-hot action mask [B, 4] to extract the taken action's value.
        let mut action_mask_data = vec![0.0f32; batch_size * NUM_ACTIONS];
        for (i, &a) in actions.iter().enumerate() {
            action_mask_data[i * NUM_ACTIONS + a] = 1.0;
        }
        let action_mask = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(action_mask_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size as i32, NUM_ACTIONS as i32]);

        // Q(s, a) = sum(q_all * mask, dim=1) -> [B, 1]
        let q_taken = (q_all * action_mask).sum_dim(1);

        // Bellman targets from the frozen target network (no grad).
        let next_state_tensors = encode_batch::<InferBackend>(&next_states, &self.device);
        let next_q_all = self.target.forward(next_state_tensors);
        let next_q_data: Vec<f32> = next_q_all
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let mut target_data = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            if dones[i] {
                target_data.push(rewards[i]);
            } else {
                let max_q = (0..NUM_ACTIONS)
                    .map(|a| next_q_data[i * NUM_ACTIONS + a])
                    .fold(f32::NEG_INFINITY, f32::max);
                target_data.push(rewards[i] + self.config.gamma * max_q);
            }
        }

        let targets = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(target_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size as i32, 1]);

        // MSE over the taken action only.
        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();

        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];
        if !loss_val.is_finite() {
            return Err(TrainingError::NonFiniteLoss { loss: loss_val });
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.online);
        self.online = self
            .optimizer
            .step(self.config.learning_rate, self.online.clone(), grads);

        self.step_count += 1;
        self.decay_epsilon();
        if self.step_count % self.config.target_update_frequency == 0 {
            self.target = self.online.valid();
        }

        Ok(Some(loss_val))
    }

    /// Linear decay from `epsilon_start` toward the floor over
    /// `epsilon_decay_steps` training steps; never drops below the floor.
    fn decay_epsilon(&mut self) {
        if self.config.epsilon_decay_steps == 0 {
            self.epsilon = self.config.epsilon_min;
            return;
        }
        let progress =
            (self.step_count as f32 / self.config.epsilon_decay_steps as f32).min(1.0);
        self.epsilon = (self.config.epsilon_start
            + (self.config.epsilon_min - self.config.epsilon_start) * progress)
            .max(self.config.epsilon_min);
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Set epsilon directly (e.g. 0.0 for deterministic selection).
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Record that an episode finished (for persistence metadata).
    pub fn end_episode(&mut self) {
        self.episode_count += 1;
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Save the online-network weights.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(), StoreError> {
        let recorder = DefaultRecorder::default();
        self.online
            .clone()
            .valid()
            .save_file(dir.join("value_network"), &recorder)
            .map_err(|e| StoreError::ModelSave(e.to_string()))?;
        Ok(())
    }

    /// Load the online-network weights and re-sync the target network.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<(), StoreError> {
        let recorder = DefaultRecorder::default();
        let net_config = ValueNetworkConfig {};
        let online: ValueNetwork<TrainBackend> = net_config
            .init(&self.device)
            .load_file(dir.join("value_network"), &recorder, &self.device)
            .map_err(|e| StoreError::ModelLoad(e.to_string()))?;
        self.online = online;
        self.target = self.online.valid();
        Ok(())
    }

    /// Export the training state for persistence.
    pub fn training_state(&self) -> AgentTrainingState {
        AgentTrainingState {
            epsilon: self.epsilon,
            step_count: self.step_count,
            episode_count: self.episode_count,
            config: self.config.clone(),
        }
    }

    /// Restore the training state from a persisted snapshot.
    pub fn restore_training_state(&mut self, state: &AgentTrainingState) {
        self.epsilon = state.epsilon;
        self.step_count = state.step_count;
        self.episode_count = state.episode_count;
        self.config = state.config.clone();
    }
}

fn argmax(values: &[f64; NUM_ACTIONS]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

fn min_max_normalize(values: &[f64; NUM_ACTIONS]) -> [f64; NUM_ACTIONS] {
    let indices: Vec<usize> = (0..NUM_ACTIONS).collect();
    min_max_normalize_over(values, &indices)
}

/// Normalize the entries at `indices` to [0, 1]; a degenerate range maps
/// to 0.5 everywhere. Entries outside `indices` are left at 0.
fn min_max_normalize_over(values: &[f64; NUM_ACTIONS], indices: &[usize]) -> [f64; NUM_ACTIONS] {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &i in indices {
        min = min.min(values[i]);
        max = max.max(values[i]);
    }
    let range = max - min;
    let mut normalized = [0.0; NUM_ACTIONS];
    for &i in indices {
        normalized[i] = if range > 0.0 {
            (values[i] - min) / range
        } else {
            0.5
        };
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DqnConfig {
        DqnConfig {
            batch_size: 4,
            memory_capacity: 32,
            epsilon_decay_steps: 10,
            target_update_frequency: 5,
            ..DqnConfig::default()
        }
    }

    fn dummy_experience(action: usize, reward: f32, done: bool) -> Experience {
        let mut state = vec![0.0f32; ENCODED_SIZE];
        state[0] = 1.0;
        let mut next_state = vec![0.0f32; ENCODED_SIZE];
        next_state[ENCODED_SIZE - 1] = 1.0;
        Experience {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }

    #[test]
    fn test_greedy_selection_respects_external_validity() {
        let mut agent = ValueAgent::with_rng(small_config(), StdRng::seed_from_u64(1));
        agent.set_epsilon(0.0);
        let state = vec![0.0f32; ENCODED_SIZE];
        let external = [1.0, f64::NEG_INFINITY, 0.5, f64::NEG_INFINITY];
        for _ in 0..5 {
            let action = agent.select_action(&state, &external);
            assert!(action == 0 || action == 2, "picked invalid action {action}");
        }
    }

    #[test]
    fn test_exploration_stays_within_valid_directions() {
        let mut agent = ValueAgent::with_rng(small_config(), StdRng::seed_from_u64(2));
        agent.set_epsilon(1.0);
        let state = vec![0.0f32; ENCODED_SIZE];
        let external = [f64::NEG_INFINITY, 2.0, f64::NEG_INFINITY, 1.0];
        for _ in 0..20 {
            let action = agent.select_action(&state, &external);
            assert!(action == 1 || action == 3);
        }
    }

    #[test]
    fn test_single_valid_direction_always_chosen() {
        let mut agent = ValueAgent::with_rng(small_config(), StdRng::seed_from_u64(3));
        agent.set_epsilon(0.0);
        let state = vec![0.0f32; ENCODED_SIZE];
        let external = [
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            7.0,
        ];
        assert_eq!(agent.select_action(&state, &external), 3);
    }

    #[test]
    fn test_falls_back_to_network_when_no_valid_external() {
        let mut agent = ValueAgent::with_rng(small_config(), StdRng::seed_from_u64(4));
        agent.set_epsilon(0.0);
        let state = vec![0.0f32; ENCODED_SIZE];
        let external = [f64::NEG_INFINITY; NUM_ACTIONS];
        let action = agent.select_action(&state, &external);
        assert!(action < NUM_ACTIONS);
    }

    #[test]
    fn test_train_step_is_noop_until_one_batch() {
        let mut agent = ValueAgent::with_rng(small_config(), StdRng::seed_from_u64(5));
        for i in 0..3 {
            agent.remember(dummy_experience(i % NUM_ACTIONS, 0.5, false));
            assert!(agent.train_step().unwrap().is_none());
        }
        agent.remember(dummy_experience(0, 0.5, true));
        let loss = agent.train_step().unwrap();
        assert!(loss.is_some());
        assert!(loss.unwrap().is_finite());
        assert_eq!(agent.step_count(), 1);
    }

    #[test]
    fn test_epsilon_decays_monotonically_to_floor() {
        let config = small_config();
        let floor = config.epsilon_min;
        let mut agent = ValueAgent::with_rng(config, StdRng::seed_from_u64(6));
        for i in 0..4 {
            agent.remember(dummy_experience(i, 0.0, false));
        }
        let mut last = agent.epsilon();
        for _ in 0..15 {
            agent.train_step().unwrap();
            let eps = agent.epsilon();
            assert!(eps <= last + 1e-6, "epsilon increased: {last} -> {eps}");
            assert!(eps >= floor - 1e-6, "epsilon fell below the floor");
            last = eps;
        }
        // Past epsilon_decay_steps the floor is reached exactly.
        assert!((agent.epsilon() - floor).abs() < 1e-6);
    }

    #[test]
    fn test_min_max_normalize_maps_to_unit_interval() {
        let normalized = min_max_normalize(&[1.0, 3.0, 2.0, 3.0]);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[1], 1.0);
        assert!((normalized[2] - 0.5).abs() < 1e-9);

        // Degenerate range maps to 0.5.
        let flat = min_max_normalize(&[2.0, 2.0, 2.0, 2.0]);
        assert!(flat.iter().all(|v| (*v - 0.5).abs() < 1e-9));
    }
}
