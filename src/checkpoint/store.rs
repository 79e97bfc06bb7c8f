use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::ai::dqn::{AgentTrainingState, ValueAgent};
use crate::checkpoint::metadata::ModelMetadata;
use crate::error::StoreError;

/// Configuration of the key-addressed model store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelStoreConfig {
    pub root_dir: PathBuf,
    pub default_key: String,
}

impl Default for ModelStoreConfig {
    fn default() -> Self {
        ModelStoreConfig {
            root_dir: PathBuf::from("models"),
            default_key: "latest".to_string(),
        }
    }
}

/// Key-addressed persistence for agent models. Each key maps to one
/// directory holding the network weights, the training-state snapshot,
/// and a metadata file; saves go through a temp directory and an atomic
/// rename.
pub struct ModelStore {
    config: ModelStoreConfig,
}

impl ModelStore {
    pub fn new(config: ModelStoreConfig) -> Self {
        fs::create_dir_all(&config.root_dir).ok();
        ModelStore { config }
    }

    pub fn default_key(&self) -> &str {
        &self.config.default_key
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && !key.contains("..");
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidKey {
                key: key.to_string(),
            })
        }
    }

    fn key_dir(&self, key: &str) -> PathBuf {
        self.config.root_dir.join(key)
    }

    /// Persist the agent's online network and training state under `key`,
    /// replacing any previous model stored there.
    pub fn save(&self, key: &str, agent: &ValueAgent) -> Result<PathBuf, StoreError> {
        Self::validate_key(key)?;
        let final_dir = self.key_dir(key);
        let tmp_dir = self.config.root_dir.join(format!("{key}.tmp"));

        fs::create_dir_all(&tmp_dir)?;
        agent.save_to_dir(&tmp_dir)?;

        let state = agent.training_state();
        fs::write(
            tmp_dir.join("training_state.json"),
            serde_json::to_string_pretty(&state)?,
        )?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let metadata = ModelMetadata {
            key: key.to_string(),
            timestamp,
            training_steps: agent.step_count(),
            episodes: agent.episode_count(),
            epsilon: agent.epsilon(),
            hyperparameters: agent.config().clone(),
        };
        fs::write(
            tmp_dir.join("metadata.json"),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;
        Ok(final_dir)
    }

    /// Load the model stored under `key` into the agent (the target
    /// network is re-synced from the loaded weights) and restore its
    /// training state. `StoreError::NotFound` when the key is absent.
    pub fn load(&self, key: &str, agent: &mut ValueAgent) -> Result<ModelMetadata, StoreError> {
        Self::validate_key(key)?;
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }

        agent.load_from_dir(&dir)?;

        let state_path = dir.join("training_state.json");
        let state_json =
            fs::read_to_string(&state_path).map_err(|e| StoreError::MetadataRead {
                path: state_path.clone(),
                source: e,
            })?;
        let state: AgentTrainingState =
            serde_json::from_str(&state_json).map_err(|e| StoreError::MetadataParse {
                path: state_path,
                source: e,
            })?;
        agent.restore_training_state(&state);

        self.read_metadata(key)
    }

    fn read_metadata(&self, key: &str) -> Result<ModelMetadata, StoreError> {
        let meta_path = self.key_dir(key).join("metadata.json");
        let meta_json = fs::read_to_string(&meta_path).map_err(|e| StoreError::MetadataRead {
            path: meta_path.clone(),
            source: e,
        })?;
        serde_json::from_str(&meta_json).map_err(|e| StoreError::MetadataParse {
            path: meta_path,
            source: e,
        })
    }

    /// All stored models, sorted by key.
    pub fn list(&self) -> Result<Vec<ModelMetadata>, StoreError> {
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.config.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let key = name.to_string_lossy();
            if key.ends_with(".tmp") || Self::validate_key(&key).is_err() {
                continue;
            }
            if entry.path().join("metadata.json").exists() {
                results.push(self.read_metadata(&key)?);
            }
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}
