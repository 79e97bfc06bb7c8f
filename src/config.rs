use std::path::Path;

use crate::ai::dqn::DqnConfig;
use crate::ai::heuristics::RewardWeights;
use crate::ai::lookahead::LookaheadConfig;
use crate::checkpoint::ModelStoreConfig;
use crate::error::ConfigError;
use crate::training::game_loop::LoopConfig;

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rewards: RewardWeights,
    pub dqn: DqnConfig,
    pub search: LookaheadConfig,
    pub game_loop: LoopConfig,
    pub store: ModelStoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            rewards: RewardWeights::default(),
            dqn: DqnConfig::default(),
            search: LookaheadConfig::default(),
            game_loop: LoopConfig::default(),
            store: ModelStoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            eprintln!(
                "Warning: config file '{}' not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dqn.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "dqn.learning_rate must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dqn.gamma) {
            return Err(ConfigError::Validation("dqn.gamma must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.dqn.epsilon_start) {
            return Err(ConfigError::Validation(
                "dqn.epsilon_start must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dqn.epsilon_min) {
            return Err(ConfigError::Validation(
                "dqn.epsilon_min must be in [0, 1]".into(),
            ));
        }
        if self.dqn.epsilon_min > self.dqn.epsilon_start {
            return Err(ConfigError::Validation(
                "dqn.epsilon_min must be <= dqn.epsilon_start".into(),
            ));
        }
        if self.dqn.batch_size == 0 {
            return Err(ConfigError::Validation("dqn.batch_size must be > 0".into()));
        }
        if self.dqn.memory_capacity < self.dqn.batch_size {
            return Err(ConfigError::Validation(
                "dqn.memory_capacity must be >= dqn.batch_size".into(),
            ));
        }
        if self.dqn.target_update_frequency == 0 {
            return Err(ConfigError::Validation(
                "dqn.target_update_frequency must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dqn.blend_weight) {
            return Err(ConfigError::Validation(
                "dqn.blend_weight must be in [0, 1]".into(),
            ));
        }

        if self.search.depth == 0 {
            return Err(ConfigError::Validation("search.depth must be >= 1".into()));
        }
        if self.search.discount <= 0.0 || self.search.discount > 1.0 {
            return Err(ConfigError::Validation(
                "search.discount must be in (0, 1]".into(),
            ));
        }

        let w = &self.rewards;
        let named = [
            ("rewards.merge_bonus", w.merge_bonus),
            ("rewards.empty_tiles", w.empty_tiles),
            ("rewards.monotonicity", w.monotonicity),
            ("rewards.corner_bonus", w.corner_bonus),
            ("rewards.smoothness", w.smoothness),
            ("rewards.max_tile_bonus", w.max_tile_bonus),
        ];
        for (name, value) in named {
            if value < 0.0 {
                return Err(ConfigError::Validation(format!("{name} must be >= 0")));
            }
        }
        if w.game_over_penalty > 0.0 {
            return Err(ConfigError::Validation(
                "rewards.game_over_penalty must be <= 0".into(),
            ));
        }

        if self.game_loop.min_step_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "game_loop.min_step_delay_ms must be >= 1".into(),
            ));
        }
        if self.game_loop.max_step_delay_ms < self.game_loop.min_step_delay_ms {
            return Err(ConfigError::Validation(
                "game_loop.max_step_delay_ms must be >= game_loop.min_step_delay_ms".into(),
            ));
        }
        if self.game_loop.report_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "game_loop.report_interval_ms must be >= 1".into(),
            ));
        }

        if self.store.default_key.is_empty() {
            return Err(ConfigError::Validation(
                "store.default_key must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for
    /// creating example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&AppConfig::default()).expect("default config serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[dqn]
learning_rate = 0.001
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!((config.dqn.learning_rate - 0.001).abs() < 1e-9);
        // Other fields should be defaults
        assert!((config.dqn.gamma - 0.95).abs() < 1e-6);
        assert_eq!(config.search.depth, 6);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        let default = AppConfig::default();
        assert!((config.dqn.learning_rate - default.dqn.learning_rate).abs() < 1e-9);
        assert_eq!(config.game_loop.demo_phase_steps, default.game_loop.demo_phase_steps);
    }

    #[test]
    fn test_validation_rejects_negative_lr() {
        let mut config = AppConfig::default();
        config.dqn.learning_rate = -0.001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_gamma() {
        let mut config = AppConfig::default();
        config.dqn.gamma = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_epsilon_min_gt_start() {
        let mut config = AppConfig::default();
        config.dqn.epsilon_start = 0.1;
        config.dqn.epsilon_min = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_capacity_lt_batch() {
        let mut config = AppConfig::default();
        config.dqn.memory_capacity = 10;
        config.dqn.batch_size = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_search_depth() {
        let mut config = AppConfig::default();
        config.search.depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_weight() {
        let mut config = AppConfig::default();
        config.rewards.smoothness = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_positive_game_over_penalty() {
        let mut config = AppConfig::default();
        config.rewards.game_over_penalty = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_delay_inversion() {
        let mut config = AppConfig::default();
        config.game_loop.min_step_delay_ms = 500;
        config.game_loop.max_step_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_default_key() {
        let mut config = AppConfig::default();
        config.store.default_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default(Path::new("nonexistent_config.toml")).unwrap();
        assert_eq!(config.search.depth, 6);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[search]
depth = 3

[rewards]
corner_bonus = 2.5
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.search.depth, 3);
        assert!((config.rewards.corner_bonus - 2.5).abs() < 1e-9);
        // Others are defaults
        assert!((config.dqn.learning_rate - 1e-4).abs() < 1e-9);
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml();
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        config.validate().expect("roundtripped config should be valid");
    }
}
