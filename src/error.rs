use std::path::PathBuf;

/// Errors raised by the board engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no empty cell to spawn a tile on (game-over check was skipped)")]
    BoardFull,

    #[error("invalid action index {0} (expected 0..4)")]
    InvalidAction(usize),
}

/// Errors that can occur during a training step.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("training produced a non-finite loss: {loss}")]
    NonFiniteLoss { loss: f32 },

    #[error("model store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur in the key-addressed model store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no model stored under key '{key}'")]
    NotFound { key: String },

    #[error("invalid model key '{key}' (must be non-empty, no path separators)")]
    InvalidKey { key: String },

    #[error("failed to save model weights: {0}")]
    ModelSave(String),

    #[error("failed to load model weights: {0}")]
    ModelLoad(String),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
