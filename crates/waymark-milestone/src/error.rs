use thiserror::Error;

/// Fatal milestone configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("milestone #{index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate milestone id: \"{0}\"")]
    DuplicateId(String),

    #[error("invalid short-form trigger \"{value}\": expected \"<property> <operator> <number>\"")]
    InvalidShortTrigger { value: String },

    #[error("trigger must be a string or a mapping, got: {0}")]
    InvalidTrigger(String),
}
