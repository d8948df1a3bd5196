use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing metric score for weighted metric `{0}`")]
    MissingMetric(String),

    #[error("batch of {size} pairs exceeds the configured limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid scoring configuration: {0}")]
    InvalidConfig(String),
}

impl From<rusqlite::Error> for EvalError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for EvalError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;
