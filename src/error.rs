use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;

/// Why a single symbol's evaluation was dropped from a batch.
///
/// Never escapes the batch: the scheduler records it in the batch run and
/// moves on.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("{symbol}: data unavailable ({reason})")]
    DataUnavailable { symbol: String, reason: String },

    #[error("{symbol}: {what} timed out after {after_ms}ms")]
    Timeout {
        symbol: String,
        what: String,
        after_ms: u64,
    },

    #[error("{symbol}: evaluation task failed ({reason})")]
    TaskFailed { symbol: String, reason: String },
}

impl EvaluationError {
    pub fn unavailable(symbol: &str, err: &AppError) -> Self {
        EvaluationError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn timeout(symbol: &str, what: impl Into<String>, after: Duration) -> Self {
        EvaluationError::Timeout {
            symbol: symbol.to_string(),
            what: what.into(),
            after_ms: after.as_millis() as u64,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            EvaluationError::DataUnavailable { symbol, .. }
            | EvaluationError::Timeout { symbol, .. }
            | EvaluationError::TaskFailed { symbol, .. } => symbol,
        }
    }
}
