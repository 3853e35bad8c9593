use thiserror::Error;

/// Main error type for the bitcoin-feerate-estimator library.
#[derive(Error, Debug)]
pub enum EstimatorError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background estimation task terminated abnormally.
    #[error("Estimator task failed: {0}")]
    Task(String),
}

/// Type alias for Results in this library.
pub type Result<T> = std::result::Result<T, EstimatorError>;

impl EstimatorError {
    /// Creates an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a Task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}
