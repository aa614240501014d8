//! Training support: errors, checkpoints and progress logging.
//!
//! The numerical core (weights, optimizers, models) never performs I/O. This module
//! collects everything around it that does, plus the error type shared by the whole crate.
//!
//! # Overview
//!
//! - **LearningError**: structured error enum returned by constructors and persistence
//! - **CheckpointManager**: CRC32-checked, optionally gzip-compressed snapshot files
//! - **ProgressLogger**: non-blocking, timestamped progress log for long training streams
//!
//! # Example
//!
//! ```ignore
//! use streamlearn::learning::{CheckpointManager, ProgressLogger};
//!
//! let mut logger = ProgressLogger::new("logs/", 1_000)?;
//! let manager = CheckpointManager::new("checkpoints/", 5, true)?;
//!
//! for (x, y) in stream {
//!     let y_pred = model.predict_one(&x);
//!     model.fit_one(&x, y);
//!     logger.record(y, y_pred);
//! }
//! manager.save(logger.examples_seen(), &model.snapshot())?;
//! logger.shutdown()?;
//! ```

use thiserror::Error;

pub mod checkpoint;
pub mod logger;

pub use checkpoint::{
    CHECKPOINT_MAGIC, CHECKPOINT_VERSION, CheckpointHeader, CheckpointInfo, CheckpointManager,
    DEFAULT_RETENTION_COUNT, FLAG_COMPRESSED,
};
pub use error::LearningError;
pub use logger::{BatchStats, DEFAULT_LOG_INTERVAL, ERROR_DIVERGENCE_THRESHOLD, ProgressLogger};

/// Error types for the crate
mod error {
    use super::*;

    /// Learning system error type
    ///
    /// # Error Categories
    ///
    /// - **Configuration Errors**: invalid hyperparameters, rejected at construction
    /// - **I/O Errors**: checkpoint and log file operations
    /// - **Validation Errors**: checkpoint corruption, snapshot shape mismatch
    /// - **Runtime Errors**: non-finite parameters found by an explicit check
    ///
    /// # Recovery Strategies
    ///
    /// | Variant | Recovery |
    /// |---------|----------|
    /// | `Config` | Report configuration issue, abort |
    /// | `Io` | Retry once for saves; log and continue for logging |
    /// | `InvalidCheckpoint` | Report error, allow fresh start |
    /// | `Serialization` | Report error, allow fresh start |
    /// | `Divergence` | Lower the learning rate or reset the model |
    #[derive(Error, Debug)]
    pub enum LearningError {
        /// Configuration error
        ///
        /// Occurs when a constructor receives an invalid value:
        /// - Non-finite or non-positive learning rate
        /// - Decay rates outside `[0, 1)`
        /// - `eps <= 0` (the update rules divide by `x + eps`)
        #[error("Configuration error: {0}")]
        Config(String),

        /// I/O errors (file, checkpoint)
        ///
        /// Implements `From<std::io::Error>` for automatic conversion.
        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        /// Checkpoint corruption, version mismatch or snapshot shape mismatch
        #[error("Invalid checkpoint: {0}")]
        InvalidCheckpoint(String),

        /// Payload could not be encoded or decoded
        #[error("Serialization error: {0}")]
        Serialization(String),

        /// Parameters diverged (NaN, infinite values)
        #[error("Parameters diverged: {0}")]
        Divergence(String),
    }

    impl From<bincode::error::EncodeError> for LearningError {
        fn from(err: bincode::error::EncodeError) -> Self {
            LearningError::Serialization(err.to_string())
        }
    }

    impl From<bincode::error::DecodeError> for LearningError {
        fn from(err: bincode::error::DecodeError) -> Self {
            LearningError::Serialization(err.to_string())
        }
    }
}

/// Shorthand for results carrying a [`LearningError`].
pub type Result<T> = std::result::Result<T, LearningError>;

/// Reject a hyperparameter that is not a finite number.
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LearningError::Config(format!(
            "{} should be a finite number but got {}",
            name, value
        )))
    }
}

/// Reject a hyperparameter that is not strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(LearningError::Config(format!(
            "{} should be strictly positive but got {}",
            name, value
        )))
    }
}

/// Reject a hyperparameter that is negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(LearningError::Config(format!(
            "{} should be non-negative but got {}",
            name, value
        )))
    }
}

/// Reject a decay rate outside `[0, 1)`.
pub(crate) fn ensure_unit_interval(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(LearningError::Config(format!(
            "{} should be in [0, 1) but got {}",
            name, value
        )))
    }
}
