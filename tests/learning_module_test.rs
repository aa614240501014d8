//! Tests for the learning module: error types and the progress logger driven by a
//! real training stream.

use std::fs;
use std::io;

use streamlearn::base::{Features, Regressor};
use streamlearn::learning::{
    CheckpointManager, DEFAULT_LOG_INTERVAL, LearningError, ProgressLogger,
};
use streamlearn::linear_model::{LinearRegression, LinearRegressionConfig};
use streamlearn::optim::OptimizerConfig;
use tempfile::tempdir;

/// Test that LearningError::Io converts from std::io::Error
#[test]
fn test_learning_error_io_variant() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let error: LearningError = io_error.into();

    assert!(error.to_string().contains("I/O"));
}

/// Test that configuration errors name the offending parameter
#[test]
fn test_config_error_names_parameter() {
    let err = LinearRegression::<u32>::new(LinearRegressionConfig {
        l2: -1.0,
        ..Default::default()
    })
    .unwrap_err();

    assert!(matches!(err, LearningError::Config(_)));
    assert!(err.to_string().contains("l2"));
}

/// Test that the optimizer's eps is validated
#[test]
fn test_zero_eps_rejected() {
    let config = OptimizerConfig::ada_max(0.1, 0.9, 0.999, 0.0);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("eps"));
}

/// Test that check_finite reports diverged weights
#[test]
fn test_divergence_detected() {
    let mut model = LinearRegression::new(LinearRegressionConfig {
        optimizer: OptimizerConfig::sgd(10.0),
        clip_gradient: f64::MAX,
        ..Default::default()
    })
    .unwrap();
    let x: Features<&str> = [("x", 100.0)].into_iter().collect();

    let mut diverged = false;
    for _ in 0..200 {
        model.fit_one(&x, 1.0);
        if let Err(err) = model.check_finite() {
            assert!(matches!(err, LearningError::Divergence(_)));
            diverged = true;
            break;
        }
    }
    assert!(diverged);
}

/// Test logging a full training run and checkpointing at the end
#[test]
fn test_training_run_with_logger_and_checkpoint() {
    let dir = tempdir().unwrap();
    let mut logger = ProgressLogger::new(dir.path().join("logs"), 100).unwrap();
    let manager = CheckpointManager::new(dir.path().join("checkpoints"), 2, true).unwrap();

    let mut model: LinearRegression<&str> = LinearRegression::default();
    let mut batches = Vec::new();
    for i in 0..1_000 {
        let x_value = (i % 10) as f64 / 10.0;
        let x: Features<&str> = [("x", x_value)].into_iter().collect();
        let y = 3.0 * x_value - 1.0;

        let y_pred = model.predict_one(&x);
        model.fit_one(&x, y);
        if let Some(stats) = logger.record(y, y_pred) {
            batches.push(stats);
        }
    }

    assert_eq!(batches.len(), 10);
    assert!(batches.last().unwrap().batch_mae < batches[0].batch_mae);

    manager
        .save(logger.examples_seen(), &model.snapshot())
        .unwrap();
    let log_path = logger.log_path().to_path_buf();
    logger.shutdown().unwrap();

    let log = fs::read_to_string(log_path).unwrap();
    assert_eq!(log.matches("BATCH").count(), 10);
    assert!(!log.contains("WARNING"));
    assert!(manager.find_latest().unwrap().is_some());
}

#[test]
fn test_default_log_interval() {
    assert_eq!(DEFAULT_LOG_INTERVAL, 1_000);
}
