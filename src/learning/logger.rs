//! Progress log for long training streams.
//!
//! Every `interval` examples the logger writes one batch line with the mean absolute
//! error of that batch and the throughput so far. Lines go to
//! `<log_dir>/progress_YYYYMMDD_HHMMSS.log` through a background writer thread, so
//! `record` never blocks on file I/O.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::learning::{LearningError, Result};

/// Default batch log interval (1,000 examples).
pub const DEFAULT_LOG_INTERVAL: u64 = 1_000;

/// Batch mean absolute error above which a divergence warning is written.
pub const ERROR_DIVERGENCE_THRESHOLD: f64 = 1e6;

/// Statistics of one logged batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchStats {
    /// Total number of examples recorded so far.
    pub examples_seen: u64,
    /// Mean absolute error over this batch.
    pub batch_mae: f64,
    /// Examples per second since the logger started.
    pub examples_per_sec: f64,
    /// Elapsed time in seconds since the logger started.
    pub elapsed_secs: f64,
}

impl BatchStats {
    /// Build batch stats from the accumulated absolute error.
    ///
    /// # Arguments
    ///
    /// * `examples_seen` - Total examples recorded
    /// * `abs_error_sum` - Sum of `|y_true - y_pred|` over the batch
    /// * `batch_len` - Number of examples in the batch
    /// * `elapsed_secs` - Total elapsed time
    pub fn from_errors(
        examples_seen: u64,
        abs_error_sum: f64,
        batch_len: u64,
        elapsed_secs: f64,
    ) -> Self {
        if batch_len == 0 {
            return Self {
                examples_seen,
                elapsed_secs,
                ..Default::default()
            };
        }

        let examples_per_sec = if elapsed_secs > 0.0 {
            examples_seen as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            examples_seen,
            batch_mae: abs_error_sum / batch_len as f64,
            examples_per_sec,
            elapsed_secs,
        }
    }
}

/// Log message types for async logging.
#[derive(Clone, Debug)]
enum LogMessage {
    Batch(BatchStats),
    Warning(String),
    Info(String),
    Shutdown,
}

/// Non-blocking progress logger.
///
/// # Example
///
/// ```no_run
/// use streamlearn::learning::ProgressLogger;
///
/// # fn run() -> streamlearn::learning::Result<()> {
/// let mut logger = ProgressLogger::new("logs/", 100)?;
/// for i in 0..1_000 {
///     let y = i as f64;
///     logger.record(y, y + 0.5);
/// }
/// logger.log_info("done");
/// logger.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct ProgressLogger {
    /// Sender for async log messages.
    sender: Sender<LogMessage>,
    /// Background writer thread handle.
    writer_handle: Option<JoinHandle<()>>,
    start_time: Instant,
    log_path: PathBuf,
    interval: u64,
    examples_seen: u64,
    batch_abs_error: f64,
    batch_len: u64,
}

impl ProgressLogger {
    /// Create a new progress logger writing a batch line every `interval` examples.
    ///
    /// Creates the log directory if it doesn't exist and starts the background writer
    /// thread.
    ///
    /// # Errors
    ///
    /// - `LearningError::Config` if `interval` is zero
    /// - `LearningError::Io` if directory creation or file open fails
    pub fn new<P: AsRef<Path>>(log_dir: P, interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(LearningError::Config(
                "interval should be at least 1".to_string(),
            ));
        }

        let log_dir = log_dir.as_ref().to_path_buf();
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir)?;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("progress_{}.log", timestamp));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let (sender, receiver) = mpsc::channel();
        let writer_handle = Self::start_writer_thread(file, receiver);

        let logger = Self {
            sender,
            writer_handle: Some(writer_handle),
            start_time: Instant::now(),
            log_path,
            interval,
            examples_seen: 0,
            batch_abs_error: 0.0,
            batch_len: 0,
        };

        logger.log_info(&format!("Progress logger initialized (interval: {})", interval));
        Ok(logger)
    }

    fn start_writer_thread(file: File, receiver: Receiver<LogMessage>) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut writer = BufWriter::new(file);

            while let Ok(msg) = receiver.recv() {
                if let LogMessage::Shutdown = msg {
                    break;
                }
                if let Err(e) = Self::write_message(&mut writer, &msg) {
                    log::error!("Progress logger write failed: {}", e);
                }
            }

            let _ = writer.flush();
        })
    }

    fn write_message<W: Write>(writer: &mut W, msg: &LogMessage) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        match msg {
            LogMessage::Batch(stats) => {
                writeln!(
                    writer,
                    "[{}] BATCH {:>10} | mae:{:.6} | {:.1} ex/s | {:.1}s",
                    timestamp,
                    stats.examples_seen,
                    stats.batch_mae,
                    stats.examples_per_sec,
                    stats.elapsed_secs
                )?;
            }
            LogMessage::Warning(msg) => {
                writeln!(writer, "[{}] WARNING: {}", timestamp, msg)?;
            }
            LogMessage::Info(msg) => {
                writeln!(writer, "[{}] INFO: {}", timestamp, msg)?;
            }
            LogMessage::Shutdown => {}
        }

        writer.flush()
    }

    /// Record one prediction made before training on `y_true`.
    ///
    /// Returns the batch statistics when this example completes a batch.
    pub fn record(&mut self, y_true: f64, y_pred: f64) -> Option<BatchStats> {
        self.examples_seen += 1;
        self.batch_abs_error += (y_true - y_pred).abs();
        self.batch_len += 1;

        if self.examples_seen % self.interval != 0 {
            return None;
        }

        let stats = BatchStats::from_errors(
            self.examples_seen,
            self.batch_abs_error,
            self.batch_len,
            self.elapsed_secs(),
        );
        self.batch_abs_error = 0.0;
        self.batch_len = 0;

        self.log_batch(&stats);
        self.check_divergence(stats.batch_mae);
        Some(stats)
    }

    /// Log batch statistics. Non-blocking.
    pub fn log_batch(&self, stats: &BatchStats) {
        let _ = self.sender.send(LogMessage::Batch(stats.clone()));
    }

    /// Log warning message. Also forwarded to the `log` facade.
    pub fn log_warning(&self, message: &str) {
        log::warn!("{}", message);
        let _ = self.sender.send(LogMessage::Warning(message.to_string()));
    }

    /// Log info message.
    pub fn log_info(&self, message: &str) {
        let _ = self.sender.send(LogMessage::Info(message.to_string()));
    }

    /// Warn if a batch error is NaN, infinite or above [`ERROR_DIVERGENCE_THRESHOLD`].
    ///
    /// Returns true if divergence was detected.
    pub fn check_divergence(&self, batch_mae: f64) -> bool {
        if batch_mae.is_nan() {
            self.log_warning("Training divergence: NaN error detected");
            return true;
        }
        if batch_mae.is_infinite() {
            self.log_warning("Training divergence: Infinite error detected");
            return true;
        }
        if batch_mae > ERROR_DIVERGENCE_THRESHOLD {
            self.log_warning(&format!(
                "Training divergence: Extreme error {} (threshold: {})",
                batch_mae, ERROR_DIVERGENCE_THRESHOLD
            ));
            return true;
        }
        false
    }

    pub fn examples_seen(&self) -> u64 {
        self.examples_seen
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Shutdown the logger and wait for background thread to finish.
    pub fn shutdown(mut self) -> Result<()> {
        let _ = self.sender.send(LogMessage::Shutdown);

        if let Some(handle) = self.writer_handle.take() {
            handle
                .join()
                .map_err(|_| LearningError::Io(std::io::Error::other("Logger thread panicked")))?;
        }

        Ok(())
    }
}

impl Drop for ProgressLogger {
    fn drop(&mut self) {
        let _ = self.sender.send(LogMessage::Shutdown);

        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}
