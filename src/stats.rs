//! Running statistics.

use serde::{Deserialize, Serialize};

/// Running arithmetic mean.
///
/// Updated incrementally so the full history never needs to be stored.
///
/// # Example
///
/// ```
/// use streamlearn::stats::Mean;
///
/// let mut mean = Mean::new();
/// for x in [1.0, 2.0, 3.0] {
///     mean.update(x);
/// }
/// assert_eq!(mean.get(), 2.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mean {
    n: u64,
    mean: f64,
}

impl Mean {
    /// Create an empty mean. [`Mean::get`] returns 0.0 until the first update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one value into the mean.
    #[inline]
    pub fn update(&mut self, x: f64) -> &mut Self {
        self.n += 1;
        self.mean += (x - self.mean) / self.n as f64;
        self
    }

    /// Current mean.
    #[inline]
    pub fn get(&self) -> f64 {
        self.mean
    }

    /// Number of values seen.
    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn reset(&mut self) {
        self.n = 0;
        self.mean = 0.0;
    }
}
