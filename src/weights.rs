//! Sparse weight storage with lazy initialization.
//!
//! Keys (feature names, user ids, item ids) are only discovered at runtime, so weights
//! live in a HashMap and are materialized the first time they are read for update.
//!
//! # Invariants
//!
//! - Reading an absent key through [`SparseWeights::get_or_init`] inserts the
//!   initializer's output; afterwards it is indistinguishable from any stored weight.
//! - Keys are never evicted.
//! - Not thread-safe: one writer at a time. Replicas must be deep clones.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::initializer::Initializer;
use crate::learning::{LearningError, Result};

/// A value an optimizer can update coordinate by coordinate.
///
/// Implemented for `f64` (linear weights, biases) and `Vec<f64>` (latent vectors).
pub trait Param: Clone + Debug {
    /// Draw a fresh value of dimension `dim` from `initializer`.
    fn init(initializer: &mut Initializer, dim: usize) -> Self;

    /// A zero value with the same shape as `self`.
    fn zeros_like(&self) -> Self;

    fn as_slice(&self) -> &[f64];

    fn as_mut_slice(&mut self) -> &mut [f64];
}

impl Param for f64 {
    #[inline]
    fn init(initializer: &mut Initializer, _dim: usize) -> Self {
        initializer.value()
    }

    #[inline]
    fn zeros_like(&self) -> Self {
        0.0
    }

    #[inline]
    fn as_slice(&self) -> &[f64] {
        std::slice::from_ref(self)
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [f64] {
        std::slice::from_mut(self)
    }
}

impl Param for Vec<f64> {
    fn init(initializer: &mut Initializer, dim: usize) -> Self {
        initializer.vector(dim)
    }

    fn zeros_like(&self) -> Self {
        vec![0.0; self.len()]
    }

    #[inline]
    fn as_slice(&self) -> &[f64] {
        self
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [f64] {
        self
    }
}

/// Sparse mapping from key to weight.
///
/// # Example
///
/// ```
/// use streamlearn::initializer::Initializer;
/// use streamlearn::weights::SparseWeights;
///
/// let mut weights = SparseWeights::new(Initializer::constant(0.5).unwrap());
/// assert_eq!(*weights.get_or_init(&"x"), 0.5);
///
/// weights.set("x", 2.0);
/// assert_eq!(weights.get(&"x"), Some(&2.0));
/// assert_eq!(weights.get(&"unseen"), None);
/// ```
#[derive(Clone, Debug)]
pub struct SparseWeights<K, V = f64> {
    /// key -> weight
    values: HashMap<K, V>,
    /// Source of default values
    initializer: Initializer,
    /// Length of each value (1 for scalars)
    dim: usize,
}

impl<K> SparseWeights<K, f64>
where
    K: Eq + Hash + Clone,
{
    /// Scalar weights.
    pub fn new(initializer: Initializer) -> Self {
        Self::with_dim(initializer, 1)
    }
}

impl<K> SparseWeights<K, Vec<f64>>
where
    K: Eq + Hash + Clone,
{
    /// Latent vectors of length `n_factors`.
    pub fn latent(initializer: Initializer, n_factors: usize) -> Self {
        Self::with_dim(initializer, n_factors)
    }
}

impl<K> Default for SparseWeights<K, f64>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(Initializer::Zeros)
    }
}

impl<K, V> SparseWeights<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    /// Weights whose values have dimension `dim`.
    pub fn with_dim(initializer: Initializer, dim: usize) -> Self {
        Self {
            values: HashMap::new(),
            initializer,
            dim,
        }
    }

    /// Weight for `key`, materializing it from the initializer when absent.
    #[inline]
    pub fn get_or_init(&mut self, key: &K) -> &mut V {
        let Self {
            values,
            initializer,
            dim,
        } = self;
        values
            .entry(key.clone())
            .or_insert_with(|| V::init(initializer, *dim))
    }

    /// Like [`Self::get_or_init`], but draws an absent value from `initializer`
    /// instead of the map's own.
    #[inline]
    pub fn get_or_init_with(&mut self, key: &K, initializer: &mut Initializer) -> &mut V {
        let dim = self.dim;
        self.values
            .entry(key.clone())
            .or_insert_with(|| V::init(initializer, dim))
    }

    /// Weight for `key` without materializing it.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    /// Overwrite the weight for `key`.
    #[inline]
    pub fn set(&mut self, key: K, value: V) {
        debug_assert_eq!(value.as_slice().len(), self.dim, "weight dimension mismatch");
        self.values.insert(key, value);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Number of materialized keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.values.keys()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn initializer(&self) -> &Initializer {
        &self.initializer
    }

    /// Copy of the stored key -> value mapping.
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.values.clone()
    }

    /// Check that every value of `values` has dimension `dim`, without touching `self`.
    pub fn validate_snapshot(&self, values: &HashMap<K, V>) -> Result<()> {
        ensure_dim(values, self.dim)
    }

    /// Replace all stored weights.
    ///
    /// # Errors
    ///
    /// `LearningError::InvalidCheckpoint` if a value does not have dimension `dim`.
    pub fn restore(&mut self, values: HashMap<K, V>) -> Result<()> {
        self.validate_snapshot(&values)?;
        self.values = values;
        Ok(())
    }

    /// Fail if any stored weight is NaN or infinite.
    pub fn check_finite(&self) -> Result<()>
    where
        K: Debug,
    {
        for (key, value) in &self.values {
            if value.as_slice().iter().any(|w| !w.is_finite()) {
                log::warn!("Non-finite weight detected for key {:?}", key);
                return Err(LearningError::Divergence(format!(
                    "non-finite weight for key {:?}: {:?}",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

/// Fail with `InvalidCheckpoint` unless every value has `dim` components.
pub(crate) fn ensure_dim<K, V: Param>(values: &HashMap<K, V>, dim: usize) -> Result<()> {
    match values.values().find(|v| v.as_slice().len() != dim) {
        Some(bad) => Err(LearningError::InvalidCheckpoint(format!(
            "weight dimension mismatch: expected {}, got {}",
            dim,
            bad.as_slice().len()
        ))),
        None => Ok(()),
    }
}
