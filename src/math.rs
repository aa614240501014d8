//! Small numeric helpers shared by the models.

use std::collections::HashMap;
use std::hash::Hash;

/// Clamp `x` into `[lo, hi]`.
///
/// Returns `lo` when `x < lo`, `hi` when `x > hi`, and `x` otherwise. Unlike
/// [`f64::clamp`] this never panics when the bounds cross, which can happen with
/// AdaBound's dynamic bounds in the first few iterations.
#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Dot product between two dense slices of equal length.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "dot product of mismatched lengths");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Dot product between a sparse feature map and a lookup of weights.
///
/// Missing weights count as 0.0.
pub fn sparse_dot<K, F>(x: &HashMap<K, f64>, weight: F) -> f64
where
    K: Eq + Hash,
    F: Fn(&K) -> Option<f64>,
{
    x.iter()
        .map(|(i, xi)| weight(i).map_or(0.0, |wi| wi * xi))
        .sum()
}

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Normalize raw scores into probabilities.
///
/// The maximum is subtracted before exponentiating. An empty input yields an
/// empty map.
pub fn softmax<L>(scores: HashMap<L, f64>) -> HashMap<L, f64>
where
    L: Eq + Hash,
{
    let Some(maximum) = scores.values().copied().reduce(f64::max) else {
        return HashMap::new();
    };

    let exps: HashMap<L, f64> = scores
        .into_iter()
        .map(|(label, score)| (label, (score - maximum).exp()))
        .collect();
    let total: f64 = exps.values().sum();

    if total > 0.0 {
        exps.into_iter().map(|(l, e)| (l, e / total)).collect()
    } else {
        HashMap::new()
    }
}

/// Label with the highest probability. Ties keep the first label encountered.
pub fn argmax<L: Clone>(probabilities: &HashMap<L, f64>) -> Option<L> {
    probabilities
        .iter()
        .fold(None::<(&L, f64)>, |best, (label, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((label, p)),
        })
        .map(|(label, _)| label.clone())
}
