//! Loss functions.
//!
//! Contract (consumed by the objective adapter):
//! - `forward(pred, target) -> f32` computes the per-sample loss.
//! - `backward(pred, target, d_pred) -> f32` additionally writes
//!   `dL/d(pred)` and returns the loss.
//!
//! `NegativeLogLikelihood` expects log-probabilities (pair it with a
//! [`LogSoftmax`](crate::layer::LogSoftmax) output layer) and a one-hot
//! target row.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loss {
    /// Mean squared error: `0.5 * mean((pred - target)^2)`.
    #[default]
    Mse,
    /// Negative log-likelihood over log-probabilities with one-hot targets.
    NegativeLogLikelihood,
}

impl Loss {
    /// Per-sample loss value. Shape contract: `pred.len() == target.len()`.
    #[inline]
    pub fn forward(self, pred: &[f32], target: &[f32]) -> f32 {
        match self {
            Loss::Mse => mse(pred, target),
            Loss::NegativeLogLikelihood => nll(pred, target),
        }
    }

    /// Loss + gradient w.r.t. `pred`, written into `d_pred`.
    #[inline]
    pub fn backward(self, pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
        match self {
            Loss::Mse => mse_backward(pred, target, d_pred),
            Loss::NegativeLogLikelihood => nll_backward(pred, target, d_pred),
        }
    }
}

#[inline]
fn check_pair(pred: &[f32], target: &[f32]) {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
}

/// Mean squared error: `0.5 * mean((pred - target)^2)`.
#[inline]
pub fn mse(pred: &[f32], target: &[f32]) -> f32 {
    check_pair(pred, target);
    if pred.is_empty() {
        return 0.0;
    }

    let inv_n = 1.0 / pred.len() as f32;
    let mut sum_sq = 0.0_f32;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
    }
    0.5 * sum_sq * inv_n
}

/// MSE loss + gradient: `d_pred[i] = (pred[i] - target[i]) / N`.
#[inline]
pub fn mse_backward(pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
    check_pair(pred, target);
    assert_eq!(pred.len(), d_pred.len());
    if pred.is_empty() {
        return 0.0;
    }

    let inv_n = 1.0 / pred.len() as f32;
    let mut sum_sq = 0.0_f32;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
        d_pred[i] = diff * inv_n;
    }
    0.5 * sum_sq * inv_n
}

/// Negative log-likelihood: `-sum(target[i] * pred[i])` over log-probs.
#[inline]
pub fn nll(pred: &[f32], target: &[f32]) -> f32 {
    check_pair(pred, target);

    let mut total = 0.0_f32;
    for i in 0..pred.len() {
        total = target[i].mul_add(-pred[i], total);
    }
    total
}

/// NLL loss + gradient: `d_pred[i] = -target[i]`.
#[inline]
pub fn nll_backward(pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
    check_pair(pred, target);
    assert_eq!(pred.len(), d_pred.len());

    let mut total = 0.0_f32;
    for i in 0..pred.len() {
        total = target[i].mul_add(-pred[i], total);
        d_pred[i] = -target[i];
    }
    total
}
