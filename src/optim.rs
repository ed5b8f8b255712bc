//! The optimizer contract and two reference optimizers.
//!
//! An [`Optimizer`] consumes an [`Objective`] (evaluate/gradient over a
//! parameter iterate) and reports the final objective value. The engine
//! treats optimizers as external strategies: anything satisfying the trait
//! works, including ones that cannot report an iteration budget
//! (`max_iterations` is an optional hint, never assumed).
//!
//! Both shipped optimizers keep their own iterate vector; the network's
//! buffer is synchronized on every evaluate/gradient call, so the final
//! parameters are whatever was evaluated last.

use crate::error::{Error, Result};
use crate::objective::Objective;

pub trait Optimizer {
    /// Minimizes `objective`, returning the final objective value.
    ///
    /// Non-finite objective values terminate optimization and are returned
    /// as-is so the caller can detect divergent training.
    fn optimize(&mut self, objective: &mut Objective<'_>) -> Result<f32>;

    /// Optional iteration-budget hint. Callers must not rely on `Some`.
    fn max_iterations(&self) -> Option<usize> {
        None
    }
}

/// Full-batch gradient descent with an absolute-change stopping tolerance.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    step_size: f32,
    max_iterations: usize,
    tolerance: f32,
}

impl GradientDescent {
    pub fn new(step_size: f32, max_iterations: usize, tolerance: f32) -> Result<Self> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "step size must be finite and > 0, got {step_size}"
            )));
        }
        if max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be > 0".to_owned(),
            ));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be finite and >= 0, got {tolerance}"
            )));
        }
        Ok(Self {
            step_size,
            max_iterations,
            tolerance,
        })
    }
}

impl Optimizer for GradientDescent {
    fn optimize(&mut self, objective: &mut Objective<'_>) -> Result<f32> {
        let mut iterate = objective.parameters().to_vec();
        let mut grad = vec![0.0_f32; iterate.len()];
        let mut last = f32::INFINITY;

        for _ in 0..self.max_iterations {
            let value = objective.gradient(&iterate, &mut grad)?;
            if !value.is_finite() {
                break;
            }
            if (last - value).abs() < self.tolerance {
                break;
            }
            last = value;

            for (p, &g) in iterate.iter_mut().zip(&grad) {
                *p -= self.step_size * g;
            }
        }

        // Leaves the network holding the final iterate.
        objective.evaluate(&iterate)
    }

    fn max_iterations(&self) -> Option<usize> {
        Some(self.max_iterations)
    }
}

/// Mini-batch stochastic gradient descent with momentum.
///
/// Iterates the dataset in contiguous batches via the objective's
/// batch-sliced API. Deliberately reports no iteration budget, exercising the
/// optimizers-without-hints path.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    step_size: f32,
    batch_size: usize,
    max_epochs: usize,
    momentum: f32,
    tolerance: f32,
}

impl Sgd {
    pub fn new(
        step_size: f32,
        batch_size: usize,
        max_epochs: usize,
        momentum: f32,
        tolerance: f32,
    ) -> Result<Self> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "step size must be finite and > 0, got {step_size}"
            )));
        }
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        if max_epochs == 0 {
            return Err(Error::InvalidConfig("max_epochs must be > 0".to_owned()));
        }
        if !(momentum.is_finite() && (0.0..1.0).contains(&momentum)) {
            return Err(Error::InvalidConfig(format!(
                "momentum must be finite and in [0, 1), got {momentum}"
            )));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be finite and >= 0, got {tolerance}"
            )));
        }
        Ok(Self {
            step_size,
            batch_size,
            max_epochs,
            momentum,
            tolerance,
        })
    }
}

impl Optimizer for Sgd {
    fn optimize(&mut self, objective: &mut Objective<'_>) -> Result<f32> {
        let n = objective.num_examples();
        let mut iterate = objective.parameters().to_vec();
        let mut grad = vec![0.0_f32; iterate.len()];
        let mut velocity = vec![0.0_f32; iterate.len()];
        let mut last_epoch = f32::INFINITY;

        'epochs: for _ in 0..self.max_epochs {
            let mut epoch_value = 0.0_f32;
            let mut start = 0;
            while start < n {
                let len = self.batch_size.min(n - start);
                let value = objective.gradient_batch(&iterate, &mut grad, start, len)?;
                if !value.is_finite() {
                    break 'epochs;
                }
                epoch_value += value;

                for i in 0..iterate.len() {
                    velocity[i] = self.momentum * velocity[i] + grad[i];
                    iterate[i] -= self.step_size * velocity[i];
                }
                start += len;
            }

            if (last_epoch - epoch_value).abs() < self.tolerance {
                break;
            }
            last_epoch = epoch_value;
        }

        objective.evaluate(&iterate)
    }
}
