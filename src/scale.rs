//! Feature scaling.
//!
//! `MeanNormalization` maps each feature to `(x - mean) / (max - min)`, with
//! the per-feature statistics learned by `fit`. Constant features get a unit
//! scale so they pass through as zeros instead of dividing by zero. Using the
//! scaler before `fit` fails with [`Error::InvalidState`].

use crate::data::Inputs;
use crate::error::{Error, Result};

/// Per-feature mean normalization: `z = (x - mean) / (max - min)`.
#[derive(Debug, Clone, Default)]
pub struct MeanNormalization {
    means: Vec<f32>,
    mins: Vec<f32>,
    maxes: Vec<f32>,
    scales: Vec<f32>,
}

impl MeanNormalization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns per-feature mean, min, max, and scale from `inputs`.
    pub fn fit(&mut self, inputs: &Inputs) {
        let dim = inputs.input_dim();
        self.means.clear();
        self.means.resize(dim, 0.0);
        self.mins.clear();
        self.mins.resize(dim, f32::INFINITY);
        self.maxes.clear();
        self.maxes.resize(dim, f32::NEG_INFINITY);

        for idx in 0..inputs.len() {
            for (d, &x) in inputs.input(idx).iter().enumerate() {
                self.means[d] += x;
                self.mins[d] = self.mins[d].min(x);
                self.maxes[d] = self.maxes[d].max(x);
            }
        }
        let inv_n = 1.0 / inputs.len() as f32;
        for m in &mut self.means {
            *m *= inv_n;
        }

        self.scales.clear();
        self.scales.reserve(dim);
        for d in 0..dim {
            let range = self.maxes[d] - self.mins[d];
            // Constant features scale by one.
            self.scales.push(if range == 0.0 { 1.0 } else { range });
        }
    }

    /// Scales every feature of `inputs` using the fitted statistics.
    pub fn transform(&self, inputs: &Inputs) -> Result<Inputs> {
        self.check_fitted(inputs.input_dim(), "transform")?;

        let dim = inputs.input_dim();
        let mut values = Vec::with_capacity(inputs.len() * dim);
        for idx in 0..inputs.len() {
            for (d, &x) in inputs.input(idx).iter().enumerate() {
                values.push((x - self.means[d]) / self.scales[d]);
            }
        }
        Inputs::from_flat(values, dim)
    }

    /// Maps scaled features back to the original space.
    pub fn inverse_transform(&self, inputs: &Inputs) -> Result<Inputs> {
        self.check_fitted(inputs.input_dim(), "inverse_transform")?;

        let dim = inputs.input_dim();
        let mut values = Vec::with_capacity(inputs.len() * dim);
        for idx in 0..inputs.len() {
            for (d, &z) in inputs.input(idx).iter().enumerate() {
                values.push(z.mul_add(self.scales[d], self.means[d]));
            }
        }
        Inputs::from_flat(values, dim)
    }

    /// Per-feature means learned by `fit`.
    #[inline]
    pub fn means(&self) -> &[f32] {
        &self.means
    }

    /// Per-feature minima learned by `fit`.
    #[inline]
    pub fn mins(&self) -> &[f32] {
        &self.mins
    }

    /// Per-feature maxima learned by `fit`.
    #[inline]
    pub fn maxes(&self) -> &[f32] {
        &self.maxes
    }

    /// Per-feature scales (`max - min`, with zero ranges replaced by one).
    #[inline]
    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    fn check_fitted(&self, input_dim: usize, op: &str) -> Result<()> {
        if self.scales.is_empty() {
            return Err(Error::InvalidState(format!(
                "MeanNormalization: {op} called before fit"
            )));
        }
        if input_dim != self.scales.len() {
            return Err(Error::InvalidShape(format!(
                "the scaler was fitted on {} features, but the input has {input_dim} dimensions",
                self.scales.len()
            )));
        }
        Ok(())
    }
}
