//! The objective adapter.
//!
//! [`Objective`] bridges a [`Network`] plus its loss into the differentiable
//! function an [`Optimizer`](crate::Optimizer) consumes: `evaluate` and
//! `gradient`, with batch-sliced variants for optimizers that iterate over
//! mini-batches. It borrows the network mutably for the duration of one
//! `train` call, so evaluate/gradient calls are serialized by construction.
//!
//! Non-finite objective values are returned as-is: divergence is a modeling
//! condition the caller must be able to observe, not an error to mask.

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::loss::Loss;
use crate::network::Network;

pub struct Objective<'a> {
    network: &'a mut Network,
    data: &'a Dataset,
    loss: Loss,
    // Per-call scratch, reused across samples.
    prediction: Vec<f32>,
    d_output: Vec<f32>,
    d_input: Vec<f32>,
}

impl<'a> Objective<'a> {
    pub fn new(network: &'a mut Network, data: &'a Dataset) -> Self {
        let loss = network.loss();
        Self {
            network,
            data,
            loss,
            prediction: Vec::new(),
            d_output: Vec::new(),
            d_input: Vec::new(),
        }
    }

    /// Number of training examples, for batch-iterating optimizers.
    #[inline]
    pub fn num_examples(&self) -> usize {
        self.data.len()
    }

    /// The network's current parameter buffer (the optimizer's starting
    /// iterate).
    #[inline]
    pub fn parameters(&self) -> &[f32] {
        self.network.parameters()
    }

    /// Copies `params` into the network's buffer, skipped when the caller
    /// passes the buffer the network already holds.
    fn sync_parameters(&mut self, params: &[f32]) -> Result<()> {
        let buf = self.network.parameters_mut();
        if params.len() != buf.len() {
            return Err(Error::InvalidShape(format!(
                "the objective expects {} parameters, but received {}",
                buf.len(),
                params.len()
            )));
        }
        if !std::ptr::eq(buf.as_ptr(), params.as_ptr()) {
            buf.copy_from_slice(params);
        }
        Ok(())
    }

    /// Objective value over the whole dataset at `params`.
    pub fn evaluate(&mut self, params: &[f32]) -> Result<f32> {
        self.evaluate_batch(params, 0, self.data.len())
    }

    /// Objective value over the contiguous sample range
    /// `[start, start + len)`.
    pub fn evaluate_batch(&mut self, params: &[f32], start: usize, len: usize) -> Result<f32> {
        self.data.check_batch(start, len)?;
        self.sync_parameters(params)?;

        let mut total = 0.0_f32;
        for idx in start..start + len {
            self.network
                .forward(self.data.input(idx), &mut self.prediction)?;
            total += self.loss.forward(&self.prediction, self.data.target(idx));
            // Layer penalties count once per sample, matching the per-sample
            // contributions layers accumulate in `gradient`.
            total += self.network.loss_terms();
        }
        Ok(total)
    }

    /// Objective value and gradient over the whole dataset; the gradient is
    /// written into `grad_out` (same layout as the parameter buffer).
    pub fn gradient(&mut self, params: &[f32], grad_out: &mut [f32]) -> Result<f32> {
        self.gradient_batch(params, grad_out, 0, self.data.len())
    }

    /// Batch-sliced variant of [`gradient`](Self::gradient).
    pub fn gradient_batch(
        &mut self,
        params: &[f32],
        grad_out: &mut [f32],
        start: usize,
        len: usize,
    ) -> Result<f32> {
        self.data.check_batch(start, len)?;
        self.sync_parameters(params)?;
        if grad_out.len() != self.network.parameters().len() {
            return Err(Error::InvalidShape(format!(
                "the gradient buffer must have {} elements, but has {}",
                self.network.parameters().len(),
                grad_out.len()
            )));
        }

        self.network.zero_gradients();
        let mut total = 0.0_f32;
        for idx in start..start + len {
            self.network
                .forward(self.data.input(idx), &mut self.prediction)?;
            self.d_output.resize(self.prediction.len(), 0.0);
            total += self
                .loss
                .backward(&self.prediction, self.data.target(idx), &mut self.d_output);
            self.network.backward(&self.d_output, &mut self.d_input)?;
            total += self.network.loss_terms();
        }
        grad_out.copy_from_slice(self.network.gradients());
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{ActivationLayer, Linear};

    fn xor_like_setup() -> (Network, Dataset) {
        let mut net = Network::new();
        net.add(Linear::new(2, 3));
        net.add(ActivationLayer::tanh());
        net.add(Linear::new(3, 1));
        net.reset_parameters();

        let data = Dataset::from_rows(
            &[
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
            ],
            &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        )
        .unwrap();
        (net, data)
    }

    #[test]
    fn evaluate_matches_batched_evaluation() {
        let (mut net, data) = xor_like_setup();
        let params = net.parameters().to_vec();
        let mut objective = Objective::new(&mut net, &data);

        let full = objective.evaluate(&params).unwrap();
        let mut split = 0.0;
        split += objective.evaluate_batch(&params, 0, 2).unwrap();
        split += objective.evaluate_batch(&params, 2, 2).unwrap();
        assert!((full - split).abs() < 1e-5);
    }

    #[test]
    fn gradient_matches_numeric_differences() {
        let (mut net, data) = xor_like_setup();
        let mut params = net.parameters().to_vec();
        let mut grad = vec![0.0_f32; params.len()];

        let mut objective = Objective::new(&mut net, &data);
        objective.gradient(&params, &mut grad).unwrap();

        let eps = 1e-3_f32;
        for p in 0..params.len() {
            let orig = params[p];
            params[p] = orig + eps;
            let plus = objective.evaluate(&params).unwrap();
            params[p] = orig - eps;
            let minus = objective.evaluate(&params).unwrap();
            params[p] = orig;

            let numeric = (plus - minus) / (2.0 * eps);
            let diff = (grad[p] - numeric).abs();
            let scale = grad[p].abs().max(numeric.abs()).max(1.0);
            assert!(
                diff <= 1e-3 || diff / scale <= 1e-2,
                "param {p}: analytic={} numeric={numeric}",
                grad[p]
            );
        }
    }

    #[test]
    fn weight_decay_shifts_value_and_gradient_consistently() {
        let mut net = Network::new();
        net.add(Linear::with_weight_decay(2, 3, 0.1).unwrap());
        net.add(ActivationLayer::tanh());
        net.add(Linear::new(3, 1));
        net.set_seed(8);
        net.reset_parameters();

        let data = Dataset::from_rows(
            &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![1.0], vec![1.0], vec![0.0]],
        )
        .unwrap();

        let mut params = net.parameters().to_vec();
        let mut grad = vec![0.0_f32; params.len()];
        let mut objective = Objective::new(&mut net, &data);
        objective.gradient(&params, &mut grad).unwrap();

        let eps = 1e-3_f32;
        for p in 0..params.len() {
            let orig = params[p];
            params[p] = orig + eps;
            let plus = objective.evaluate(&params).unwrap();
            params[p] = orig - eps;
            let minus = objective.evaluate(&params).unwrap();
            params[p] = orig;

            let numeric = (plus - minus) / (2.0 * eps);
            let diff = (grad[p] - numeric).abs();
            let scale = grad[p].abs().max(numeric.abs()).max(1.0);
            assert!(
                diff <= 1e-3 || diff / scale <= 1e-2,
                "param {p}: analytic={} numeric={numeric}",
                grad[p]
            );
        }
    }

    #[test]
    fn parameter_length_mismatch_is_rejected() {
        let (mut net, data) = xor_like_setup();
        let mut objective = Objective::new(&mut net, &data);
        let err = objective.evaluate(&[0.0; 3]).unwrap_err();
        assert!(format!("{err}").contains("parameters"));
    }

    #[test]
    fn non_finite_objectives_are_surfaced_not_masked() {
        let (mut net, data) = xor_like_setup();
        let params = vec![f32::MAX; net.parameters().len()];
        let mut objective = Objective::new(&mut net, &data);
        let value = objective.evaluate(&params).unwrap();
        assert!(!value.is_finite());
    }

    #[test]
    fn batch_bounds_are_validated() {
        let (mut net, data) = xor_like_setup();
        let params = net.parameters().to_vec();
        let mut objective = Objective::new(&mut net, &data);
        assert!(objective.evaluate_batch(&params, 4, 1).is_err());
        assert!(objective.evaluate_batch(&params, 0, 5).is_err());
    }
}
