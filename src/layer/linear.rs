//! Affine layers: `Linear`, `LinearNoBias`, and `Bias`.
//!
//! Parameter layout inside the layer's slice of the shared buffer:
//! - `Linear`: row-major weights `(out_dim, in_dim)` followed by `out_dim`
//!   biases.
//! - `LinearNoBias`: row-major weights only.
//! - `Bias`: one learned offset per element.

use crate::error::{Error, Result};
use crate::layer::{missing_forward, Layer, LayerSpec};

/// Fully-connected layer: `y = W x + b`, with optional L2 weight decay on the
/// weight matrix (the bias is left unregularized).
#[derive(Debug, Clone)]
pub struct Linear {
    in_dim: usize,
    out_dim: usize,
    weight_decay: f32,
    // Forward cache: the last input, needed by `gradient`.
    input: Vec<f32>,
}

impl Linear {
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        assert!(in_dim > 0 && out_dim > 0, "linear dims must be > 0");
        Self {
            in_dim,
            out_dim,
            weight_decay: 0.0,
            input: Vec::new(),
        }
    }

    /// Linear layer whose weights contribute an L2 penalty
    /// `0.5 * weight_decay * sum(W^2)` to the objective, per sample.
    pub fn with_weight_decay(in_dim: usize, out_dim: usize, weight_decay: f32) -> Result<Self> {
        if !(weight_decay.is_finite() && weight_decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight decay must be finite and >= 0, got {weight_decay}"
            )));
        }
        let mut layer = Self::new(in_dim, out_dim);
        layer.weight_decay = weight_decay;
        Ok(layer)
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Layer for Linear {
    fn output_size(&self, _input_size: usize) -> usize {
        self.out_dim
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    fn parameter_count(&self) -> usize {
        self.in_dim * self.out_dim + self.out_dim
    }

    fn forward(&mut self, params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(params.len(), self.parameter_count());
        assert_eq!(input.len(), self.in_dim);
        assert_eq!(output.len(), self.out_dim);

        let (weights, biases) = params.split_at(self.in_dim * self.out_dim);
        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let mut sum = biases[o];
            for i in 0..self.in_dim {
                sum = weights[row + i].mul_add(input[i], sum);
            }
            output[o] = sum;
        }

        self.input.clear();
        self.input.extend_from_slice(input);
    }

    fn backward(&mut self, params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.input.len() != self.in_dim {
            return Err(missing_forward("Linear"));
        }
        assert_eq!(params.len(), self.parameter_count());
        assert_eq!(d_output.len(), self.out_dim);
        assert_eq!(d_input.len(), self.in_dim);

        let weights = &params[..self.in_dim * self.out_dim];
        d_input.fill(0.0);
        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let d = d_output[o];
            for i in 0..self.in_dim {
                d_input[i] = weights[row + i].mul_add(d, d_input[i]);
            }
        }
        Ok(())
    }

    fn gradient(&mut self, params: &[f32], d_output: &[f32], d_params: &mut [f32]) -> Result<()> {
        if self.input.len() != self.in_dim {
            return Err(missing_forward("Linear"));
        }
        assert_eq!(d_params.len(), params.len());
        assert_eq!(d_output.len(), self.out_dim);

        let (d_weights, d_biases) = d_params.split_at_mut(self.in_dim * self.out_dim);
        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let d = d_output[o];
            for i in 0..self.in_dim {
                d_weights[row + i] = d.mul_add(self.input[i], d_weights[row + i]);
            }
            d_biases[o] += d;
        }

        if self.weight_decay != 0.0 {
            let weights = &params[..self.in_dim * self.out_dim];
            for (dw, &w) in d_weights.iter_mut().zip(weights) {
                *dw = self.weight_decay.mul_add(w, *dw);
            }
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Linear {
            in_dim: self.in_dim,
            out_dim: self.out_dim,
            weight_decay: self.weight_decay,
        }
    }

    fn loss_term(&self, params: &[f32]) -> f32 {
        if self.weight_decay == 0.0 {
            return 0.0;
        }
        let weights = &params[..self.in_dim * self.out_dim];
        let mut sum_sq = 0.0_f32;
        for &w in weights {
            sum_sq = w.mul_add(w, sum_sq);
        }
        0.5 * self.weight_decay * sum_sq
    }

    fn reset_state(&mut self) {
        self.input.clear();
    }
}

/// Fully-connected layer without a bias term: `y = W x`.
#[derive(Debug, Clone)]
pub struct LinearNoBias {
    in_dim: usize,
    out_dim: usize,
    input: Vec<f32>,
}

impl LinearNoBias {
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        assert!(in_dim > 0 && out_dim > 0, "linear dims must be > 0");
        Self {
            in_dim,
            out_dim,
            input: Vec::new(),
        }
    }
}

impl Layer for LinearNoBias {
    fn output_size(&self, _input_size: usize) -> usize {
        self.out_dim
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    fn parameter_count(&self) -> usize {
        self.in_dim * self.out_dim
    }

    fn forward(&mut self, params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(params.len(), self.parameter_count());
        assert_eq!(input.len(), self.in_dim);
        assert_eq!(output.len(), self.out_dim);

        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let mut sum = 0.0;
            for i in 0..self.in_dim {
                sum = params[row + i].mul_add(input[i], sum);
            }
            output[o] = sum;
        }

        self.input.clear();
        self.input.extend_from_slice(input);
    }

    fn backward(&mut self, params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.input.len() != self.in_dim {
            return Err(missing_forward("LinearNoBias"));
        }
        assert_eq!(params.len(), self.parameter_count());
        assert_eq!(d_output.len(), self.out_dim);
        assert_eq!(d_input.len(), self.in_dim);

        d_input.fill(0.0);
        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let d = d_output[o];
            for i in 0..self.in_dim {
                d_input[i] = params[row + i].mul_add(d, d_input[i]);
            }
        }
        Ok(())
    }

    fn gradient(&mut self, params: &[f32], d_output: &[f32], d_params: &mut [f32]) -> Result<()> {
        if self.input.len() != self.in_dim {
            return Err(missing_forward("LinearNoBias"));
        }
        assert_eq!(d_params.len(), params.len());
        assert_eq!(d_output.len(), self.out_dim);

        for o in 0..self.out_dim {
            let row = o * self.in_dim;
            let d = d_output[o];
            for i in 0..self.in_dim {
                d_params[row + i] = d.mul_add(self.input[i], d_params[row + i]);
            }
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::LinearNoBias {
            in_dim: self.in_dim,
            out_dim: self.out_dim,
        }
    }

    fn reset_state(&mut self) {
        self.input.clear();
    }
}

/// Adds a learned offset vector: `y = x + b`.
#[derive(Debug, Clone)]
pub struct Bias {
    size: usize,
    ready: bool,
}

impl Bias {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "bias size must be > 0");
        Self { size, ready: false }
    }
}

impl Layer for Bias {
    fn output_size(&self, _input_size: usize) -> usize {
        self.size
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.size)
    }

    fn parameter_count(&self) -> usize {
        self.size
    }

    fn forward(&mut self, params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(params.len(), self.size);
        assert_eq!(input.len(), self.size);
        assert_eq!(output.len(), self.size);

        for i in 0..self.size {
            output[i] = input[i] + params[i];
        }
        self.ready = true;
    }

    fn backward(&mut self, _params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if !self.ready {
            return Err(missing_forward("Bias"));
        }
        assert_eq!(d_output.len(), self.size);
        assert_eq!(d_input.len(), self.size);

        d_input.copy_from_slice(d_output);
        Ok(())
    }

    fn gradient(&mut self, _params: &[f32], d_output: &[f32], d_params: &mut [f32]) -> Result<()> {
        if !self.ready {
            return Err(missing_forward("Bias"));
        }
        assert_eq!(d_output.len(), self.size);
        assert_eq!(d_params.len(), self.size);

        for i in 0..self.size {
            d_params[i] += d_output[i];
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Bias { size: self.size }
    }

    fn reset_state(&mut self) {
        self.ready = false;
    }
}
