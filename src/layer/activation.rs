//! Element-wise activation layers and log-softmax.
//!
//! Activations cache the *post-activation* outputs `y` during `forward` and
//! express their derivative in terms of `y`, so no separate pre-activation
//! buffer is needed.

use crate::error::Result;
use crate::layer::{missing_forward, Layer, LayerSpec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Element-wise activation function.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Relu,
    Identity,
}

impl Activation {
    #[inline]
    fn forward(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }

    /// Derivative w.r.t. the input, expressed via the cached output `y`.
    #[inline]
    fn grad_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    // Numerically stable in both tails.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Parameter-free layer applying an [`Activation`] element-wise.
#[derive(Debug, Clone)]
pub struct ActivationLayer {
    function: Activation,
    // Forward cache: post-activation outputs.
    output: Vec<f32>,
}

impl ActivationLayer {
    pub fn new(function: Activation) -> Self {
        Self {
            function,
            output: Vec::new(),
        }
    }

    /// Convenience constructor for a sigmoid layer.
    pub fn sigmoid() -> Self {
        Self::new(Activation::Sigmoid)
    }

    /// Convenience constructor for a tanh layer.
    pub fn tanh() -> Self {
        Self::new(Activation::Tanh)
    }

    /// Convenience constructor for a ReLU layer.
    pub fn relu() -> Self {
        Self::new(Activation::Relu)
    }
}

impl Layer for ActivationLayer {
    fn output_size(&self, input_size: usize) -> usize {
        input_size
    }

    fn forward(&mut self, _params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), output.len());
        for (y, &x) in output.iter_mut().zip(input) {
            *y = self.function.forward(x);
        }
        self.output.clear();
        self.output.extend_from_slice(output);
    }

    fn backward(&mut self, _params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.output.len() != d_output.len() || self.output.is_empty() {
            return Err(missing_forward("ActivationLayer"));
        }
        assert_eq!(d_input.len(), d_output.len());

        for i in 0..d_output.len() {
            d_input[i] = d_output[i] * self.function.grad_from_output(self.output[i]);
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Activation {
            function: self.function,
        }
    }

    fn reset_state(&mut self) {
        self.output.clear();
    }
}

/// Log-softmax over the whole input vector.
///
/// Pairs with [`Loss::NegativeLogLikelihood`](crate::Loss) for
/// classification.
#[derive(Debug, Clone, Default)]
pub struct LogSoftmax {
    // Forward cache: log-probabilities.
    output: Vec<f32>,
}

impl LogSoftmax {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for LogSoftmax {
    fn output_size(&self, input_size: usize) -> usize {
        input_size
    }

    fn forward(&mut self, _params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), output.len());
        assert!(!input.is_empty());

        let max = input.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(x));
        let mut sum = 0.0_f32;
        for &x in input {
            sum += (x - max).exp();
        }
        let log_z = max + sum.ln();
        for (y, &x) in output.iter_mut().zip(input) {
            *y = x - log_z;
        }

        self.output.clear();
        self.output.extend_from_slice(output);
    }

    fn backward(&mut self, _params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.output.len() != d_output.len() || self.output.is_empty() {
            return Err(missing_forward("LogSoftmax"));
        }
        assert_eq!(d_input.len(), d_output.len());

        // d_in = d_out - softmax(x) * sum(d_out)
        let total: f32 = d_output.iter().sum();
        for i in 0..d_output.len() {
            d_input[i] = d_output[i] - self.output[i].exp() * total;
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::LogSoftmax
    }

    fn reset_state(&mut self) {
        self.output.clear();
    }
}
