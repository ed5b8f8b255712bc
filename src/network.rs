//! The model graph: an ordered owner of heterogeneous layers.
//!
//! `Network` owns its layers exclusively (`Vec<Box<dyn Layer>>`, insertion
//! order = evaluation order) together with one contiguous parameter buffer and
//! a gradient buffer of the same layout. Each layer's parameters are an
//! `(offset, len)` range into the shared buffer, recomputed by a single
//! relayout step after `add`, `reset_parameters`, and deserialization. Layers
//! never hold views across those events, so stale aliases cannot exist.
//!
//! Lifecycle: adding layers defers all shape validation to first use. The
//! first `forward`/`train`/`predict` call initializes parameters lazily via
//! the configured [`InitPolicy`] if `reset_parameters` was not called
//! explicitly. Re-entrant `train` calls reuse the existing parameters, which
//! supports continued training.
//!
//! The per-sample hot path follows the crate convention: slices, reused
//! buffers, `assert!` on programmer-error shape misuse; the public entry
//! points validate and return [`Result`].

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::{Dataset, Inputs};
use crate::error::{Error, Result};
use crate::init::{InitPolicy, RandomInit};
use crate::layer::Layer;
use crate::loss::Loss;
use crate::objective::Objective;
use crate::optim::Optimizer;

/// One layer's slice of the shared parameter/gradient buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    pub offset: usize,
    pub len: usize,
}

/// A trainable feed-forward network.
#[derive(Debug)]
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    params: Vec<f32>,
    grads: Vec<f32>,
    layout: Vec<ParamRange>,
    loss: Loss,
    init: Box<dyn InitPolicy>,
    seed: u64,
    /// Whether `params`/`grads`/`layout` match the current architecture.
    reset: bool,
    training: bool,
    // Forward cache: per-layer activations plus the evaluated range.
    outputs: Vec<Vec<f32>>,
    d_outputs: Vec<Vec<f32>>,
    forwarded: Option<(usize, usize)>,
    input_len: usize,
}

impl Network {
    /// An empty network with MSE loss, uniform `[-1, 1]` initialization, and
    /// seed 0.
    pub fn new() -> Self {
        Self::with_loss(Loss::Mse)
    }

    /// An empty network with the given loss.
    pub fn with_loss(loss: Loss) -> Self {
        Self {
            layers: Vec::new(),
            params: Vec::new(),
            grads: Vec::new(),
            layout: Vec::new(),
            loss,
            init: Box::new(RandomInit::default()),
            seed: 0,
            reset: false,
            training: true,
            outputs: Vec::new(),
            d_outputs: Vec::new(),
            forwarded: None,
            input_len: 0,
        }
    }

    /// Replaces the initialization policy. Takes effect on the next
    /// `reset_parameters`.
    pub fn set_init<P: InitPolicy + 'static>(&mut self, policy: P) -> &mut Self {
        self.init = Box::new(policy);
        self
    }

    /// Sets the seed used by lazy/explicit parameter resets.
    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    #[inline]
    pub fn loss(&self) -> Loss {
        self.loss
    }

    /// Appends `layer`; the network becomes its sole owner. No shape
    /// validation happens here; composition is checked at first use.
    pub fn add<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        self.add_boxed(Box::new(layer))
    }

    /// Appends an already-boxed layer, taking ownership.
    pub fn add_boxed(&mut self, layer: Box<dyn Layer>) -> &mut Self {
        self.layers.push(layer);
        self.reset = false;
        self.forwarded = None;
        self
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&dyn Layer> {
        self.layers.get(idx).map(|l| l.as_ref())
    }

    /// Total learnable parameter count across all owned layers.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    /// The whole parameter buffer (empty until the first reset).
    #[inline]
    pub fn parameters(&self) -> &[f32] {
        &self.params
    }

    /// Mutable view of the parameter buffer, for external inspection and
    /// manual parameter surgery.
    #[inline]
    pub fn parameters_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    /// The accumulated gradient buffer (same layout as `parameters`).
    #[inline]
    pub fn gradients(&self) -> &[f32] {
        &self.grads
    }

    /// Zeroes the gradient buffer.
    pub fn zero_gradients(&mut self) {
        self.grads.fill(0.0);
    }

    /// Layer `idx`'s slice of the parameter buffer, or `None` if the index is
    /// out of range or parameters are not laid out yet.
    pub fn layer_parameters(&self, idx: usize) -> Option<&[f32]> {
        let range = *self.layout.get(idx)?;
        Some(&self.params[range.offset..range.offset + range.len])
    }

    /// Mutable variant of [`layer_parameters`](Self::layer_parameters).
    pub fn layer_parameters_mut(&mut self, idx: usize) -> Option<&mut [f32]> {
        let range = *self.layout.get(idx)?;
        Some(&mut self.params[range.offset..range.offset + range.len])
    }

    /// Per-layer `(offset, len)` boundaries of the parameter buffer.
    #[inline]
    pub fn layout(&self) -> &[ParamRange] {
        &self.layout
    }

    /// Declared input dimensionality of the first layer, if it declares one.
    pub fn expected_input_size(&self) -> Option<usize> {
        self.layers.first().and_then(|l| l.input_size())
    }

    /// Output dimensionality for an input of `input_size` elements.
    pub fn output_size(&self, input_size: usize) -> usize {
        self.layers
            .iter()
            .fold(input_size, |size, layer| layer.output_size(size))
    }

    /// Recomputes the parameter layout, sizes both buffers, fills values via
    /// the configured init policy (seeded from the stored seed), and clears
    /// all cached layer state.
    ///
    /// Idempotent with respect to size: for an unchanged architecture the
    /// buffers keep their total length and only the values re-randomize.
    pub fn reset_parameters(&mut self) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.reset_parameters_with_rng(&mut rng);
    }

    /// Like [`reset_parameters`](Self::reset_parameters) with an explicit,
    /// caller-seeded RNG.
    pub fn reset_parameters_with_rng(&mut self, rng: &mut StdRng) {
        self.relayout();
        self.init.fill(&mut self.params, &self.layout, rng);
        for layer in &mut self.layers {
            layer.reset_state();
        }
        self.forwarded = None;
        self.reset = true;
    }

    /// Rebuilds `layout` and resizes `params`/`grads` to the exact total
    /// parameter count.
    fn relayout(&mut self) {
        self.layout.clear();
        let mut offset = 0;
        for layer in &self.layers {
            let len = layer.parameter_count();
            self.layout.push(ParamRange { offset, len });
            offset += len;
        }
        self.params.resize(offset, 0.0);
        self.grads.clear();
        self.grads.resize(offset, 0.0);
    }

    /// Lazily initializes parameters on first use.
    fn ensure_initialized(&mut self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network has no layers; add at least one before use".to_owned(),
            ));
        }
        if !self.reset || self.params.len() != self.parameter_count() {
            self.reset_parameters();
        }
        Ok(())
    }

    /// Validates `actual` against the first layer, then walks the whole stack
    /// checking every declared input size against the activation size arriving
    /// there, so bad compositions fail here instead of panicking mid-pass.
    fn check_input(&self, actual: usize) -> Result<()> {
        if let Some(expected) = self.expected_input_size() {
            if actual != expected {
                return Err(Error::InvalidShape(format!(
                    "the first layer of the network expects {expected} elements, \
                     but the input has {actual} dimensions"
                )));
            }
        }
        let mut size = actual;
        for (idx, layer) in self.layers.iter().enumerate() {
            if let Some(expected) = layer.input_size() {
                if size != expected {
                    return Err(Error::InvalidShape(format!(
                        "layer {idx} expects {expected} elements, \
                         but receives {size} from the layer before it"
                    )));
                }
            }
            size = layer.output_size(size);
        }
        Ok(())
    }

    /// Full forward pass: validates the input length against the first
    /// layer's declared size, then evaluates every layer in order. The final
    /// activation is written into `output` (resized as needed).
    pub fn forward(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.ensure_initialized()?;
        self.check_input(input.len())?;
        let end = self.layers.len() - 1;
        self.run_range(input, output, 0, end)
    }

    /// Partial forward pass over the inclusive layer range `[start, end]`,
    /// with `input` used as the activation entering `start`.
    ///
    /// Out-of-range or inverted ranges are rejected with
    /// [`Error::InvalidConfig`] rather than left as caller responsibility.
    pub fn forward_range(
        &mut self,
        input: &[f32],
        output: &mut Vec<f32>,
        start: usize,
        end: usize,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if start > end || end >= self.layers.len() {
            return Err(Error::InvalidConfig(format!(
                "layer range [{start}, {end}] is invalid for a network with {} layers",
                self.layers.len()
            )));
        }
        if start == 0 {
            self.check_input(input.len())?;
        }
        self.run_range(input, output, start, end)
    }

    fn run_range(
        &mut self,
        input: &[f32],
        output: &mut Vec<f32>,
        start: usize,
        end: usize,
    ) -> Result<()> {
        let Self {
            layers,
            params,
            layout,
            outputs,
            ..
        } = self;
        outputs.resize(layers.len(), Vec::new());

        for idx in start..=end {
            let range = layout[idx];
            let layer_params = &params[range.offset..range.offset + range.len];

            let in_len = if idx == start {
                input.len()
            } else {
                outputs[idx - 1].len()
            };
            let out_len = layers[idx].output_size(in_len);

            let (done, rest) = outputs.split_at_mut(idx);
            let out = &mut rest[0];
            out.resize(out_len, 0.0);
            let cur: &[f32] = if idx == start { input } else { &done[idx - 1] };
            layers[idx].forward(layer_params, cur, out);
        }

        output.clear();
        output.extend_from_slice(&self.outputs[end]);
        self.forwarded = Some((start, end));
        self.input_len = input.len();
        Ok(())
    }

    /// Backward pass: propagates `d_output` (the loss gradient w.r.t. the
    /// final activation) through every layer in reverse order, accumulating
    /// each layer's parameter gradient into the gradient buffer, and writes
    /// the gradient w.r.t. the network input into `d_input`.
    ///
    /// Requires a preceding *full* `forward`; fails with
    /// [`Error::InvalidState`] otherwise. Gradients accumulate; call
    /// [`zero_gradients`](Self::zero_gradients) between steps if overwrite
    /// semantics are wanted.
    pub fn backward(&mut self, d_output: &[f32], d_input: &mut Vec<f32>) -> Result<()> {
        let last = match self.forwarded {
            Some((0, end)) if end == self.layers.len() - 1 => end,
            _ => {
                return Err(Error::InvalidState(
                    "backward called without a preceding full forward pass".to_owned(),
                ))
            }
        };
        let out_len = self.outputs[last].len();
        if d_output.len() != out_len {
            return Err(Error::InvalidShape(format!(
                "the network produced {out_len} output elements, \
                 but d_output has {} dimensions",
                d_output.len()
            )));
        }

        let Self {
            layers,
            params,
            grads,
            layout,
            outputs,
            d_outputs,
            input_len,
            ..
        } = self;
        d_outputs.resize(layers.len(), Vec::new());
        d_outputs[last].clear();
        d_outputs[last].extend_from_slice(d_output);
        d_input.resize(*input_len, 0.0);

        for idx in (0..=last).rev() {
            let range = layout[idx];
            let layer_params = &params[range.offset..range.offset + range.len];

            let in_len = if idx == 0 {
                *input_len
            } else {
                outputs[idx - 1].len()
            };

            if idx == 0 {
                let d_out = std::mem::take(&mut d_outputs[0]);
                layers[0].backward(layer_params, &d_out, d_input)?;
                let layer_grads = &mut grads[range.offset..range.offset + range.len];
                layers[0].gradient(layer_params, &d_out, layer_grads)?;
                d_outputs[0] = d_out;
            } else {
                let (done, rest) = d_outputs.split_at_mut(idx);
                let d_out = &rest[0];
                let d_in = &mut done[idx - 1];
                d_in.resize(in_len, 0.0);
                layers[idx].backward(layer_params, d_out, d_in)?;
                let layer_grads = &mut grads[range.offset..range.offset + range.len];
                layers[idx].gradient(layer_params, d_out, layer_grads)?;
            }
        }
        Ok(())
    }

    /// Replaces the whole parameter buffer with `values`, rebuilding the
    /// layout first. Fails if the length does not match the architecture's
    /// total parameter count.
    pub fn set_parameters(&mut self, values: &[f32]) -> Result<()> {
        let expected = self.parameter_count();
        if values.len() != expected {
            return Err(Error::InvalidShape(format!(
                "the network has {expected} parameters, but {} values were provided",
                values.len()
            )));
        }
        self.relayout();
        self.params.copy_from_slice(values);
        for layer in &mut self.layers {
            layer.reset_state();
        }
        self.forwarded = None;
        self.reset = true;
        Ok(())
    }

    /// Sum of every layer's extra objective term (regularizing layers).
    pub fn loss_terms(&self) -> f32 {
        self.layers
            .iter()
            .zip(&self.layout)
            .map(|(layer, range)| {
                layer.loss_term(&self.params[range.offset..range.offset + range.len])
            })
            .sum()
    }

    /// Switches every layer between training and inference behavior.
    pub fn set_mode(&mut self, training: bool) {
        self.training = training;
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    #[inline]
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Trains on `data` by handing an objective adapter to `optimizer` and
    /// returns the final scalar objective (surfaced as-is, also when
    /// non-finite).
    ///
    /// Shape mismatches between `data` and the network fail here, before any
    /// optimizer iteration runs. Parameters are reset lazily on the first
    /// call and reused on later calls (continued training).
    pub fn train<O: Optimizer>(&mut self, data: &Dataset, optimizer: &mut O) -> Result<f32> {
        if data.is_empty() {
            return Err(Error::InvalidData(
                "training dataset must not be empty".to_owned(),
            ));
        }
        self.check_input(data.input_dim())?;
        let out_dim = self.output_size(data.input_dim());
        if out_dim != data.target_dim() {
            return Err(Error::InvalidShape(format!(
                "the network produces {out_dim} output elements, \
                 but the targets have {} dimensions",
                data.target_dim()
            )));
        }
        self.ensure_initialized()?;
        self.set_mode(true);

        let mut objective = Objective::new(self, data);
        optimizer.optimize(&mut objective)
    }

    /// Runs inference over every row of `inputs` and returns the predictions
    /// as a flat `(len, output_dim)` buffer.
    ///
    /// Stochastic layers run in deterministic inference mode; the previous
    /// training/inference mode is restored afterwards, so `train` and
    /// `predict` interleave correctly.
    pub fn predict(&mut self, inputs: &Inputs) -> Result<Vec<f32>> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        self.check_input(inputs.input_dim())?;
        self.ensure_initialized()?;

        let was_training = self.training;
        self.set_mode(false);

        let out_dim = self.output_size(inputs.input_dim());
        let mut preds = vec![0.0_f32; inputs.len() * out_dim];
        let mut row_out = Vec::with_capacity(out_dim);
        let mut result = Ok(());
        for idx in 0..inputs.len() {
            if let Err(e) = self.forward(inputs.input(idx), &mut row_out) {
                result = Err(e);
                break;
            }
            preds[idx * out_dim..(idx + 1) * out_dim].copy_from_slice(&row_out);
        }

        self.set_mode(was_training);
        result.map(|()| preds)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Network {
    /// Deep copy: every layer is cloned polymorphically and the buffers are
    /// copied, so two networks never share parameter storage.
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
            params: self.params.clone(),
            grads: self.grads.clone(),
            layout: self.layout.clone(),
            loss: self.loss,
            init: self.init.clone(),
            seed: self.seed,
            reset: self.reset,
            training: self.training,
            outputs: self.outputs.clone(),
            d_outputs: self.d_outputs.clone(),
            forwarded: self.forwarded,
            input_len: self.input_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::ConstInit;
    use crate::layer::{ActivationLayer, Bias, Linear, LinearNoBias};

    fn small_net() -> Network {
        let mut net = Network::new();
        net.add(Linear::new(4, 3));
        net.add(ActivationLayer::tanh());
        net.add(Linear::new(3, 2));
        net
    }

    #[test]
    fn parameter_count_is_the_per_layer_sum() {
        let mut net = small_net();
        let expected = (4 * 3 + 3) + (3 * 2 + 2);
        assert_eq!(net.parameter_count(), expected);

        net.reset_parameters();
        assert_eq!(net.parameters().len(), expected);
        assert_eq!(net.gradients().len(), expected);

        net.add(Bias::new(2));
        assert_eq!(net.parameter_count(), expected + 2);
        net.reset_parameters();
        assert_eq!(net.parameters().len(), expected + 2);

        let copy = net.clone();
        assert_eq!(copy.parameter_count(), net.parameter_count());
        assert_eq!(copy.parameters().len(), net.parameters().len());
    }

    #[test]
    fn layout_ranges_tile_the_buffer() {
        let mut net = small_net();
        net.reset_parameters();

        let mut offset = 0;
        for (idx, range) in net.layout().iter().enumerate() {
            assert_eq!(range.offset, offset);
            assert_eq!(range.len, net.layer(idx).unwrap().parameter_count());
            offset += range.len;
        }
        assert_eq!(offset, net.parameters().len());
    }

    #[test]
    fn reset_is_idempotent_and_seed_deterministic() {
        let mut net = small_net();
        net.reset_parameters();
        let first = net.parameters().to_vec();
        net.reset_parameters();
        assert_eq!(net.parameters().len(), first.len());
        assert_eq!(net.parameters(), &first[..]);

        net.set_seed(1);
        net.reset_parameters();
        assert_ne!(net.parameters(), &first[..]);
    }

    #[test]
    fn forward_validates_input_dimensions() {
        let mut net = small_net();
        let mut out = Vec::new();
        let err = net.forward(&[0.0; 7], &mut out).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains('4') && msg.contains('7'), "got: {msg}");
    }

    #[test]
    fn interior_dimension_mismatch_fails_instead_of_panicking() {
        let mut net = Network::new();
        net.add(Linear::new(4, 8));
        net.add(Linear::new(5, 3));

        let mut out = Vec::new();
        let err = net.forward(&[0.0; 4], &mut out).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains('5') && msg.contains('8'), "got: {msg}");
    }

    #[test]
    fn all_ones_linear_sums_ten_inputs() {
        let mut net = Network::new();
        net.add(LinearNoBias::new(10, 1));
        net.set_init(ConstInit::new(1.0));
        net.reset_parameters();

        let mut out = Vec::new();
        net.forward(&[1.0; 10], &mut out).unwrap();
        assert_eq!(out, vec![10.0]);
        // Deterministic on every invocation.
        net.forward(&[1.0; 10], &mut out).unwrap();
        assert_eq!(out, vec![10.0]);
    }

    #[test]
    fn partial_forward_matches_the_original_add_module_scenario() {
        let mut net = Network::new();
        net.add(Linear::new(5, 10));
        net.add(Bias::new(10));
        net.add(LinearNoBias::new(10, 10));
        net.add(Linear::new(10, 10));
        net.reset_parameters();

        // Set the Bias and LinearNoBias parameters to all ones.
        net.layer_parameters_mut(1).unwrap().fill(1.0);
        net.layer_parameters_mut(2).unwrap().fill(1.0);

        let input = vec![1.0_f32; 10];
        let mut out = Vec::new();

        // Only the Bias module: output differs from the input by one.
        net.forward_range(&input, &mut out, 1, 1).unwrap();
        assert_eq!(out, vec![2.0; 10]);

        // Bias then all-ones LinearNoBias: every output is 20.
        net.forward_range(&input, &mut out, 1, 2).unwrap();
        assert_eq!(out, vec![20.0; 10]);
    }

    #[test]
    fn partial_forward_composes() {
        let mut net = small_net();
        net.reset_parameters();

        let input = [0.3_f32, -0.2, 0.9, 0.1];
        let mut full = Vec::new();
        net.forward_range(&input, &mut full, 0, 2).unwrap();

        let mut first = Vec::new();
        net.forward_range(&input, &mut first, 0, 1).unwrap();
        let mut second = Vec::new();
        net.forward_range(&first, &mut second, 2, 2).unwrap();
        assert_eq!(full, second);
    }

    #[test]
    fn forward_range_bounds_are_validated() {
        let mut net = small_net();
        let mut out = Vec::new();
        assert!(net.forward_range(&[0.0; 4], &mut out, 2, 1).is_err());
        assert!(net.forward_range(&[0.0; 4], &mut out, 0, 3).is_err());
    }

    #[test]
    fn backward_requires_a_full_forward() {
        let mut net = small_net();
        net.reset_parameters();

        let mut d_input = Vec::new();
        let err = net.backward(&[0.0; 2], &mut d_input).unwrap_err();
        assert!(format!("{err}").contains("forward"));

        // A partial forward is not enough either.
        let mut out = Vec::new();
        net.forward_range(&[0.0; 3], &mut out, 1, 2).unwrap();
        assert!(net.backward(&[0.0; 2], &mut d_input).is_err());

        let mut out = Vec::new();
        net.forward(&[0.0; 4], &mut out).unwrap();
        assert!(net.backward(&[0.0; 2], &mut d_input).is_ok());
    }

    #[test]
    fn clone_is_independent() {
        let mut a = small_net();
        a.reset_parameters();
        let input = [0.1_f32, 0.2, 0.3, 0.4];

        let mut b = a.clone();
        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        a.forward(&input, &mut out_a).unwrap();
        b.forward(&input, &mut out_b).unwrap();
        assert_eq!(out_a, out_b);

        // Mutating a's parameters must not affect b.
        a.parameters_mut().fill(0.0);
        let mut out_b2 = Vec::new();
        b.forward(&input, &mut out_b2).unwrap();
        assert_eq!(out_b, out_b2);

        a.forward(&input, &mut out_a).unwrap();
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn moves_preserve_predictions() {
        let mut a = small_net();
        a.reset_parameters();
        let input = [0.5_f32, -0.5, 0.25, 0.0];
        let mut before = Vec::new();
        a.forward(&input, &mut before).unwrap();

        let mut b = a; // move
        let mut after = Vec::new();
        b.forward(&input, &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn gradients_accumulate_until_zeroed() {
        let mut net = Network::new();
        net.add(Bias::new(2));
        net.set_init(ConstInit::new(0.0));
        net.reset_parameters();

        let mut out = Vec::new();
        let mut d_input = Vec::new();
        net.forward(&[1.0, 1.0], &mut out).unwrap();
        net.backward(&[1.0, 2.0], &mut d_input).unwrap();
        assert_eq!(net.gradients(), &[1.0, 2.0]);

        net.forward(&[1.0, 1.0], &mut out).unwrap();
        net.backward(&[1.0, 2.0], &mut d_input).unwrap();
        assert_eq!(net.gradients(), &[2.0, 4.0]);

        net.zero_gradients();
        assert_eq!(net.gradients(), &[0.0, 0.0]);
    }
}
