//! Composite layer owning nested sub-layers.
//!
//! `Sequential` chains its children in insertion order and behaves as one
//! layer to the owning network: one parameter range, sliced among the children
//! by their declared counts. Ownership is recursive and exclusive; cloning a
//! `Sequential` deep-clones every child.

use crate::error::{Error, Result};
use crate::layer::{missing_forward, Layer, LayerSpec};

#[derive(Debug, Clone)]
pub struct Sequential {
    children: Vec<Box<dyn Layer>>,
    // Forward cache: per-child outputs.
    outputs: Vec<Vec<f32>>,
    // Backward cache: per-child upstream gradients, consumed by `gradient`.
    d_outputs: Vec<Vec<f32>>,
    input_len: usize,
}

impl Sequential {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            outputs: Vec::new(),
            d_outputs: Vec::new(),
            input_len: 0,
        }
    }

    /// Builds a composite from already-boxed children.
    pub fn from_boxed(children: Vec<Box<dyn Layer>>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::InvalidConfig(
                "sequential must contain at least one layer".to_owned(),
            ));
        }
        Ok(Self {
            children,
            outputs: Vec::new(),
            d_outputs: Vec::new(),
            input_len: 0,
        })
    }

    /// Appends a child layer, taking ownership.
    pub fn push<L: Layer + 'static>(&mut self, layer: L) {
        self.children.push(Box::new(layer));
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for Sequential {
    fn output_size(&self, input_size: usize) -> usize {
        self.children
            .iter()
            .fold(input_size, |size, child| child.output_size(size))
    }

    fn input_size(&self) -> Option<usize> {
        self.children.first().and_then(|c| c.input_size())
    }

    fn parameter_count(&self) -> usize {
        self.children.iter().map(|c| c.parameter_count()).sum()
    }

    fn forward(&mut self, params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(params.len(), self.parameter_count());
        assert!(!self.children.is_empty());

        let Self {
            children, outputs, ..
        } = self;
        outputs.resize(children.len(), Vec::new());

        let mut offset = 0;
        for idx in 0..children.len() {
            let count = children[idx].parameter_count();
            let child_params = &params[offset..offset + count];
            offset += count;

            let in_len = if idx == 0 {
                input.len()
            } else {
                outputs[idx - 1].len()
            };
            let out_len = children[idx].output_size(in_len);

            let (done, rest) = outputs.split_at_mut(idx);
            let out = &mut rest[0];
            out.resize(out_len, 0.0);
            let cur: &[f32] = if idx == 0 { input } else { &done[idx - 1] };
            children[idx].forward(child_params, cur, out);
        }

        let last = self.outputs.last().expect("sequential has children");
        assert_eq!(output.len(), last.len());
        output.copy_from_slice(last);
        self.input_len = input.len();
    }

    fn backward(&mut self, params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.outputs.len() != self.children.len()
            || self.outputs.last().map(Vec::len) != Some(d_output.len())
        {
            return Err(missing_forward("Sequential"));
        }
        assert_eq!(params.len(), self.parameter_count());
        assert_eq!(d_input.len(), self.input_len);

        let Self {
            children,
            outputs,
            d_outputs,
            input_len,
        } = self;
        d_outputs.resize(children.len(), Vec::new());
        let last = children.len() - 1;
        d_outputs[last].clear();
        d_outputs[last].extend_from_slice(d_output);

        let mut offset = params.len();
        for idx in (0..children.len()).rev() {
            let count = children[idx].parameter_count();
            offset -= count;
            let child_params = &params[offset..offset + count];

            let in_len = if idx == 0 {
                *input_len
            } else {
                outputs[idx - 1].len()
            };

            if idx == 0 {
                let d_out = &d_outputs[0];
                children[0].backward(child_params, d_out, d_input)?;
            } else {
                let (done, rest) = d_outputs.split_at_mut(idx);
                let d_out = &rest[0];
                let d_in = &mut done[idx - 1];
                d_in.resize(in_len, 0.0);
                children[idx].backward(child_params, d_out, d_in)?;
            }
        }
        Ok(())
    }

    fn gradient(&mut self, params: &[f32], d_output: &[f32], d_params: &mut [f32]) -> Result<()> {
        if self.d_outputs.len() != self.children.len()
            || self.d_outputs.last().map(Vec::len) != Some(d_output.len())
        {
            return Err(Error::InvalidState(
                "Sequential: gradient called without a preceding backward".to_owned(),
            ));
        }
        assert_eq!(d_params.len(), params.len());

        let mut offset = 0;
        for idx in 0..self.children.len() {
            let count = self.children[idx].parameter_count();
            let range = offset..offset + count;
            offset += count;

            let d_out = std::mem::take(&mut self.d_outputs[idx]);
            self.children[idx].gradient(&params[range.clone()], &d_out, &mut d_params[range])?;
            self.d_outputs[idx] = d_out;
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Sequential {
            layers: self.children.iter().map(|c| c.spec()).collect(),
        }
    }

    fn loss_term(&self, params: &[f32]) -> f32 {
        let mut total = 0.0;
        let mut offset = 0;
        for child in &self.children {
            let count = child.parameter_count();
            total += child.loss_term(&params[offset..offset + count]);
            offset += count;
        }
        total
    }

    fn set_training(&mut self, training: bool) {
        for child in &mut self.children {
            child.set_training(training);
        }
    }

    fn reset_state(&mut self) {
        for child in &mut self.children {
            child.reset_state();
        }
        self.outputs.clear();
        self.d_outputs.clear();
        self.input_len = 0;
    }
}
