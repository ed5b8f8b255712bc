//! The layer protocol.
//!
//! A [`Layer`] is a unit of differentiable computation with optional learnable
//! parameters. Layers own no parameter storage of their own: the owning
//! [`Network`](crate::Network) keeps one contiguous parameter buffer and hands
//! every layer its `(offset, len)` slice on each call. Rebuilding the layout is
//! therefore a pure index computation; a layer can never hold a stale view into
//! a buffer it no longer belongs to.
//!
//! Call ordering contract (enforced with [`Error::InvalidState`]):
//!
//! - `forward` caches whatever the matching `backward` needs (inputs,
//!   post-activations, masks).
//! - `backward` uses that cache and may itself cache intermediates for
//!   `gradient`.
//! - `gradient` accumulates (`+=`) into this layer's parameter-gradient slice
//!   and must follow the matching `backward`.

mod activation;
mod dropout;
mod linear;
mod sequential;

pub use activation::{Activation, ActivationLayer, LogSoftmax};
pub use dropout::Dropout;
pub use linear::{Bias, Linear, LinearNoBias};
pub use sequential::Sequential;

use std::fmt;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Polymorphic unit of differentiable computation.
///
/// Object-safe so heterogeneous layers can live in one `Vec<Box<dyn Layer>>`.
/// Optional capabilities (`loss_term`, `set_training`, `reset_state`) are
/// defaulted methods; layers opt in by overriding them.
pub trait Layer: fmt::Debug + Send {
    /// Output dimensionality for a given input dimensionality. Pure.
    fn output_size(&self, input_size: usize) -> usize;

    /// Declared input dimensionality, or `None` for size-preserving layers.
    fn input_size(&self) -> Option<usize> {
        None
    }

    /// Number of learnable parameters.
    fn parameter_count(&self) -> usize {
        0
    }

    /// Computes `output` from `input` using `params` (this layer's slice of
    /// the shared buffer). Caches state needed by `backward`.
    ///
    /// Shape contract (violations are programmer errors and panic):
    /// - `params.len() == self.parameter_count()`
    /// - `output.len() == self.output_size(input.len())`
    fn forward(&mut self, params: &[f32], input: &[f32], output: &mut [f32]);

    /// Propagates `d_output` to `d_input` using the state cached by the
    /// preceding `forward`. Fails with [`Error::InvalidState`] if no matching
    /// forward pass has run.
    fn backward(&mut self, params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()>;

    /// Accumulates this layer's parameter gradient into `d_params` (same
    /// layout as `params`). Must follow the matching `backward`. Default:
    /// parameter-free, nothing to do.
    fn gradient(&mut self, _params: &[f32], _d_output: &[f32], _d_params: &mut [f32]) -> Result<()> {
        Ok(())
    }

    /// Polymorphic deep clone, preserving the dynamic type.
    fn clone_layer(&self) -> Box<dyn Layer>;

    /// Stable architecture description, used for serialization and rebuild.
    fn spec(&self) -> LayerSpec;

    /// Extra objective term contributed by this layer (e.g. a regularizer),
    /// evaluated once per sample alongside the data loss.
    ///
    /// A layer whose term depends on its parameters must accumulate the
    /// matching contribution in `gradient`, or the objective's value and
    /// gradient disagree.
    fn loss_term(&self, _params: &[f32]) -> f32 {
        0.0
    }

    /// Switches between training and inference behavior. Only stochastic
    /// layers care.
    fn set_training(&mut self, _training: bool) {}

    /// Drops cached forward/backward state.
    fn reset_state(&mut self) {}
}

impl Clone for Box<dyn Layer> {
    fn clone(&self) -> Self {
        self.clone_layer()
    }
}

/// Tagged, stable description of a layer's architecture.
///
/// This is the serialized form of a layer (parameters live in the network's
/// buffer and are serialized separately). `build` reconstructs the concrete
/// layer with a fresh cache.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    Linear {
        in_dim: usize,
        out_dim: usize,
        #[cfg_attr(feature = "serde", serde(default))]
        weight_decay: f32,
    },
    LinearNoBias {
        in_dim: usize,
        out_dim: usize,
    },
    Bias { size: usize },
    Activation { function: Activation },
    LogSoftmax,
    Dropout { ratio: f32, seed: u64 },
    Sequential { layers: Vec<LayerSpec> },
}

impl LayerSpec {
    /// Validates the described architecture.
    pub fn validate(&self) -> Result<()> {
        match self {
            LayerSpec::Linear {
                in_dim,
                out_dim,
                weight_decay,
            } => {
                check_linear_dims(*in_dim, *out_dim)?;
                if !(weight_decay.is_finite() && *weight_decay >= 0.0) {
                    return Err(Error::InvalidData(format!(
                        "weight decay must be finite and >= 0, got {weight_decay}"
                    )));
                }
                Ok(())
            }
            LayerSpec::LinearNoBias { in_dim, out_dim } => check_linear_dims(*in_dim, *out_dim),
            LayerSpec::Bias { size } => {
                if *size == 0 {
                    return Err(Error::InvalidData("bias size must be > 0".to_owned()));
                }
                Ok(())
            }
            LayerSpec::Activation { .. } | LayerSpec::LogSoftmax => Ok(()),
            LayerSpec::Dropout { ratio, .. } => {
                if !(ratio.is_finite() && (0.0..1.0).contains(ratio)) {
                    return Err(Error::InvalidData(format!(
                        "dropout ratio must be finite and in [0, 1), got {ratio}"
                    )));
                }
                Ok(())
            }
            LayerSpec::Sequential { layers } => {
                if layers.is_empty() {
                    return Err(Error::InvalidData(
                        "sequential must contain at least one layer".to_owned(),
                    ));
                }
                for inner in layers {
                    inner.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Reconstructs the concrete layer this spec describes.
    pub fn build(&self) -> Result<Box<dyn Layer>> {
        self.validate()?;
        Ok(match self {
            LayerSpec::Linear {
                in_dim,
                out_dim,
                weight_decay,
            } => Box::new(Linear::with_weight_decay(*in_dim, *out_dim, *weight_decay)?),
            LayerSpec::LinearNoBias { in_dim, out_dim } => {
                Box::new(LinearNoBias::new(*in_dim, *out_dim))
            }
            LayerSpec::Bias { size } => Box::new(Bias::new(*size)),
            LayerSpec::Activation { function } => Box::new(ActivationLayer::new(*function)),
            LayerSpec::LogSoftmax => Box::new(LogSoftmax::new()),
            LayerSpec::Dropout { ratio, seed } => Box::new(Dropout::new(*ratio, *seed)?),
            LayerSpec::Sequential { layers } => {
                let mut children = Vec::with_capacity(layers.len());
                for inner in layers {
                    children.push(inner.build()?);
                }
                Box::new(Sequential::from_boxed(children)?)
            }
        })
    }
}

fn check_linear_dims(in_dim: usize, out_dim: usize) -> Result<()> {
    if in_dim == 0 || out_dim == 0 {
        return Err(Error::InvalidData(format!(
            "linear dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
        )));
    }
    in_dim
        .checked_mul(out_dim)
        .ok_or_else(|| Error::InvalidData("linear weight shape overflow".to_owned()))?;
    Ok(())
}

/// Returns an [`Error::InvalidState`] naming a missing prerequisite call.
pub(crate) fn missing_forward(layer: &str) -> Error {
    Error::InvalidState(format!(
        "{layer}: backward called without a preceding forward on matching shapes"
    ))
}
