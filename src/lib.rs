//! A small feed-forward network engine.
//!
//! `ffnet` is a from-scratch implementation of the core of a neural-network
//! library: a [`Network`] that owns an ordered sequence of heterogeneous,
//! polymorphic [`Layer`]s, concatenates their parameters into one contiguous
//! buffer, and drives them through an externally supplied [`Optimizer`] via an
//! [`Objective`] adapter.
//!
//! # Design
//!
//! - Ownership is tree-shaped and exclusive: a network owns its layers (and
//!   composite layers own theirs); cloning a network deep-clones everything,
//!   so two networks never share parameter storage. Parallel training means
//!   one clone per worker.
//! - Every layer's parameters are an `(offset, len)` range into the network's
//!   buffer, recomputed by one relayout step after structural changes. No
//!   layer ever holds a view across such a change.
//! - Randomness is explicit: parameter initialization and stochastic layers
//!   take caller-provided seeds, never a hidden global RNG.
//! - Single-threaded and synchronous: `forward` mutates per-layer cached
//!   state that `backward` depends on, so evaluate/gradient calls against one
//!   network must be serialized; the [`Objective`] borrows the network
//!   mutably for exactly this reason.
//!
//! # Panics vs `Result`
//!
//! Two API layers, on purpose:
//!
//! - Low-level hot path (panics on misuse): [`Layer::forward`] and friends
//!   treat shape mismatches as programmer error via `assert!`.
//! - High-level entry points (shape-checked): [`Network::forward`],
//!   [`Network::train`], [`Network::predict`], and serialization validate
//!   inputs and return [`Result`], with messages that always name the
//!   expected and the actual dimension counts.
//!
//! # Quick start
//!
//! ```rust
//! use ffnet::{ActivationLayer, Dataset, GradientDescent, Linear, Network};
//!
//! # fn main() -> ffnet::Result<()> {
//! let xs = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//! ];
//! let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
//! let train = Dataset::from_rows(&xs, &ys)?;
//!
//! let mut net = Network::new();
//! net.add(Linear::new(2, 8));
//! net.add(ActivationLayer::tanh());
//! net.add(Linear::new(8, 1));
//! net.set_seed(0);
//!
//! let mut opt = GradientDescent::new(0.05, 100, 1e-6)?;
//! let objective = net.train(&train, &mut opt)?;
//! assert!(objective.is_finite());
//!
//! let preds = net.predict(train.inputs())?;
//! assert_eq!(preds.len(), 4);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving the passes yourself
//!
//! ```rust
//! use ffnet::{Linear, Network};
//!
//! # fn main() -> ffnet::Result<()> {
//! let mut net = Network::new();
//! net.add(Linear::new(3, 2));
//! net.reset_parameters();
//!
//! let input = [0.1_f32, -0.2, 0.3];
//! let mut output = Vec::new();
//! net.forward(&input, &mut output)?;
//!
//! let mut d_output = vec![0.0_f32; output.len()];
//! ffnet::loss::mse_backward(&output, &[0.0, 1.0], &mut d_output);
//!
//! let mut d_input = Vec::new();
//! net.backward(&d_output, &mut d_input)?;
//! assert_eq!(net.gradients().len(), net.parameter_count());
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod init;
pub mod layer;
pub mod loss;
pub mod network;
pub mod objective;
pub mod optim;
pub mod scale;

#[cfg(feature = "serde")]
pub mod serialize;

pub use data::{Dataset, Inputs};
pub use error::{Error, Result};
pub use init::{ConstInit, InitPolicy, RandomInit};
pub use layer::{
    Activation, ActivationLayer, Bias, Dropout, Layer, LayerSpec, Linear, LinearNoBias,
    LogSoftmax, Sequential,
};
pub use loss::Loss;
pub use network::{Network, ParamRange};
pub use objective::Objective;
pub use optim::{GradientDescent, Optimizer, Sgd};
pub use scale::MeanNormalization;

#[cfg(feature = "serde")]
pub use serialize::{SerializedNetwork, MODEL_FORMAT_VERSION};
