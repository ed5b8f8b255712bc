//! Parameter initialization policies.
//!
//! `reset_parameters` delegates filling the freshly sized parameter buffer to
//! a pluggable [`InitPolicy`]. Policies receive the per-layer range
//! boundaries so layer-aware schemes are possible, and an explicit
//! caller-seeded RNG. There is no hidden global random state.

use std::fmt;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use crate::error::{Error, Result};
use crate::network::ParamRange;

pub trait InitPolicy: fmt::Debug + Send {
    /// Fills `params` with initial values. `layout` holds the per-layer
    /// `(offset, len)` boundaries within `params`.
    fn fill(&self, params: &mut [f32], layout: &[ParamRange], rng: &mut StdRng);

    /// Polymorphic clone, so a network can deep-clone its policy.
    fn clone_policy(&self) -> Box<dyn InitPolicy>;
}

impl Clone for Box<dyn InitPolicy> {
    fn clone(&self) -> Self {
        self.clone_policy()
    }
}

/// Uniform random initialization over `[low, high]`.
#[derive(Debug, Clone, Copy)]
pub struct RandomInit {
    low: f32,
    high: f32,
}

impl RandomInit {
    pub fn new(low: f32, high: f32) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(Error::InvalidConfig(format!(
                "random init bounds must be finite with low < high, got [{low}, {high}]"
            )));
        }
        Ok(Self { low, high })
    }
}

impl Default for RandomInit {
    fn default() -> Self {
        Self {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl InitPolicy for RandomInit {
    fn fill(&self, params: &mut [f32], _layout: &[ParamRange], rng: &mut StdRng) {
        let dist = Uniform::new_inclusive(self.low, self.high);
        for p in params.iter_mut() {
            *p = dist.sample(rng);
        }
    }

    fn clone_policy(&self) -> Box<dyn InitPolicy> {
        Box::new(*self)
    }
}

/// Fills every parameter with one constant value.
#[derive(Debug, Clone, Copy)]
pub struct ConstInit {
    value: f32,
}

impl ConstInit {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl InitPolicy for ConstInit {
    fn fill(&self, params: &mut [f32], _layout: &[ParamRange], rng: &mut StdRng) {
        let _ = rng;
        params.fill(self.value);
    }

    fn clone_policy(&self) -> Box<dyn InitPolicy> {
        Box::new(*self)
    }
}
