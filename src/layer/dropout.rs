//! Inverted dropout.
//!
//! In training mode each element is zeroed with probability `ratio` and the
//! survivors are scaled by `1 / (1 - ratio)`, so no rescaling is needed at
//! inference time. In inference mode the layer is the identity, which keeps
//! prediction deterministic.
//!
//! The layer owns a caller-seeded RNG; there is no hidden global random state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::layer::{missing_forward, Layer, LayerSpec};

#[derive(Debug, Clone)]
pub struct Dropout {
    ratio: f32,
    seed: u64,
    rng: StdRng,
    training: bool,
    // Forward cache: per-element keep mask (0 or 1/(1-ratio)).
    mask: Vec<f32>,
}

impl Dropout {
    /// Dropout with the given zeroing probability and RNG seed.
    ///
    /// `ratio` must be finite and in `[0, 1)`.
    pub fn new(ratio: f32, seed: u64) -> Result<Self> {
        if !(ratio.is_finite() && (0.0..1.0).contains(&ratio)) {
            return Err(Error::InvalidConfig(format!(
                "dropout ratio must be finite and in [0, 1), got {ratio}"
            )));
        }
        Ok(Self {
            ratio,
            seed,
            rng: StdRng::seed_from_u64(seed),
            training: true,
            mask: Vec::new(),
        })
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }
}

impl Layer for Dropout {
    fn output_size(&self, input_size: usize) -> usize {
        input_size
    }

    fn forward(&mut self, _params: &[f32], input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), output.len());

        if !self.training {
            output.copy_from_slice(input);
            // Identity mask so a (unusual) backward in inference mode is
            // still consistent with what forward computed.
            self.mask.clear();
            self.mask.resize(input.len(), 1.0);
            return;
        }

        let scale = 1.0 / (1.0 - self.ratio);
        self.mask.clear();
        self.mask.reserve(input.len());
        for i in 0..input.len() {
            let keep = self.rng.gen::<f32>() >= self.ratio;
            let m = if keep { scale } else { 0.0 };
            self.mask.push(m);
            output[i] = input[i] * m;
        }
    }

    fn backward(&mut self, _params: &[f32], d_output: &[f32], d_input: &mut [f32]) -> Result<()> {
        if self.mask.len() != d_output.len() || self.mask.is_empty() {
            return Err(missing_forward("Dropout"));
        }
        assert_eq!(d_input.len(), d_output.len());

        for i in 0..d_output.len() {
            d_input[i] = d_output[i] * self.mask[i];
        }
        Ok(())
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Dropout {
            ratio: self.ratio,
            seed: self.seed,
        }
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn reset_state(&mut self) {
        self.mask.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_must_be_a_probability() {
        assert!(Dropout::new(1.0, 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
        assert!(Dropout::new(f32::NAN, 0).is_err());
        assert!(Dropout::new(0.0, 0).is_ok());
    }

    #[test]
    fn inference_mode_is_identity() {
        let mut layer = Dropout::new(0.5, 7).unwrap();
        layer.set_training(false);

        let input = [1.0_f32, 2.0, 3.0, 4.0];
        let mut output = [0.0_f32; 4];
        layer.forward(&[], &input, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn training_mode_zeroes_or_scales() {
        let mut layer = Dropout::new(0.5, 7).unwrap();
        let input = [1.0_f32; 256];
        let mut output = [0.0_f32; 256];
        layer.forward(&[], &input, &mut output);

        let scale = 2.0;
        let mut dropped = 0;
        for &y in &output {
            assert!(y == 0.0 || (y - scale).abs() < 1e-6);
            if y == 0.0 {
                dropped += 1;
            }
        }
        // With ratio 0.5 over 256 elements, both outcomes must occur.
        assert!(dropped > 0 && dropped < 256);
    }

    #[test]
    fn backward_applies_the_same_mask() {
        let mut layer = Dropout::new(0.3, 42).unwrap();
        let input = [1.0_f32; 32];
        let mut output = [0.0_f32; 32];
        layer.forward(&[], &input, &mut output);

        let d_output = [1.0_f32; 32];
        let mut d_input = [0.0_f32; 32];
        layer.backward(&[], &d_output, &mut d_input).unwrap();
        assert_eq!(&d_input[..], &output[..]);
    }
}
