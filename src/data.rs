//! Contiguous dataset containers.
//!
//! The training loop and the objective adapter operate on row slices to avoid
//! per-step allocations. `Inputs` and `Dataset` provide validated, row-major
//! storage for predictor/response matrices.

use crate::{Error, Result};

/// A collection of input samples (X), stored row-major in one buffer.
#[derive(Debug, Clone)]
pub struct Inputs {
    values: Vec<f32>,
    len: usize,
    input_dim: usize,
}

impl Inputs {
    /// Build inputs from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(values: Vec<f32>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if values.len() % input_dim != 0 {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {input_dim}",
                values.len()
            )));
        }
        let len = values.len() / input_dim;
        Ok(Self {
            values,
            len,
            input_dim,
        })
    }

    /// Build inputs from per-sample rows (copies into contiguous storage).
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        let input_dim = rows[0].len();
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        let mut values = Vec::with_capacity(rows.len() * input_dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != input_dim {
                return Err(Error::InvalidData(format!(
                    "input row {i} has len {}, expected {input_dim}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            values,
            len: rows.len(),
            input_dim,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Returns the `idx`-th input row. Panics if `idx >= len`.
    #[inline]
    pub fn input(&self, idx: usize) -> &[f32] {
        let start = idx * self.input_dim;
        &self.values[start..start + self.input_dim]
    }
}

/// A supervised dataset: predictors (X) and responses (Y).
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Inputs,
    targets: Vec<f32>,
    target_dim: usize,
}

impl Dataset {
    /// Build a dataset from flat buffers: `inputs` is `(len, input_dim)` and
    /// `targets` is `(len, target_dim)`.
    pub fn from_flat(
        inputs: Vec<f32>,
        targets: Vec<f32>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        let inputs = Inputs::from_flat(inputs, input_dim)?;
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        if targets.len() != inputs.len() * target_dim {
            return Err(Error::InvalidData(format!(
                "targets length {} does not match len * target_dim ({} * {target_dim})",
                targets.len(),
                inputs.len()
            )));
        }
        Ok(Self {
            inputs,
            targets,
            target_dim,
        })
    }

    /// Build a dataset from per-sample rows (copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        let inputs = Inputs::from_rows(inputs)?;
        let target_dim = targets.first().map(|t| t.len()).unwrap_or(0);
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        let mut flat = Vec::with_capacity(targets.len() * target_dim);
        for (i, row) in targets.iter().enumerate() {
            if row.len() != target_dim {
                return Err(Error::InvalidData(format!(
                    "target row {i} has len {}, expected {target_dim}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        Ok(Self {
            inputs,
            targets: flat,
            target_dim,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.inputs.input_dim()
    }

    #[inline]
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[inline]
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// Returns the `idx`-th input row. Panics if `idx >= len`.
    #[inline]
    pub fn input(&self, idx: usize) -> &[f32] {
        self.inputs.input(idx)
    }

    /// Returns the `idx`-th target row. Panics if `idx >= len`.
    #[inline]
    pub fn target(&self, idx: usize) -> &[f32] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    /// Validates that `[start, start + len)` is a sample range of this
    /// dataset, for batch-sliced evaluation.
    pub fn check_batch(&self, start: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Err(Error::InvalidConfig("batch len must be > 0".to_owned()));
        }
        let end = start.checked_add(len).ok_or_else(|| {
            Error::InvalidConfig(format!("batch range {start}+{len} overflows"))
        })?;
        if end > self.len() {
            return Err(Error::InvalidConfig(format!(
                "batch range [{start}, {end}) exceeds dataset len {}",
                self.len()
            )));
        }
        Ok(())
    }
}
