//! Model serialization (feature: `serde`).
//!
//! Defines a versioned, stable on-disk format for [`Network`]. Internal
//! structs are never serialized directly. The external representation is a
//! separate set of types, so the file format stays stable even if the
//! in-memory representation changes.
//!
//! Loading validates the format version, the architecture, the parameter
//! length against the summed per-layer counts, and that every value is
//! finite. A saved model reloads to identical predictions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layer::LayerSpec;
use crate::loss::Loss;
use crate::network::Network;

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    pub loss: Loss,
    pub layers: Vec<LayerSpec>,
    pub parameters: Vec<f32>,
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {MODEL_FORMAT_VERSION}",
                self.format_version
            )));
        }
        if self.layers.is_empty() {
            return Err(Error::InvalidData(
                "serialized model must have at least one layer".to_owned(),
            ));
        }

        let mut expected = 0_usize;
        for (i, spec) in self.layers.iter().enumerate() {
            spec.validate()
                .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;
            let layer = spec.build()?;
            expected += layer.parameter_count();
        }
        if self.parameters.len() != expected {
            return Err(Error::InvalidData(format!(
                "parameters length {} does not match the architecture's count {expected}",
                self.parameters.len()
            )));
        }
        if self.parameters.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "parameters must contain only finite values".to_owned(),
            ));
        }
        Ok(())
    }
}

impl From<&Network> for SerializedNetwork {
    fn from(network: &Network) -> Self {
        let layers = (0..network.num_layers())
            .filter_map(|i| network.layer(i))
            .map(|layer| layer.spec())
            .collect();
        Self {
            format_version: MODEL_FORMAT_VERSION,
            loss: network.loss(),
            layers,
            parameters: network.parameters().to_vec(),
        }
    }
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let mut network = Network::with_loss(value.loss);
        for spec in &value.layers {
            network.add_boxed(spec.build()?);
        }
        network.set_parameters(&value.parameters)?;
        Ok(network)
    }
}

impl Network {
    /// Serialize the model to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Serialize the model to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a model from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the model to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::InvalidData(format!("failed to write {}: {e}", p.display())))?;
        Ok(())
    }

    /// Load a model from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::InvalidData(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Inputs;
    use crate::layer::{ActivationLayer, Dropout, Linear};

    fn sample_network() -> Network {
        let mut net = Network::with_loss(Loss::Mse);
        net.add(Linear::new(3, 4));
        net.add(ActivationLayer::sigmoid());
        net.add(Dropout::new(0.2, 9).unwrap());
        net.add(Linear::new(4, 2));
        net.set_seed(5);
        net.reset_parameters();
        net
    }

    #[test]
    fn round_trip_reproduces_predictions() {
        let mut net = sample_network();
        let inputs =
            Inputs::from_rows(&[vec![0.1, -0.4, 0.7], vec![1.0, 0.0, -1.0]]).unwrap();
        let before = net.predict(&inputs).unwrap();

        let json = net.to_json_string().unwrap();
        let mut loaded = Network::from_json_str(&json).unwrap();
        let after = loaded.predict(&inputs).unwrap();
        assert_eq!(before, after);

        // A second encode of the reloaded model is stable.
        assert_eq!(json, loaded.to_json_string().unwrap());
    }

    #[test]
    fn rejects_unknown_version() {
        let bad = r#"{"format_version":999,"loss":"mse","layers":[],"parameters":[]}"#;
        let err = Network::from_json_str(bad).unwrap_err();
        assert!(format!("{err}").contains("format_version"));
    }

    #[test]
    fn rejects_parameter_count_mismatch() {
        let net = sample_network();
        let mut ser = SerializedNetwork::from(&net);
        ser.parameters.pop();
        assert!(ser.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_parameters() {
        let net = sample_network();
        let mut ser = SerializedNetwork::from(&net);
        ser.parameters[0] = f32::NAN;
        assert!(ser.validate().is_err());
    }

    #[test]
    fn save_and_load_files() {
        let net = sample_network();
        let dir = std::env::temp_dir().join("ffnet_serialize_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");

        net.save_json(&path).unwrap();
        let loaded = Network::load_json(&path).unwrap();
        assert_eq!(loaded.parameters(), net.parameters());
        std::fs::remove_file(&path).ok();
    }
}
