//! Model records and JSON persistence.
//!
//! Records are transfer structs decoupled from the in-memory types, so the file
//! format stays stable if `Layer`/`Network` internals change. Activation and loss
//! functions are stored by registry name; weights as one row per unit with the
//! bias in column 0.
//!
//! Converting a record back validates the format version, every name, every
//! weight shape and that all weights are finite. A network rebuilt from a record
//! is `Fitted`.
//!
//! JSON helpers (`to_json_string`, `save_json`, ...) need the `serde` feature.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use log::debug;
#[cfg(feature = "serde")]
use std::path::Path;

use crate::train::FitConfig;
use crate::{
    Activation, Error, Layer, LossFunction, LossGradient, Network, NetworkState, Perceptron,
    Result,
};

pub const FORMAT_VERSION: u32 = 1;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub inputs: usize,
    pub units: usize,
    pub activation: String,
    /// `units` rows of `inputs + 1` values, bias first.
    pub weights: Vec<Vec<f64>>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRecord {
    pub format_version: u32,
    pub input_size: usize,
    pub hidden_layers: usize,
    pub output_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub loss_gradient: String,
    pub loss: String,
    pub layers: Vec<LayerRecord>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptronRecord {
    pub format_version: u32,
    pub learning_rate: f64,
    pub iterations: usize,
    pub threshold: f64,
    pub shuffle: bool,
    pub weight_seed: Option<u64>,
    /// `None` for an unfitted perceptron.
    pub theta: Option<Vec<f64>>,
}

fn check_version(version: u32) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(Error::InvalidArgument(format!(
            "unsupported format_version {version}; expected {FORMAT_VERSION}"
        )));
    }
    Ok(())
}

impl Layer {
    pub fn to_record(&self) -> LayerRecord {
        LayerRecord {
            inputs: self.input_count(),
            units: self.unit_count(),
            activation: self.activation().name(),
            weights: self.weight_rows(),
        }
    }

    pub fn from_record(record: &LayerRecord) -> Result<Self> {
        let activation = Activation::from_name(&record.activation)?;
        Layer::from_rows(record.inputs, record.units, activation, &record.weights)
    }
}

impl NetworkRecord {
    /// Structural checks that do not need to build any layer.
    pub fn validate(&self) -> Result<()> {
        check_version(self.format_version)?;

        if self.layers.len().checked_sub(1) != Some(self.hidden_layers) {
            return Err(Error::InvalidShape(format!(
                "record declares {} hidden layers but stores {} layers",
                self.hidden_layers,
                self.layers.len()
            )));
        }
        if let Some(first) = self.layers.first() {
            if first.inputs != self.input_size {
                return Err(Error::InvalidShape(format!(
                    "first layer has {} inputs, expected input_size {}",
                    first.inputs, self.input_size
                )));
            }
        }
        if let Some(last) = self.layers.last() {
            if last.units != self.output_size {
                return Err(Error::InvalidShape(format!(
                    "last layer has {} units, expected output_size {}",
                    last.units, self.output_size
                )));
            }
        }
        Ok(())
    }
}

impl Network {
    /// Snapshot of the architecture, hyperparameters and weights.
    ///
    /// Fails with `InvalidState` while layers are still being declared.
    pub fn to_record(&self) -> Result<NetworkRecord> {
        if self.state() == NetworkState::Building {
            return Err(Error::InvalidState(
                "cannot export a network before all layers are added".to_owned(),
            ));
        }

        let config = self.config();
        Ok(NetworkRecord {
            format_version: FORMAT_VERSION,
            input_size: self.input_size(),
            hidden_layers: self.hidden_layers(),
            output_size: self.output_size(),
            learning_rate: self.current_learning_rate(),
            epochs: config.epochs,
            batch_size: config.batch_size,
            validation_split: config.validation_split,
            loss_gradient: self.terminal_gradient().name().to_owned(),
            loss: self.loss_function().name().to_owned(),
            layers: self.layers().iter().map(Layer::to_record).collect(),
        })
    }

    /// Rebuild a fitted network with identical weights.
    pub fn from_record(record: &NetworkRecord) -> Result<Self> {
        record.validate()?;

        let loss_gradient = LossGradient::from_name(&record.loss_gradient)?;
        let loss = LossFunction::from_name(&record.loss)?;
        let config = FitConfig {
            epochs: record.epochs,
            batch_size: record.batch_size,
            validation_split: record.validation_split,
            ..FitConfig::default()
        };

        let mut layers = Vec::with_capacity(record.layers.len());
        for (i, layer) in record.layers.iter().enumerate() {
            layers.push(Layer::from_record(layer).map_err(|e| e.context(&format!("layer {i}")))?);
        }

        Network::from_parts(layers, record.learning_rate, config, loss_gradient, loss)
    }
}

impl Perceptron {
    pub fn to_record(&self) -> PerceptronRecord {
        PerceptronRecord {
            format_version: FORMAT_VERSION,
            learning_rate: self.learning_rate,
            iterations: self.iterations,
            threshold: self.threshold,
            shuffle: self.shuffle,
            weight_seed: self.weight_seed,
            theta: self.theta.clone(),
        }
    }

    pub fn from_record(record: &PerceptronRecord) -> Result<Self> {
        check_version(record.format_version)?;
        Perceptron::from_parts(
            record.learning_rate,
            record.iterations,
            record.threshold,
            record.shuffle,
            record.weight_seed,
            record.theta.clone(),
        )
    }
}

#[cfg(feature = "serde")]
fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let res = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    res.map_err(|e| Error::Serialization(format!("failed to serialize model: {e}")))
}

#[cfg(feature = "serde")]
fn from_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T> {
    serde_json::from_str(s)
        .map_err(|e| Error::Serialization(format!("failed to parse model json: {e}")))
}

#[cfg(feature = "serde")]
fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .map_err(|e| Error::Serialization(format!("failed to write {}: {e}", path.display())))?;
    debug!("saved model to {}", path.display());
    Ok(())
}

#[cfg(feature = "serde")]
fn read_file(path: &Path) -> Result<String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| Error::Serialization(format!("failed to read {}: {e}", path.display())))?;
    debug!("loaded model from {}", path.display());
    Ok(s)
}

#[cfg(feature = "serde")]
impl Network {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        to_json(&self.to_record()?, true)
    }

    pub fn to_json_string(&self) -> Result<String> {
        to_json(&self.to_record()?, false)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Network::from_record(&from_json(s)?)
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), &self.to_json_string_pretty()?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Network::from_json_str(&read_file(path.as_ref())?)
    }
}

#[cfg(feature = "serde")]
impl Perceptron {
    pub fn to_json_string_pretty(&self) -> Result<String> {
        to_json(&self.to_record(), true)
    }

    pub fn to_json_string(&self) -> Result<String> {
        to_json(&self.to_record(), false)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Perceptron::from_record(&from_json(s)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), &self.to_json_string_pretty()?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Perceptron::from_json_str(&read_file(path.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden_network() -> Network {
        let hidden = Layer::from_rows(
            2,
            2,
            Activation::Sigmoid,
            &[vec![0.1, 0.2, 0.3], vec![-0.4, 0.5, -0.6]],
        )
        .unwrap();
        let output = Layer::from_rows(
            2,
            2,
            Activation::Softmax,
            &[vec![0.7, -0.8, 0.9], vec![1.0, 1.5, -2.0]],
        )
        .unwrap();
        Network::from_parts(
            vec![hidden, output],
            0.05,
            FitConfig::default(),
            LossGradient::SoftmaxCrossEntropy,
            LossFunction::Sse,
        )
        .unwrap()
    }

    #[test]
    fn record_round_trip_preserves_predictions() {
        let net = golden_network();
        let record = net.to_record().unwrap();
        assert_eq!(record.layers[1].activation, "softmax");
        assert_eq!(record.layers[0].weights[1], vec![-0.4, 0.5, -0.6]);

        let back = Network::from_record(&record).unwrap();
        assert_eq!(back.state(), NetworkState::Fitted);
        for x in [[0.0, 0.0], [0.3, -1.2], [2.0, 5.0]] {
            assert_eq!(net.predict(&x).unwrap(), back.predict(&x).unwrap());
        }
    }

    #[test]
    fn layer_record_keeps_parameterized_activation() {
        let layer = Layer::new_with_seed(3, 2, Activation::LeakyReLU { alpha: 0.2 }, 4).unwrap();
        let record = layer.to_record();
        assert_eq!(record.activation, "leakyRelu=double:0.2");
        let back = Layer::from_record(&record).unwrap();
        assert_eq!(back.activation(), layer.activation());
        assert_eq!(back.weights(), layer.weights());
    }

    #[test]
    fn building_network_cannot_be_exported() {
        let mut net = Network::new(2, 1, 2, 0.1, 0).unwrap();
        net.layer(3, "relu").unwrap();
        assert!(net.to_record().unwrap_err().is_state_error());
    }

    #[test]
    fn invalid_records_are_rejected() {
        let good = golden_network().to_record().unwrap();

        let mut r = good.clone();
        r.format_version = 2;
        assert!(Network::from_record(&r).unwrap_err().is_argument_error());

        let mut r = good.clone();
        r.layers[0].activation = "swish".to_owned();
        assert!(Network::from_record(&r).unwrap_err().is_argument_error());

        let mut r = good.clone();
        r.loss = "hinge".to_owned();
        assert!(Network::from_record(&r).unwrap_err().is_argument_error());

        let mut r = good.clone();
        r.layers[1].weights[0].pop();
        let err = Network::from_record(&r).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(ref m) if m.starts_with("layer 1")));

        let mut r = good.clone();
        r.layers[0].weights[0][1] = f64::INFINITY;
        assert!(Network::from_record(&r).is_err());

        let mut r = good.clone();
        r.hidden_layers = 0;
        assert!(Network::from_record(&r).is_err());

        let mut r = good;
        r.layers[0].activation = "softmax".to_owned();
        assert!(Network::from_record(&r).unwrap_err().is_argument_error());
    }

    #[test]
    fn oversized_declared_dims_are_shape_errors() {
        let good = golden_network().to_record().unwrap();

        for inputs in [usize::MAX, 1 << 40] {
            let mut r = good.clone();
            r.layers[0] = LayerRecord {
                inputs,
                units: 1,
                activation: "sigmoid".to_owned(),
                weights: vec![vec![0.0]],
            };
            assert!(matches!(
                Layer::from_record(&r.layers[0]).unwrap_err(),
                Error::InvalidShape(_)
            ));
            assert!(Network::from_record(&r).unwrap_err().is_argument_error());
        }

        let mut r = good;
        r.hidden_layers = usize::MAX;
        assert!(matches!(r.validate().unwrap_err(), Error::InvalidShape(_)));
        r.layers.clear();
        assert!(Network::from_record(&r).unwrap_err().is_argument_error());
    }

    #[test]
    fn perceptron_record_round_trip() {
        let mut p = Perceptron::new();
        p.threshold(0.5).unwrap();
        let unfitted = Perceptron::from_record(&p.to_record()).unwrap();
        assert!(!unfitted.is_fitted());

        let mut fitted = p.to_record();
        fitted.theta = Some(vec![-1.5, 1.0, 1.0]);
        let back = Perceptron::from_record(&fitted).unwrap();
        assert_eq!(back.predict(&[1.0, 1.0]).unwrap(), 1.0);
        assert_eq!(back.predict(&[1.0, 0.0]).unwrap(), -1.0);

        fitted.theta = Some(vec![f64::NAN, 0.0]);
        assert!(Perceptron::from_record(&fitted).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn golden_json_is_stable_and_roundtrips() {
        let json = golden_network().to_json_string_pretty().unwrap();

        let golden = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/golden/network_v1.json"
        ))
        .trim_end();
        assert_eq!(json, golden);

        let loaded = Network::from_json_str(golden).unwrap();
        assert_eq!(loaded.to_json_string_pretty().unwrap(), golden);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = Network::from_json_str("{\"format_version\": 1").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));

        let err = Perceptron::from_json_str("[]").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_with_huge_layer_inputs_is_rejected() {
        let mut r = golden_network().to_record().unwrap();
        r.input_size = 1 << 40;
        r.output_size = 1;
        r.hidden_layers = 0;
        r.layers = vec![LayerRecord {
            inputs: 1 << 40,
            units: 1,
            activation: "softmax".to_owned(),
            weights: vec![vec![0.0]],
        }];
        let json = to_json(&r, false).unwrap();
        assert!(json.contains("\"inputs\":1099511627776"));
        let err = Network::from_json_str(&json).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(ref m) if m.starts_with("layer 0")));

        r.hidden_layers = usize::MAX;
        let err = Network::from_json_str(&to_json(&r, false).unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }
}
