//! Feed-forward network: a linear stack of dense layers.
//!
//! A `Network` goes through three states:
//!
//! - `Building`: layers are being declared with [`Network::layer`].
//! - `Configured`: all `hidden_layers + 1` layers are present; hyperparameters,
//!   loss and loss gradient may still change.
//! - `Fitted`: terminal. [`Network::fit`] has run; the network only answers
//!   `predict` / `score` / `evaluate`. Any reconfiguration fails with
//!   `InvalidState`.
//!
//! Training lives in `train.rs`.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::metrics;
use crate::train::{EvalReport, FitConfig};
use crate::{Activation, Dataset, Error, Layer, LossFunction, LossGradient, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Building,
    Configured,
    Fitted,
}

#[derive(Debug, Clone)]
pub struct Network {
    input_size: usize,
    hidden_layers: usize,
    output_size: usize,
    pub(crate) layers: Vec<Layer>,
    learning_rate: f64,
    pub(crate) config: FitConfig,
    pub(crate) loss_gradient: LossGradient,
    pub(crate) loss: LossFunction,
    init_rng: StdRng,
    pub(crate) fitted: bool,
}

impl Network {
    /// Declare a network with `hidden_layers` hidden layers plus one output layer.
    ///
    /// `seed` drives Xavier initialization of every layer added afterwards.
    pub fn new(
        input_size: usize,
        hidden_layers: usize,
        output_size: usize,
        learning_rate: f64,
        seed: u64,
    ) -> Result<Self> {
        if input_size == 0 {
            return Err(Error::InvalidArgument("input_size must be > 0".to_owned()));
        }
        if output_size == 0 {
            return Err(Error::InvalidArgument("output_size must be > 0".to_owned()));
        }
        if hidden_layers.checked_add(1).is_none() {
            return Err(Error::InvalidArgument(format!(
                "hidden_layers is too large: {hidden_layers}"
            )));
        }
        check_learning_rate(learning_rate)?;

        Ok(Self {
            input_size,
            hidden_layers,
            output_size,
            layers: Vec::new(),
            learning_rate,
            config: FitConfig::default(),
            loss_gradient: LossGradient::default(),
            loss: LossFunction::default(),
            init_rng: StdRng::seed_from_u64(seed),
            fitted: false,
        })
    }

    /// Declare and add every layer in one call.
    ///
    /// The last `(units, activation)` pair is the output layer, so
    /// `output_size` is taken from it.
    pub fn from_layers(
        input_size: usize,
        layers: &[(usize, &str)],
        learning_rate: f64,
        seed: u64,
    ) -> Result<Self> {
        let Some(&(output_size, _)) = layers.last() else {
            return Err(Error::InvalidArgument(
                "network needs at least one layer".to_owned(),
            ));
        };

        let mut net = Self::new(
            input_size,
            layers.len() - 1,
            output_size,
            learning_rate,
            seed,
        )?;
        for &(units, name) in layers {
            net.layer(units, name)?;
        }
        Ok(net)
    }

    /// Reassemble a network from already-built layers. The result is `Fitted`.
    pub(crate) fn from_parts(
        layers: Vec<Layer>,
        learning_rate: f64,
        config: FitConfig,
        loss_gradient: LossGradient,
        loss: LossFunction,
    ) -> Result<Self> {
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return Err(Error::InvalidArgument(
                "network needs at least one layer".to_owned(),
            ));
        };
        check_learning_rate(learning_rate)?;
        config.validate()?;

        for (i, pair) in layers.windows(2).enumerate() {
            if pair[1].input_count() != pair[0].unit_count() {
                return Err(Error::InvalidShape(format!(
                    "layer {} input count {} does not match layer {i} unit count {}",
                    i + 1,
                    pair[1].input_count(),
                    pair[0].unit_count()
                )));
            }
            if pair[0].activation().is_terminal_only() {
                return Err(Error::InvalidArgument(format!(
                    "activation {} is only allowed on the output layer (layer {i})",
                    pair[0].activation()
                )));
            }
        }

        Ok(Self {
            input_size: first.input_count(),
            hidden_layers: layers.len() - 1,
            output_size: last.unit_count(),
            learning_rate,
            config,
            loss_gradient,
            loss,
            init_rng: StdRng::seed_from_u64(0),
            fitted: true,
            layers,
        })
    }

    /// Add the next layer, resolving its activation by name.
    pub fn layer(&mut self, units: usize, activation: &str) -> Result<&mut Self> {
        self.check_has_room()?;
        let activation = Activation::from_name(activation)?;
        self.layer_with(units, activation)
    }

    /// Add the next layer with an already-resolved activation.
    pub fn layer_with(&mut self, units: usize, activation: Activation) -> Result<&mut Self> {
        self.check_has_room()?;

        let is_output = self.layers.len() == self.hidden_layers;
        if activation.is_terminal_only() && !is_output {
            return Err(Error::InvalidArgument(format!(
                "activation {activation} is only allowed on the output layer"
            )));
        }
        if is_output && units != self.output_size {
            return Err(Error::InvalidShape(format!(
                "output layer has {units} units, expected output_size {}",
                self.output_size
            )));
        }

        let inputs = self
            .layers
            .last()
            .map_or(self.input_size, Layer::unit_count);
        let layer = Layer::new_with_rng(inputs, units, activation, &mut self.init_rng)?;
        self.layers.push(layer);
        Ok(self)
    }

    /// Set epochs, batch size, validation split, patience and shuffling.
    pub fn configure(&mut self, config: FitConfig) -> Result<&mut Self> {
        self.check_not_fitted()?;
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Select the scalar loss reported on the validation set.
    pub fn loss(&mut self, name: &str) -> Result<&mut Self> {
        self.check_not_fitted()?;
        self.loss = LossFunction::from_name(name)?;
        Ok(self)
    }

    /// Select the terminal delta used to start backpropagation.
    pub fn loss_gradient(&mut self, name: &str) -> Result<&mut Self> {
        self.check_not_fitted()?;
        self.loss_gradient = LossGradient::from_name(name)?;
        Ok(self)
    }

    pub fn learning_rate(&mut self, lr: f64) -> Result<&mut Self> {
        self.check_not_fitted()?;
        check_learning_rate(lr)?;
        self.learning_rate = lr;
        Ok(self)
    }

    pub fn state(&self) -> NetworkState {
        if self.fitted {
            NetworkState::Fitted
        } else if self.layers.len() == self.hidden_layers + 1 {
            NetworkState::Configured
        } else {
            NetworkState::Building
        }
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    #[inline]
    pub fn hidden_layers(&self) -> usize {
        self.hidden_layers
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn current_learning_rate(&self) -> f64 {
        self.learning_rate
    }

    #[inline]
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    #[inline]
    pub fn loss_function(&self) -> LossFunction {
        self.loss
    }

    #[inline]
    pub fn terminal_gradient(&self) -> LossGradient {
        self.loss_gradient
    }

    /// Forward `features` through every layer and return the raw output vector.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_fitted()?;
        self.infer(features)
    }

    /// Predict every row of `data`.
    pub fn predict_batch(&self, data: &Dataset) -> Result<Vec<Vec<f64>>> {
        self.check_fitted()?;
        self.check_dataset(data)?;
        data.iter().map(|p| self.infer(p.features)).collect()
    }

    /// Fraction of rows whose argmax prediction equals the label.
    pub fn score(&self, data: &Dataset) -> Result<f64> {
        let outputs = self.predict_batch(data)?;
        metrics::accuracy(&outputs, &data.labels())
    }

    /// Mean loss (with one-hot targets) and accuracy over `data`.
    pub fn evaluate(&self, data: &Dataset) -> Result<EvalReport> {
        self.check_fitted()?;
        self.check_dataset(data)?;
        self.evaluate_unchecked(data)
    }

    /// Evaluation without the lifecycle check; `fit` uses it for validation.
    pub(crate) fn evaluate_unchecked(&self, data: &Dataset) -> Result<EvalReport> {
        let mut total_loss = 0.0_f64;
        let mut correct = 0usize;
        for point in data {
            let target = metrics::one_hot(point.label, self.output_size)?;
            let out = self.infer(point.features)?;
            total_loss += self.loss.compute(&out, &target)?;
            if metrics::is_correct(&out, point.label) {
                correct += 1;
            }
        }

        let n = data.len().max(1) as f64;
        Ok(EvalReport {
            loss: total_loss / n,
            accuracy: correct as f64 / n,
        })
    }

    fn infer(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.input_size {
            return Err(Error::InvalidShape(format!(
                "features len {} does not match input_size {}",
                features.len(),
                self.input_size
            )));
        }

        let mut x = features.to_vec();
        for layer in &self.layers {
            x = layer.infer(&x)?;
        }
        Ok(x)
    }

    pub(crate) fn check_dataset(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("dataset must not be empty".to_owned()));
        }
        if data.feature_count() != self.input_size {
            return Err(Error::InvalidShape(format!(
                "dataset feature count {} does not match input_size {}",
                data.feature_count(),
                self.input_size
            )));
        }
        Ok(())
    }

    fn check_has_room(&self) -> Result<()> {
        self.check_not_fitted()?;
        if self.layers.len() > self.hidden_layers {
            return Err(Error::InvalidState(format!(
                "all {} layers have already been added",
                self.hidden_layers + 1
            )));
        }
        Ok(())
    }

    pub(crate) fn check_not_fitted(&self) -> Result<()> {
        if self.fitted {
            return Err(Error::InvalidState(
                "network has already been fitted".to_owned(),
            ));
        }
        Ok(())
    }

    fn check_fitted(&self) -> Result<()> {
        if !self.fitted {
            return Err(Error::InvalidState(
                "network has not been fitted yet".to_owned(),
            ));
        }
        Ok(())
    }
}

fn check_learning_rate(lr: f64) -> Result<()> {
    if !(lr.is_finite() && lr > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "learning rate must be finite and > 0, got {lr}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Network {
        Network::from_layers(2, &[(3, "tanh"), (2, "softmax")], 0.1, 0).unwrap()
    }

    #[test]
    fn state_moves_from_building_to_configured() {
        let mut net = Network::new(2, 1, 2, 0.1, 0).unwrap();
        assert_eq!(net.state(), NetworkState::Building);
        net.layer(4, "sigmoid").unwrap();
        assert_eq!(net.state(), NetworkState::Building);
        net.layer(2, "softmax").unwrap();
        assert_eq!(net.state(), NetworkState::Configured);

        assert_eq!(net.layers()[0].input_count(), 2);
        assert_eq!(net.layers()[1].input_count(), 4);
    }

    #[test]
    fn layer_budget_is_enforced() {
        let mut net = tiny();
        let err = net.layer(2, "sigmoid").unwrap_err();
        assert!(err.is_state_error());
    }

    #[test]
    fn huge_hidden_layer_count_is_rejected_or_cheap() {
        let err = Network::new(2, usize::MAX, 2, 0.1, 0).unwrap_err();
        assert!(err.is_argument_error());

        let mut net = Network::new(2, 1 << 40, 2, 0.1, 0).unwrap();
        assert_eq!(net.state(), NetworkState::Building);
        net.layer(3, "relu").unwrap();
        assert_eq!(net.layers().len(), 1);
    }

    #[test]
    fn unknown_activation_and_hidden_softmax_are_argument_errors() {
        let mut net = Network::new(2, 1, 2, 0.1, 0).unwrap();
        assert!(net.layer(4, "swish").unwrap_err().is_argument_error());
        assert!(net.layer(4, "softmax").unwrap_err().is_argument_error());
        assert_eq!(net.layers().len(), 0);
    }

    #[test]
    fn output_layer_width_must_match_output_size() {
        let mut net = Network::new(2, 0, 3, 0.1, 0).unwrap();
        assert!(net.layer(2, "softmax").unwrap_err().is_argument_error());
        net.layer(3, "softmax").unwrap();
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let a = tiny();
        let b = tiny();
        for (la, lb) in a.layers().iter().zip(b.layers()) {
            assert_eq!(la.weights(), lb.weights());
        }
        let c = Network::from_layers(2, &[(3, "tanh"), (2, "softmax")], 0.1, 1).unwrap();
        assert_ne!(a.layers()[0].weights(), c.layers()[0].weights());
    }

    #[test]
    fn inference_requires_fit() {
        let net = tiny();
        let data = Dataset::from_rows(&[vec![0.0, 1.0]], &[1.0]).unwrap();
        assert!(net.predict(&[0.0, 1.0]).unwrap_err().is_state_error());
        assert!(net.score(&data).unwrap_err().is_state_error());
        assert!(net.evaluate(&data).unwrap_err().is_state_error());
        assert!(net.predict_batch(&data).unwrap_err().is_state_error());
    }

    #[test]
    fn configuration_validates_values() {
        let mut net = tiny();
        assert!(net.learning_rate(0.0).unwrap_err().is_argument_error());
        assert!(net.loss("hinge").unwrap_err().is_argument_error());
        assert!(net.loss_gradient("mse").unwrap_err().is_argument_error());
        net.loss("crossEntropy").unwrap().learning_rate(0.5).unwrap();
        assert_eq!(net.loss_function(), LossFunction::CrossEntropy);
        assert_eq!(net.current_learning_rate(), 0.5);
    }

    #[test]
    fn from_parts_rejects_mismatched_stack() {
        let a = Layer::new_with_seed(2, 3, Activation::Tanh, 0).unwrap();
        let b = Layer::new_with_seed(4, 2, Activation::Softmax, 0).unwrap();
        let err = Network::from_parts(
            vec![a, b],
            0.1,
            FitConfig::default(),
            LossGradient::default(),
            LossFunction::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn score_counts_argmax_hits() {
        // Class 1 wins when x > 0.
        let out = Layer::from_rows(
            1,
            2,
            Activation::Softmax,
            &[vec![0.0, -1.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let net = Network::from_parts(
            vec![out],
            0.1,
            FitConfig::default(),
            LossGradient::default(),
            LossFunction::default(),
        )
        .unwrap();
        let data = Dataset::from_rows(
            &[vec![1.0], vec![-1.0], vec![2.0], vec![-2.0]],
            &[1.0, 0.0, 0.0, 0.0],
        )
        .unwrap();
        assert_eq!(net.score(&data).unwrap(), 0.75);
        assert_eq!(net.evaluate(&data).unwrap().accuracy, 0.75);
    }
}
