//! Classic perceptron for binary labels in `{-1, +1}`.
//!
//! The weight vector `theta` stores the bias first, so a prediction is
//! `sign(theta · [1; x])` with `raw >= threshold` mapping to `+1`.

use std::borrow::Cow;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::{Dataset, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Perceptron {
    pub(crate) learning_rate: f64,
    pub(crate) iterations: usize,
    pub(crate) threshold: f64,
    pub(crate) shuffle: bool,
    pub(crate) weight_seed: Option<u64>,
    pub(crate) theta: Option<Vec<f64>>,
}

impl Default for Perceptron {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            iterations: 1000,
            threshold: 0.0,
            shuffle: false,
            weight_seed: None,
            theta: None,
        }
    }
}

impl Perceptron {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        learning_rate: f64,
        iterations: usize,
        threshold: f64,
        shuffle: bool,
        weight_seed: Option<u64>,
        theta: Option<Vec<f64>>,
    ) -> Result<Self> {
        let mut p = Self::default();
        p.learning_rate(learning_rate)?
            .iterations(iterations)?
            .threshold(threshold)?
            .shuffle(shuffle)?;
        p.weight_seed = weight_seed;

        if let Some(theta) = &theta {
            if theta.len() < 2 {
                return Err(Error::InvalidShape(format!(
                    "theta needs a bias and at least one weight, got {} values",
                    theta.len()
                )));
            }
            if theta.iter().any(|w| !w.is_finite()) {
                return Err(Error::InvalidArgument(
                    "theta must contain only finite values".to_owned(),
                ));
            }
        }
        p.theta = theta;
        Ok(p)
    }

    pub fn learning_rate(&mut self, lr: f64) -> Result<&mut Self> {
        self.check_not_fitted()?;
        if !(lr.is_finite() && lr > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "learning rate must be finite and > 0, got {lr}"
            )));
        }
        self.learning_rate = lr;
        Ok(self)
    }

    /// Maximum number of epochs.
    pub fn iterations(&mut self, iterations: usize) -> Result<&mut Self> {
        self.check_not_fitted()?;
        if iterations == 0 {
            return Err(Error::InvalidArgument("iterations must be > 0".to_owned()));
        }
        self.iterations = iterations;
        Ok(self)
    }

    pub fn threshold(&mut self, threshold: f64) -> Result<&mut Self> {
        self.check_not_fitted()?;
        if !threshold.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "threshold must be finite, got {threshold}"
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// Shuffle the training rows at the start of every epoch.
    pub fn shuffle(&mut self, shuffle: bool) -> Result<&mut Self> {
        self.check_not_fitted()?;
        self.shuffle = shuffle;
        Ok(self)
    }

    /// Initialise `theta` from `N(0, 1)` with `seed` instead of zeros.
    ///
    /// The same seed also drives epoch shuffling.
    pub fn weight_seed(&mut self, seed: u64) -> Result<&mut Self> {
        self.check_not_fitted()?;
        self.weight_seed = Some(seed);
        Ok(self)
    }

    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.theta.is_some()
    }

    /// Learned weights, bias first.
    pub fn theta(&self) -> Option<&[f64]> {
        self.theta.as_deref()
    }

    /// Train with the perceptron rule; returns the number of epochs run.
    ///
    /// Stops after the first epoch without a misclassification.
    pub fn fit(&mut self, data: &Dataset) -> Result<usize> {
        self.check_not_fitted()?;
        check_binary_labels(data)?;

        let mut rng = StdRng::seed_from_u64(self.weight_seed.unwrap_or(0));
        let width = data.feature_count() + 1;
        let mut theta: Vec<f64> = match self.weight_seed {
            Some(_) => (0..width).map(|_| rng.sample::<f64, _>(StandardNormal)).collect(),
            None => vec![0.0; width],
        };

        let mut rows: Cow<'_, Dataset> = Cow::Borrowed(data);
        let mut epochs_run = 0;
        for epoch in 0..self.iterations {
            if self.shuffle {
                rows.to_mut().shuffle(rng.r#gen());
            }

            let mut mistakes = 0usize;
            for point in rows.iter() {
                let pred = self.activate(&theta, point.features);
                if pred != point.label {
                    mistakes += 1;
                }
                let step = self.learning_rate * (point.label - pred);
                theta[0] += step;
                for (w, &x) in theta[1..].iter_mut().zip(point.features) {
                    *w = step.mul_add(x, *w);
                }
            }

            epochs_run = epoch + 1;
            debug!("perceptron epoch {epochs_run}: {mistakes} misclassified");
            if mistakes == 0 {
                info!("perceptron converged after {epochs_run} epochs");
                break;
            }
        }

        self.theta = Some(theta);
        Ok(epochs_run)
    }

    /// Predict `+1.0` or `-1.0` for one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let theta = self.fitted_theta()?;
        if features.len() + 1 != theta.len() {
            return Err(Error::InvalidShape(format!(
                "features len {} does not match model input size {}",
                features.len(),
                theta.len() - 1
            )));
        }
        Ok(self.activate(theta, features))
    }

    /// Fraction of rows predicted correctly.
    pub fn score(&self, data: &Dataset) -> Result<f64> {
        self.fitted_theta()?;
        check_binary_labels(data)?;

        let mut correct = 0usize;
        for point in data {
            if self.predict(point.features)? == point.label {
                correct += 1;
            }
        }
        Ok(correct as f64 / data.len() as f64)
    }

    #[inline]
    fn activate(&self, theta: &[f64], features: &[f64]) -> f64 {
        let raw = features
            .iter()
            .zip(&theta[1..])
            .fold(theta[0], |acc, (&x, &w)| w.mul_add(x, acc));
        if raw >= self.threshold { 1.0 } else { -1.0 }
    }

    fn fitted_theta(&self) -> Result<&[f64]> {
        self.theta.as_deref().ok_or_else(|| {
            Error::InvalidState("perceptron has not been fitted yet".to_owned())
        })
    }

    fn check_not_fitted(&self) -> Result<()> {
        if self.is_fitted() {
            return Err(Error::InvalidState(
                "perceptron has already been fitted".to_owned(),
            ));
        }
        Ok(())
    }
}

fn check_binary_labels(data: &Dataset) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("dataset must not be empty".to_owned()));
    }
    if let Some(bad) = data.iter().find(|p| p.label != 1.0 && p.label != -1.0) {
        return Err(Error::InvalidArgument(format!(
            "perceptron labels must be -1 or 1, got {}",
            bad.label
        )));
    }
    Ok(())
}
