//! Loss functions and terminal loss gradients.
//!
//! Training uses two separately named pieces:
//!
//! - a [`LossGradient`], which produces the terminal delta injected at the output
//!   layer (already expressed w.r.t. the output pre-activation), and
//! - a [`LossFunction`], which produces the scalar loss reported on the
//!   validation set.
//!
//! Both are resolved by name once, when the network is configured or loaded.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Floor applied to probabilities before taking logarithms.
const LOG_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Terminal error signal for the output layer.
pub enum LossGradient {
    /// Softmax output + cross-entropy: `delta = pred - target`.
    #[default]
    SoftmaxCrossEntropy,
}

impl LossGradient {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "softmaxCrossEntropy" => Ok(LossGradient::SoftmaxCrossEntropy),
            _ => Err(Error::InvalidArgument(format!(
                "unknown loss gradient: {name}"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LossGradient::SoftmaxCrossEntropy => "softmaxCrossEntropy",
        }
    }

    /// Write the terminal delta for one sample into `delta`.
    ///
    /// Shape contract: `pred.len() == target.len() == delta.len()`.
    pub fn delta(self, pred: &[f64], target: &[f64], delta: &mut [f64]) -> Result<()> {
        check_same_len(pred, target)?;
        if delta.len() != pred.len() {
            return Err(Error::InvalidShape(format!(
                "delta len {} does not match pred len {}",
                delta.len(),
                pred.len()
            )));
        }

        match self {
            LossGradient::SoftmaxCrossEntropy => {
                for ((d, &p), &t) in delta.iter_mut().zip(pred).zip(target) {
                    *d = p - t;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for LossGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossGradient {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LossGradient::from_name(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Scalar per-sample loss.
pub enum LossFunction {
    /// Sum of squared errors.
    #[default]
    Sse,
    /// Mean squared error.
    Mse,
    /// Categorical cross-entropy on probabilities: `-sum(t * ln(p))`.
    CrossEntropy,
}

impl LossFunction {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sse" => Ok(LossFunction::Sse),
            "mse" => Ok(LossFunction::Mse),
            "crossEntropy" => Ok(LossFunction::CrossEntropy),
            _ => Err(Error::InvalidArgument(format!(
                "unknown loss function: {name}"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LossFunction::Sse => "sse",
            LossFunction::Mse => "mse",
            LossFunction::CrossEntropy => "crossEntropy",
        }
    }

    /// Compute the loss for one sample.
    pub fn compute(self, pred: &[f64], target: &[f64]) -> Result<f64> {
        check_same_len(pred, target)?;

        Ok(match self {
            LossFunction::Sse => sse(pred, target),
            LossFunction::Mse => {
                if pred.is_empty() {
                    0.0
                } else {
                    sse(pred, target) / pred.len() as f64
                }
            }
            LossFunction::CrossEntropy => cross_entropy(pred, target),
        })
    }
}

impl fmt::Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LossFunction::from_name(s)
    }
}

fn check_same_len(pred: &[f64], target: &[f64]) -> Result<()> {
    if pred.len() != target.len() {
        return Err(Error::InvalidShape(format!(
            "pred len {} does not match target len {}",
            pred.len(),
            target.len()
        )));
    }
    Ok(())
}

#[inline]
fn sse(pred: &[f64], target: &[f64]) -> f64 {
    let mut sum_sq = 0.0_f64;
    for (&p, &t) in pred.iter().zip(target) {
        let diff = p - t;
        sum_sq = diff.mul_add(diff, sum_sq);
    }
    sum_sq
}

#[inline]
fn cross_entropy(pred: &[f64], target: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    for (&p, &t) in pred.iter().zip(target) {
        if t != 0.0 {
            sum -= t * p.max(LOG_EPS).ln();
        }
    }
    sum
}
