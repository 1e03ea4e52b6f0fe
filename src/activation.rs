//! Activation functions.
//!
//! A dense layer computes a pre-activation vector `z = W [1; x]` and then applies an
//! activation: element-wise for most functions, as a whole-vector transform for
//! `softmax` (which needs joint normalization).
//!
//! Activations are resolved by name once, when a layer is declared or loaded.
//! The name grammar is `kind` or `kind=double:<param>`:
//!
//! - `sigmoid`, `softmax`, `linear`, `tanh`, `relu`
//! - `leakyRelu` (alpha = 0.01) / `leakyRelu=double:<alpha>`
//! - `elu` (alpha = 1.0) / `elu=double:<alpha>`

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const DEFAULT_LEAKY_ALPHA: f64 = 0.01;
const DEFAULT_ELU_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Layer activation function.
pub enum Activation {
    Sigmoid,
    /// Only valid on the output layer, paired with a matching loss gradient.
    Softmax,
    Linear,
    Tanh,
    ReLU,
    LeakyReLU { alpha: f64 },
    ELU { alpha: f64 },
}

impl Activation {
    /// Resolve an activation from its registry name.
    pub fn from_name(name: &str) -> Result<Self> {
        let (kind, param) = match name.split_once('=') {
            Some((kind, param)) => (kind, Some(param)),
            None => (name, None),
        };

        let act = match (kind, param) {
            ("sigmoid", None) => Activation::Sigmoid,
            ("softmax", None) => Activation::Softmax,
            ("linear", None) => Activation::Linear,
            ("tanh", None) => Activation::Tanh,
            ("relu", None) => Activation::ReLU,
            ("leakyRelu", None) => Activation::LeakyReLU {
                alpha: DEFAULT_LEAKY_ALPHA,
            },
            ("leakyRelu", Some(p)) => Activation::LeakyReLU {
                alpha: parse_double_param(name, p)?,
            },
            ("elu", None) => Activation::ELU {
                alpha: DEFAULT_ELU_ALPHA,
            },
            ("elu", Some(p)) => Activation::ELU {
                alpha: parse_double_param(name, p)?,
            },
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown activation function: {name}"
                )));
            }
        };

        act.validate()?;
        Ok(act)
    }

    /// Canonical registry name; `from_name(act.name())` yields `act` again.
    pub fn name(self) -> String {
        self.to_string()
    }

    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyReLU { alpha } | Activation::ELU { alpha } => {
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(Error::InvalidArgument(format!(
                        "activation alpha must be finite and >= 0, got {alpha}"
                    )));
                }
            }
            Activation::Sigmoid
            | Activation::Softmax
            | Activation::Linear
            | Activation::Tanh
            | Activation::ReLU => {}
        }

        Ok(())
    }

    /// True if the derivative is only meaningful when folded into a terminal loss gradient.
    pub fn is_terminal_only(self) -> bool {
        matches!(self, Activation::Softmax)
    }

    /// Apply the activation to a full pre-activation vector.
    ///
    /// Shape contract: `z.len() == out.len()`.
    pub(crate) fn forward(self, z: &[f64], out: &mut [f64]) {
        debug_assert_eq!(z.len(), out.len());

        if let Activation::Softmax = self {
            softmax(z, out);
            return;
        }

        for (o, &v) in out.iter_mut().zip(z) {
            *o = self.forward_scalar(v);
        }
    }

    #[inline]
    fn forward_scalar(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Linear => x,
            Activation::Tanh => x.tanh(),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::ELU { alpha } => {
                if x >= 0.0 {
                    x
                } else {
                    alpha * x.exp_m1()
                }
            }
            Activation::Softmax => unreachable!("softmax is a vector transform"),
        }
    }

    /// Element-wise derivative evaluated at the pre-activation `z`.
    ///
    /// Fails with `Unsupported` for softmax: its Jacobian does not reduce to an
    /// element-wise factor.
    pub(crate) fn derivative(self, z: &[f64], out: &mut [f64]) -> Result<()> {
        debug_assert_eq!(z.len(), out.len());

        if self.is_terminal_only() {
            return Err(Error::Unsupported(
                "softmax derivative is not element-wise; use softmax only as the output layer \
                 with the softmaxCrossEntropy loss gradient"
                    .to_owned(),
            ));
        }

        for (d, &x) in out.iter_mut().zip(z) {
            *d = match self {
                Activation::Sigmoid => {
                    let s = sigmoid(x);
                    s * (1.0 - s)
                }
                Activation::Linear => 1.0,
                Activation::Tanh => {
                    let t = x.tanh();
                    1.0 - t * t
                }
                Activation::ReLU => {
                    if x > 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                Activation::LeakyReLU { alpha } => {
                    if x > 0.0 {
                        1.0
                    } else {
                        alpha
                    }
                }
                Activation::ELU { alpha } => {
                    if x >= 0.0 {
                        1.0
                    } else {
                        alpha * x.exp()
                    }
                }
                Activation::Softmax => unreachable!(),
            };
        }

        Ok(())
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Sigmoid => f.write_str("sigmoid"),
            Activation::Softmax => f.write_str("softmax"),
            Activation::Linear => f.write_str("linear"),
            Activation::Tanh => f.write_str("tanh"),
            Activation::ReLU => f.write_str("relu"),
            Activation::LeakyReLU { alpha } => write!(f, "leakyRelu=double:{alpha}"),
            Activation::ELU { alpha } => write!(f, "elu=double:{alpha}"),
        }
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Activation::from_name(s)
    }
}

fn parse_double_param(name: &str, param: &str) -> Result<f64> {
    param
        .strip_prefix("double:")
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| Error::InvalidArgument(format!("malformed activation parameter in {name}")))
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn softmax(z: &[f64], out: &mut [f64]) {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0_f64;
    for (o, &v) in out.iter_mut().zip(z) {
        *o = (v - max).exp();
        sum += *o;
    }
    let inv_sum = 1.0 / sum;
    for o in out.iter_mut() {
        *o *= inv_sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(act: Activation, z: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; z.len()];
        act.forward(z, &mut out);
        out
    }

    #[test]
    fn resolves_every_registry_name() {
        assert_eq!(Activation::from_name("sigmoid").unwrap(), Activation::Sigmoid);
        assert_eq!(Activation::from_name("softmax").unwrap(), Activation::Softmax);
        assert_eq!(Activation::from_name("linear").unwrap(), Activation::Linear);
        assert_eq!(Activation::from_name("tanh").unwrap(), Activation::Tanh);
        assert_eq!(Activation::from_name("relu").unwrap(), Activation::ReLU);
        assert_eq!(
            Activation::from_name("leakyRelu").unwrap(),
            Activation::LeakyReLU { alpha: 0.01 }
        );
        assert_eq!(
            Activation::from_name("leakyRelu=double:0.2").unwrap(),
            Activation::LeakyReLU { alpha: 0.2 }
        );
        assert_eq!(
            Activation::from_name("elu").unwrap(),
            Activation::ELU { alpha: 1.0 }
        );
        assert_eq!(
            "elu=double:0.5".parse::<Activation>().unwrap(),
            Activation::ELU { alpha: 0.5 }
        );
    }

    #[test]
    fn unknown_or_malformed_names_are_argument_errors() {
        for bad in ["swish", "", "relu=double:1", "elu=float:1", "leakyRelu=double:x"] {
            let err = Activation::from_name(bad).unwrap_err();
            assert!(err.is_argument_error(), "{bad}: {err}");
        }
        assert!(Activation::from_name("leakyRelu=double:-1").is_err());
    }

    #[test]
    fn names_round_trip() {
        for act in [
            Activation::Sigmoid,
            Activation::Softmax,
            Activation::Linear,
            Activation::Tanh,
            Activation::ReLU,
            Activation::LeakyReLU { alpha: 0.01 },
            Activation::ELU { alpha: 1.0 },
            Activation::ELU { alpha: 0.25 },
        ] {
            assert_eq!(Activation::from_name(&act.name()).unwrap(), act);
        }
    }

    #[test]
    fn sigmoid_basic_values() {
        let y = apply(Activation::Sigmoid, &[0.0, 40.0, -40.0]);
        assert!((y[0] - 0.5).abs() < 1e-12);
        assert!(y[1] > 0.999_999);
        assert!(y[2] < 1e-6);
    }

    #[test]
    fn softmax_is_normalized_and_stable_for_large_inputs() {
        let y = apply(Activation::Softmax, &[1000.0, 1001.0, 1002.0]);
        let sum: f64 = y.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(y.iter().all(|v| v.is_finite()));
        assert!(y[2] > y[1] && y[1] > y[0]);
    }

    #[test]
    fn piecewise_shapes() {
        assert_eq!(apply(Activation::ReLU, &[-2.0, 3.0]), vec![0.0, 3.0]);
        assert_eq!(
            apply(Activation::LeakyReLU { alpha: 0.1 }, &[-2.0, 3.0]),
            vec![-0.2, 3.0]
        );
        let elu = apply(Activation::ELU { alpha: 1.0 }, &[-1.0, 2.0]);
        assert!((elu[0] - ((-1.0_f64).exp() - 1.0)).abs() < 1e-12);
        assert_eq!(elu[1], 2.0);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let eps = 1e-6;
        let z = [-1.3, -0.2, 0.4, 2.1];
        for act in [
            Activation::Sigmoid,
            Activation::Linear,
            Activation::Tanh,
            Activation::ReLU,
            Activation::LeakyReLU { alpha: 0.05 },
            Activation::ELU { alpha: 0.7 },
        ] {
            let mut d = [0.0; 4];
            act.derivative(&z, &mut d).unwrap();
            for i in 0..z.len() {
                let numeric =
                    (act.forward_scalar(z[i] + eps) - act.forward_scalar(z[i] - eps)) / (2.0 * eps);
                assert!((d[i] - numeric).abs() < 1e-5, "{act} at {}", z[i]);
            }
        }
    }

    #[test]
    fn softmax_derivative_is_unsupported() {
        let mut d = [0.0; 2];
        let err = Activation::Softmax.derivative(&[0.0, 1.0], &mut d).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
