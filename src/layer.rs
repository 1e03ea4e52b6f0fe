//! Dense layer.
//!
//! A layer owns one weight matrix of shape `(units, inputs + 1)`, row-major, with
//! column 0 holding the bias. `forward` prepends the implicit bias input `1`:
//!
//! - `z = W [1; x]`
//! - `y = activation(z)`
//!
//! and caches `[1; x]`, `z` and `y` for the backward helpers (`gradient`,
//! `backpropagate`, `activation_derivative`). Calling any of those before the
//! first `forward` (or after `apply_gradient`) fails with `InvalidState`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::matmul::{matvec, matvec_transposed, outer_accumulate};
use crate::{Activation, Error, Result};

#[derive(Debug, Clone, Default)]
struct ForwardCache {
    /// `[1; x]`, length `inputs + 1`.
    input: Vec<f64>,
    pre_activation: Vec<f64>,
    output: Vec<f64>,
    valid: bool,
}

#[derive(Debug, Clone)]
pub struct Layer {
    input_count: usize,
    unit_count: usize,
    activation: Activation,
    /// Row-major matrix with shape (unit_count, input_count + 1).
    weights: Vec<f64>,
    cache: ForwardCache,
}

impl Layer {
    /// Xavier/Glorot-initialized layer: weights drawn from
    /// `N(0, sqrt(2 / (rows + cols - 1)))`.
    pub fn new_with_rng<R: Rng + ?Sized>(
        input_count: usize,
        unit_count: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        check_dims(input_count, unit_count)?;
        activation.validate()?;

        let (_, len) = weight_shape(input_count, unit_count)?;
        let std = (2.0 / (unit_count as f64 + input_count as f64)).sqrt();
        let weights = (0..len)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                z * std
            })
            .collect();

        Ok(Self::with_weights(input_count, unit_count, activation, weights))
    }

    pub fn new_with_seed(
        input_count: usize,
        unit_count: usize,
        activation: Activation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(input_count, unit_count, activation, &mut rng)
    }

    /// Build a layer from an existing row-major weight buffer (bias in column 0).
    pub fn from_parts(
        input_count: usize,
        unit_count: usize,
        activation: Activation,
        weights: Vec<f64>,
    ) -> Result<Self> {
        check_dims(input_count, unit_count)?;
        activation.validate()?;

        let (cols, expected) = weight_shape(input_count, unit_count)?;
        if weights.len() != expected {
            return Err(Error::InvalidShape(format!(
                "weights length {} does not match units * (inputs + 1) ({unit_count} * {cols})",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidArgument(
                "weights must contain only finite values".to_owned(),
            ));
        }

        Ok(Self::with_weights(input_count, unit_count, activation, weights))
    }

    /// Build a layer from one weight row per unit.
    ///
    /// Row shapes are checked against the declared dims before anything is
    /// allocated.
    pub fn from_rows(
        input_count: usize,
        unit_count: usize,
        activation: Activation,
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        check_dims(input_count, unit_count)?;
        let (cols, _) = weight_shape(input_count, unit_count)?;
        if rows.len() != unit_count {
            return Err(Error::InvalidShape(format!(
                "weight matrix has {} rows, expected {unit_count}",
                rows.len()
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(Error::InvalidShape(format!(
                "weight row {i} has {} columns, expected {cols}",
                row.len()
            )));
        }
        Self::from_parts(input_count, unit_count, activation, rows.concat())
    }

    fn with_weights(
        input_count: usize,
        unit_count: usize,
        activation: Activation,
        weights: Vec<f64>,
    ) -> Self {
        Self {
            input_count,
            unit_count,
            activation,
            weights,
            cache: ForwardCache::default(),
        }
    }

    #[inline]
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    #[inline]
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Row-major weights, shape `(units, inputs + 1)`, bias in column 0.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weights as one `Vec` per unit.
    pub fn weight_rows(&self) -> Vec<Vec<f64>> {
        self.weights
            .chunks_exact(self.input_count + 1)
            .map(<[f64]>::to_vec)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Zeroed buffer shaped like the weights, for gradient accumulation.
    pub fn zero_grad(&self) -> Vec<f64> {
        vec![0.0; self.weights.len()]
    }

    /// Training forward pass; caches everything the backward helpers need.
    pub fn forward(&mut self, input: &[f64]) -> Result<&[f64]> {
        self.check_input(input)?;

        let cols = self.input_count + 1;
        let cache = &mut self.cache;
        cache.input.resize(cols, 0.0);
        cache.input[0] = 1.0;
        cache.input[1..].copy_from_slice(input);
        cache.pre_activation.resize(self.unit_count, 0.0);
        cache.output.resize(self.unit_count, 0.0);

        matvec(
            &self.weights,
            self.unit_count,
            cols,
            &cache.input,
            &mut cache.pre_activation,
        );
        self.activation
            .forward(&cache.pre_activation, &mut cache.output);
        cache.valid = true;

        Ok(&cache.output)
    }

    /// Inference forward pass; leaves the training cache untouched.
    pub fn infer(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;

        let cols = self.input_count + 1;
        let mut with_bias = Vec::with_capacity(cols);
        with_bias.push(1.0);
        with_bias.extend_from_slice(input);

        let mut z = vec![0.0; self.unit_count];
        matvec(&self.weights, self.unit_count, cols, &with_bias, &mut z);
        let mut out = vec![0.0; self.unit_count];
        self.activation.forward(&z, &mut out);
        Ok(out)
    }

    /// Weight gradient `delta [1; x]^T` for the last forward pass.
    pub fn gradient(&self, delta: &[f64]) -> Result<Vec<f64>> {
        let mut grad = self.zero_grad();
        self.accumulate_gradient(delta, &mut grad)?;
        Ok(grad)
    }

    /// `acc += delta [1; x]^T`, the allocation-free form of [`Layer::gradient`].
    pub fn accumulate_gradient(&self, delta: &[f64], acc: &mut [f64]) -> Result<()> {
        let cache = self.cached()?;
        self.check_delta(delta)?;
        if acc.len() != self.weights.len() {
            return Err(Error::InvalidShape(format!(
                "gradient buffer len {} does not match weights len {}",
                acc.len(),
                self.weights.len()
            )));
        }

        outer_accumulate(delta, &cache.input, acc);
        Ok(())
    }

    /// Upstream delta `(W^T delta)` with the bias row dropped (length `inputs`).
    ///
    /// The previous layer's activation derivative is not applied here.
    pub fn backpropagate(&self, delta: &[f64]) -> Result<Vec<f64>> {
        self.cached()?;
        self.check_delta(delta)?;

        let cols = self.input_count + 1;
        let mut back = vec![0.0; cols];
        matvec_transposed(&self.weights, self.unit_count, cols, delta, &mut back);
        back.remove(0);
        Ok(back)
    }

    /// Activation derivative at the cached pre-activation.
    ///
    /// Fails with `Unsupported` for terminal-only activations (softmax).
    pub fn activation_derivative(&self) -> Result<Vec<f64>> {
        let cache = self.cached()?;
        let mut d = vec![0.0; self.unit_count];
        self.activation.derivative(&cache.pre_activation, &mut d)?;
        Ok(d)
    }

    /// `weights -= grad * (lr / max(batch_size, 1))`.
    ///
    /// Invalidates the forward cache.
    pub fn apply_gradient(&mut self, grad: &[f64], lr: f64, batch_size: usize) -> Result<()> {
        if grad.len() != self.weights.len() {
            return Err(Error::InvalidShape(format!(
                "gradient len {} does not match weights len {}",
                grad.len(),
                self.weights.len()
            )));
        }

        let scale = lr / batch_size.max(1) as f64;
        for (w, &g) in self.weights.iter_mut().zip(grad) {
            *w = (-scale).mul_add(g, *w);
        }
        self.cache.valid = false;
        Ok(())
    }

    fn cached(&self) -> Result<&ForwardCache> {
        if !self.cache.valid {
            return Err(Error::InvalidState(
                "layer has no cached forward pass; call forward first".to_owned(),
            ));
        }
        Ok(&self.cache)
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_count {
            return Err(Error::InvalidShape(format!(
                "input len {} does not match layer input count {}",
                input.len(),
                self.input_count
            )));
        }
        Ok(())
    }

    fn check_delta(&self, delta: &[f64]) -> Result<()> {
        if delta.len() != self.unit_count {
            return Err(Error::InvalidShape(format!(
                "delta len {} does not match layer unit count {}",
                delta.len(),
                self.unit_count
            )));
        }
        Ok(())
    }
}

fn check_dims(input_count: usize, unit_count: usize) -> Result<()> {
    if input_count == 0 || unit_count == 0 {
        return Err(Error::InvalidArgument(format!(
            "layer dims must be > 0, got inputs={input_count} units={unit_count}"
        )));
    }
    Ok(())
}

/// `(inputs + 1, units * (inputs + 1))`, or `InvalidShape` when either overflows.
fn weight_shape(input_count: usize, unit_count: usize) -> Result<(usize, usize)> {
    input_count
        .checked_add(1)
        .and_then(|cols| Some((cols, unit_count.checked_mul(cols)?)))
        .ok_or_else(|| {
            Error::InvalidShape(format!(
                "layer weight shape overflows: inputs={input_count} units={unit_count}"
            ))
        })
}
