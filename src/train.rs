//! Mini-batch gradient descent with validation and early stopping.

use log::{debug, info, trace};
use rand::Rng;

use crate::metrics;
use crate::{Dataset, Error, Network, Result};

/// How rows are ordered during `fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shuffle {
    /// Keep the original row order for the validation split and every epoch.
    None,
    /// The validation split shuffles with `base`; epoch `e` shuffles its
    /// batches with `base + 1 + e`.
    Seeded(u64),
}

impl Shuffle {
    /// Seeded shuffling with a base seed drawn from the thread RNG.
    pub fn from_entropy() -> Self {
        Shuffle::Seeded(rand::thread_rng().r#gen())
    }

    pub(crate) fn split_seed(self) -> Option<u64> {
        match self {
            Shuffle::None => None,
            Shuffle::Seeded(base) => Some(base),
        }
    }

    pub(crate) fn epoch_seed(self, epoch: usize) -> Option<u64> {
        match self {
            Shuffle::None => None,
            Shuffle::Seeded(base) => Some(base.wrapping_add(1).wrapping_add(epoch as u64)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of rows held out for validation, in `[0, 1)`.
    pub validation_split: f64,
    /// Epochs without validation-loss improvement before stopping.
    pub patience: usize,
    pub shuffle: Shuffle,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 1,
            validation_split: 0.0,
            patience: 5,
            shuffle: Shuffle::Seeded(0),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidArgument("epochs must be > 0".to_owned()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidArgument("batch_size must be > 0".to_owned()));
        }
        if !(self.validation_split.is_finite()
            && (0.0..1.0).contains(&self.validation_split))
        {
            return Err(Error::InvalidArgument(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if self.patience == 0 {
            return Err(Error::InvalidArgument("patience must be > 0".to_owned()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// `None` when no validation set was held out.
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
    pub epochs_run: usize,
    pub stopped_early: bool,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub loss: f64,
    pub accuracy: f64,
}

impl Network {
    /// Train on `data` and move the network to the `Fitted` state.
    ///
    /// Every label is checked before any weight changes; an invalid label aborts
    /// the whole call.
    pub fn fit(&mut self, data: &Dataset) -> Result<FitReport> {
        self.check_not_fitted()?;
        if self.layers.len() != self.hidden_layers() + 1 {
            return Err(Error::InvalidState(format!(
                "network has {} of {} layers; add every layer before fit",
                self.layers.len(),
                self.hidden_layers() + 1
            )));
        }
        self.check_dataset(data)?;
        for point in data {
            metrics::class_index(point.label, self.output_size())?;
        }

        let cfg = self.config;
        let n = data.len();
        let val_size = (n as f64 * cfg.validation_split).floor() as usize;
        let train_size = n - val_size;
        if train_size == 0 {
            return Err(Error::InvalidArgument(
                "validation_split leaves no training rows".to_owned(),
            ));
        }

        let (val, train) = data.split(val_size, train_size, cfg.shuffle.split_seed())?;
        debug!(
            "fit: {train_size} training rows, {val_size} validation rows, shuffle={:?}",
            cfg.shuffle
        );

        let mut report = FitReport {
            epochs: Vec::with_capacity(cfg.epochs),
            epochs_run: 0,
            stopped_early: false,
        };
        let mut best_val_loss = f64::INFINITY;
        let mut epochs_without_improvement = 0usize;

        for epoch in 0..cfg.epochs {
            self.run_epoch(&train, epoch)?;
            report.epochs_run = epoch + 1;

            if val.is_empty() {
                info!(
                    "epoch {}/{}: no validation set (validation_split={})",
                    epoch + 1,
                    cfg.epochs,
                    cfg.validation_split
                );
                report.epochs.push(EpochReport {
                    epoch,
                    val_loss: None,
                    val_accuracy: None,
                });
                continue;
            }

            let eval = self.evaluate_unchecked(&val)?;
            info!(
                "epoch {}/{}: val_loss={:.6} val_accuracy={:.4}",
                epoch + 1,
                cfg.epochs,
                eval.loss,
                eval.accuracy
            );
            report.epochs.push(EpochReport {
                epoch,
                val_loss: Some(eval.loss),
                val_accuracy: Some(eval.accuracy),
            });

            if eval.loss < best_val_loss {
                best_val_loss = eval.loss;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= cfg.patience {
                    info!(
                        "early stopping at epoch {}: no improvement for {} epochs (best val_loss={:.6})",
                        epoch + 1,
                        cfg.patience,
                        best_val_loss
                    );
                    report.stopped_early = true;
                    break;
                }
            }
        }

        self.fitted = true;
        Ok(report)
    }

    fn run_epoch(&mut self, train: &Dataset, epoch: usize) -> Result<()> {
        let batch_size = self.config.batch_size;
        let batches = match self.config.shuffle.epoch_seed(epoch) {
            Some(seed) => train.shuffled_batches(batch_size, seed)?,
            None => train.batches(batch_size)?,
        };

        for (b, batch) in batches.enumerate() {
            trace!("epoch {epoch} batch {b}: {} rows", batch.len());
            self.train_batch(&batch)?;
        }
        Ok(())
    }

    /// Accumulate gradients over `batch`, then apply them once.
    fn train_batch(&mut self, batch: &Dataset) -> Result<()> {
        let mut grads: Vec<Vec<f64>> = self.layers.iter().map(|l| l.zero_grad()).collect();
        let output_size = self.output_size();
        let mut delta = vec![0.0; output_size];

        for point in batch {
            let target = metrics::one_hot(point.label, output_size)?;

            let mut x = point.features.to_vec();
            for layer in &mut self.layers {
                x = layer.forward(&x)?.to_vec();
            }

            delta.resize(output_size, 0.0);
            self.loss_gradient.delta(&x, &target, &mut delta)?;
            self.backward(&mut delta, &mut grads)?;
        }

        let lr = self.current_learning_rate();
        for (layer, grad) in self.layers.iter_mut().zip(&grads) {
            layer.apply_gradient(grad, lr, batch.len())?;
        }
        Ok(())
    }

    /// Walk the layers right to left, accumulating each weight gradient.
    ///
    /// `delta` holds the terminal delta on entry and is reused as scratch.
    fn backward(&self, delta: &mut Vec<f64>, grads: &mut [Vec<f64>]) -> Result<()> {
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            layer.accumulate_gradient(delta, &mut grads[i])?;

            if i > 0 {
                let mut upstream = layer.backpropagate(delta)?;
                let derivative = self.layers[i - 1].activation_derivative()?;
                for (u, d) in upstream.iter_mut().zip(&derivative) {
                    *u *= d;
                }
                *delta = upstream;
            }
        }
        Ok(())
    }
}
