//! Classification metrics.
//!
//! Metrics are evaluation helpers; they do not participate in backprop. Labels are
//! stored as `f64` in a [`crate::Dataset`] and interpreted here as class indices.

use crate::{Error, Result};

/// Index of the largest value (first one wins on ties).
///
/// Returns `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Interpret `label` as a class index in `[0, classes)`.
pub fn class_index(label: f64, classes: usize) -> Result<usize> {
    if label.is_finite() && label.fract() == 0.0 && label >= 0.0 && label < classes as f64 {
        Ok(label as usize)
    } else {
        Err(Error::InvalidArgument(format!(
            "label {label} is not a class index in [0, {classes})"
        )))
    }
}

/// One-hot target vector for a class label.
pub fn one_hot(label: f64, classes: usize) -> Result<Vec<f64>> {
    let idx = class_index(label, classes)?;
    let mut target = vec![0.0; classes];
    target[idx] = 1.0;
    Ok(target)
}

/// True if `argmax(output)` equals the class label.
#[inline]
pub fn is_correct(output: &[f64], label: f64) -> bool {
    argmax(output).is_some_and(|i| i as f64 == label)
}

/// Fraction of rows whose argmax prediction equals the label.
///
/// Shape contract: `outputs.len() == labels.len()`; empty input yields `0.0`.
pub fn accuracy(outputs: &[Vec<f64>], labels: &[f64]) -> Result<f64> {
    if outputs.len() != labels.len() {
        return Err(Error::InvalidShape(format!(
            "outputs len {} does not match labels len {}",
            outputs.len(),
            labels.len()
        )));
    }
    if outputs.is_empty() {
        return Ok(0.0);
    }

    let correct = outputs
        .iter()
        .zip(labels)
        .filter(|(out, label)| is_correct(out, **label))
        .count();
    Ok(correct as f64 / outputs.len() as f64)
}
