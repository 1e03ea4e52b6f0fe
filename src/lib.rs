//! A small from-scratch machine-learning toolkit.
//!
//! `rust-mlkit` pairs a growable tabular store ([`Dataset`]) with a feed-forward
//! network engine ([`Network`]) that trains with manual backpropagation and
//! mini-batch gradient descent, plus a classic [`Perceptron`].
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - [`Dataset`] stores rows contiguously in row-major layout, with one `f64` label
//!   per row. The consuming model decides what a label means (class index for
//!   [`Network`], `-1`/`+1` for [`Perceptron`]).
//! - Layer weights are row-major with shape `(units, inputs + 1)`; column 0 is the
//!   bias.
//!
//! # Lifecycle
//!
//! A [`Network`] is declared layer by layer, configured, then fitted exactly once.
//! Inference before `fit` and reconfiguration after it fail with
//! [`Error::InvalidState`]. See [`NetworkState`].
//!
//! # Randomness
//!
//! Weight initialization and shuffling are seeded explicitly
//! ([`Network::new`], [`Shuffle::Seeded`]). [`Shuffle::from_entropy`] is the only
//! place that reads the thread RNG.
//!
//! # Logging
//!
//! Training progress is reported through the [`log`] facade. The library never
//! installs a logger.
//!
//! # Quick start
//!
//! ```rust
//! use rust_mlkit::{Dataset, FitConfig, Network};
//!
//! # fn main() -> rust_mlkit::Result<()> {
//! let mut data = Dataset::new(2)?;
//! data.add(&[0.1, 0.2], 0.0)?
//!     .add(&[0.9, 0.8], 1.0)?
//!     .add(&[0.2, 0.1], 0.0)?
//!     .add(&[0.7, 0.9], 1.0)?;
//!
//! let mut net = Network::new(2, 1, 2, 0.1, 0)?;
//! net.layer(4, "sigmoid")?.layer(2, "softmax")?;
//! net.configure(FitConfig {
//!     epochs: 50,
//!     batch_size: 2,
//!     ..FitConfig::default()
//! })?;
//!
//! let report = net.fit(&data)?;
//! assert_eq!(report.epochs_run, 50);
//!
//! let probs = net.predict(&[0.8, 0.9])?;
//! assert_eq!(probs.len(), 2);
//! let _accuracy = net.score(&data)?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub(crate) mod matmul;
pub mod metrics;
pub mod network;
pub mod perceptron;
pub mod serde_model;
pub mod train;

pub use activation::Activation;
pub use data::{Batches, ColumnSummary, DataPoint, Dataset, Rows, Summary};
pub use error::{Error, Result};
pub use layer::Layer;
pub use loss::{LossFunction, LossGradient};
pub use network::{Network, NetworkState};
pub use perceptron::Perceptron;
pub use serde_model::{FORMAT_VERSION, LayerRecord, NetworkRecord, PerceptronRecord};
pub use train::{EpochReport, EvalReport, FitConfig, FitReport, Shuffle};
