//! Growable tabular dataset.
//!
//! `Dataset` holds `(features, label)` rows in contiguous row-major storage:
//!
//! - `features.len() == capacity * feature_count`
//! - `labels.len() == capacity`
//! - only the first `len` rows are in use; slots past `len` are kept zeroed
//!
//! Copying accessors (`row`, `features`, `labels`, `batch`, `split`, ...) return
//! independent values. `row_ref`/`row_mut` and iteration hand out borrows into
//! the internal storage instead, so the borrow checker keeps them from
//! overlapping with any mutation of the dataset.
//!
//! Row accessors accept negative indices counted from the end (`-1` is the last row).

use std::borrow::Cow;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Initial capacity used by [`Dataset::new`].
pub const DEFAULT_CAPACITY: usize = 10;

/// Rows shown by the `Display` preview.
const PREVIEW_ROWS: usize = 10;

/// A single row borrowed from a [`Dataset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint<'a> {
    pub features: &'a [f64],
    pub label: f64,
}

#[derive(Debug)]
pub struct Dataset {
    features: Vec<f64>,
    labels: Vec<f64>,
    feature_count: usize,
    len: usize,
}

impl Dataset {
    /// Create an empty dataset whose rows have `feature_count` features.
    pub fn new(feature_count: usize) -> Result<Self> {
        Self::with_capacity(feature_count, DEFAULT_CAPACITY)
    }

    /// Create an empty dataset with room for `capacity` rows.
    pub fn with_capacity(feature_count: usize, capacity: usize) -> Result<Self> {
        if feature_count == 0 {
            return Err(Error::InvalidArgument(
                "feature_count must be > 0".to_owned(),
            ));
        }
        if capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be > 0".to_owned()));
        }
        let cells = capacity.checked_mul(feature_count).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "capacity {capacity} x {feature_count} features overflows"
            ))
        })?;

        Ok(Self {
            features: vec![0.0; cells],
            labels: vec![0.0; capacity],
            feature_count,
            len: 0,
        })
    }

    /// Build a dataset from per-sample rows.
    ///
    /// The feature count is taken from the first row.
    pub fn from_rows(features: &[Vec<f64>], labels: &[f64]) -> Result<Self> {
        let feature_count = features.first().map(Vec::len).unwrap_or(0);
        let mut data = Self::with_capacity(feature_count, features.len().max(1))?;
        data.add_rows(features, labels)?;
        Ok(data)
    }

    #[inline]
    /// Returns the number of rows in use.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the number of allocated rows.
    pub fn capacity(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// `(rows, feature_count + 1)`; the extra column is the label.
    pub fn shape(&self) -> (usize, usize) {
        (self.len, self.feature_count + 1)
    }

    /// Append one row.
    pub fn add(&mut self, features: &[f64], label: f64) -> Result<&mut Self> {
        self.check_width(features.len())?;

        if self.len == self.capacity() {
            self.grow_to(self.len + 1);
        }
        let at = self.len;
        self.row_slot_mut(at).copy_from_slice(features);
        self.labels[at] = label;
        self.len += 1;

        Ok(self)
    }

    /// Append many rows. Nothing is appended if any row is malformed.
    pub fn add_rows(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<&mut Self> {
        if features.is_empty() || labels.is_empty() {
            return Err(Error::InvalidArgument(
                "features and labels must not be empty".to_owned(),
            ));
        }
        if features.len() != labels.len() {
            return Err(Error::InvalidShape(format!(
                "features/labels length mismatch: {} vs {}",
                features.len(),
                labels.len()
            )));
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != self.feature_count {
                return Err(Error::InvalidShape(format!(
                    "row {i} has {} features, expected {}",
                    row.len(),
                    self.feature_count
                )));
            }
        }

        self.reserve_exact(features.len());
        for (row, &label) in features.iter().zip(labels) {
            let at = self.len;
            self.row_slot_mut(at).copy_from_slice(row);
            self.labels[at] = label;
            self.len += 1;
        }

        Ok(self)
    }

    /// Append rows whose label sits in column `label_index`; the remaining
    /// columns, in order, are the features.
    pub fn add_with_label_column(
        &mut self,
        rows: &[Vec<f64>],
        label_index: usize,
    ) -> Result<&mut Self> {
        let Some(first) = rows.first() else {
            return Err(Error::InvalidArgument("rows must not be empty".to_owned()));
        };
        let width = first.len();
        if label_index >= width {
            return Err(Error::IndexOutOfBounds {
                index: label_index as isize,
                len: width,
            });
        }
        if width != self.feature_count + 1 {
            return Err(Error::InvalidShape(format!(
                "rows have {width} columns, expected {}",
                self.feature_count + 1
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::InvalidShape(format!(
                    "row {i} has {} columns, expected {width}",
                    row.len()
                )));
            }
        }

        self.reserve_exact(rows.len());
        for row in rows {
            let at = self.len;
            let slot = self.row_slot_mut(at);
            let mut k = 0;
            for (j, &v) in row.iter().enumerate() {
                if j != label_index {
                    slot[k] = v;
                    k += 1;
                }
            }
            self.labels[at] = row[label_index];
            self.len += 1;
        }

        Ok(self)
    }

    /// Append every row of `other`.
    pub fn extend_from(&mut self, other: &Dataset) -> Result<&mut Self> {
        if other.feature_count != self.feature_count {
            return Err(Error::InvalidShape(format!(
                "dataset has {} features, expected {}",
                other.feature_count, self.feature_count
            )));
        }
        if other.is_empty() {
            return Err(Error::InvalidArgument(
                "dataset to append must not be empty".to_owned(),
            ));
        }

        self.reserve_exact(other.len);
        let fc = self.feature_count;
        let start = self.len * fc;
        self.features[start..start + other.len * fc]
            .copy_from_slice(&other.features[..other.len * fc]);
        self.labels[self.len..self.len + other.len].copy_from_slice(&other.labels[..other.len]);
        self.len += other.len;

        Ok(self)
    }

    /// Remove a row, shifting later rows down. Returns the removed label.
    pub fn remove(&mut self, index: isize) -> Result<f64> {
        let idx = self.resolve(index)?;
        let fc = self.feature_count;
        let removed = self.labels[idx];

        self.features
            .copy_within((idx + 1) * fc..self.len * fc, idx * fc);
        self.labels.copy_within(idx + 1..self.len, idx);

        let last = self.len - 1;
        self.row_slot_mut(last).fill(0.0);
        self.labels[last] = 0.0;
        self.len -= 1;

        Ok(removed)
    }

    /// Remove all rows. Capacity is kept.
    pub fn clear(&mut self) {
        let used = self.len * self.feature_count;
        self.features[..used].fill(0.0);
        self.labels[..self.len].fill(0.0);
        self.len = 0;
    }

    /// Shrink capacity to the number of rows in use.
    pub fn trim_to_size(&mut self) {
        self.features.truncate(self.len * self.feature_count);
        self.features.shrink_to_fit();
        self.labels.truncate(self.len);
        self.labels.shrink_to_fit();
    }

    /// Copy of the feature matrix, one `Vec` per row.
    pub fn features(&self) -> Vec<Vec<f64>> {
        self.rows_flat().chunks_exact(self.feature_count).map(<[f64]>::to_vec).collect()
    }

    /// Copy of the label vector.
    pub fn labels(&self) -> Vec<f64> {
        self.labels[..self.len].to_vec()
    }

    /// Copy of one row's features.
    pub fn row(&self, index: isize) -> Result<Vec<f64>> {
        self.row_ref(index).map(<[f64]>::to_vec)
    }

    /// Read-only view of one row's features.
    pub fn row_ref(&self, index: isize) -> Result<&[f64]> {
        let idx = self.resolve(index)?;
        Ok(self.row_at(idx))
    }

    /// Mutable view aliasing one row's storage: writes through it change the dataset.
    pub fn row_mut(&mut self, index: isize) -> Result<&mut [f64]> {
        let idx = self.resolve(index)?;
        Ok(self.row_slot_mut(idx))
    }

    pub fn label(&self, index: isize) -> Result<f64> {
        let idx = self.resolve(index)?;
        Ok(self.labels[idx])
    }

    /// Features followed by the label.
    pub fn record(&self, index: isize) -> Result<Vec<f64>> {
        let idx = self.resolve(index)?;
        let mut out = Vec::with_capacity(self.feature_count + 1);
        out.extend_from_slice(self.row_at(idx));
        out.push(self.labels[idx]);
        Ok(out)
    }

    /// Iterate rows in order without copying.
    pub fn iter(&self) -> Rows<'_> {
        Rows { data: self, next: 0 }
    }

    /// Copy of the contiguous rows `[start, start + min(size, len - start))`.
    pub fn batch(&self, start: usize, size: usize) -> Result<Dataset> {
        if size == 0 {
            return Err(Error::InvalidArgument("batch size must be > 0".to_owned()));
        }
        if start >= self.len {
            return Err(Error::IndexOutOfBounds {
                index: start as isize,
                len: self.len,
            });
        }
        let end = (start + size).min(self.len);
        Ok(self.slice(start, end - start))
    }

    /// First `min(n, len)` rows.
    pub fn head(&self, n: usize) -> Dataset {
        self.slice(0, n.min(self.len))
    }

    /// Last `min(n, len)` rows.
    pub fn tail(&self, n: usize) -> Dataset {
        let n = n.min(self.len);
        self.slice(self.len - n, n)
    }

    /// In-place Fisher-Yates shuffle, deterministic for a given seed.
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.shuffle_with_rng(&mut rng);
    }

    /// In-place Fisher-Yates shuffle driven by `rng`.
    pub fn shuffle_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.len <= 1 {
            return;
        }
        for i in (1..self.len).rev() {
            let j = rng.gen_range(0..=i);
            self.swap_rows(i, j);
        }
    }

    /// Draw two independent datasets of `size_a` and `size_b` rows.
    ///
    /// Rows come from a copy of the data, shuffled with `shuffle` when given; the
    /// first `size_a` rows go to the first dataset and the next `size_b` rows to
    /// the second. `self` is never modified.
    pub fn split(
        &self,
        size_a: usize,
        size_b: usize,
        shuffle: Option<u64>,
    ) -> Result<(Dataset, Dataset)> {
        let total = size_a
            .checked_add(size_b)
            .filter(|&t| t <= self.len)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "split sizes {size_a} + {size_b} exceed dataset length {}",
                    self.len
                ))
            })?;
        debug_assert!(total <= self.len);

        let source: Cow<'_, Dataset> = match shuffle {
            Some(seed) => {
                let mut copy = self.clone();
                copy.shuffle(seed);
                Cow::Owned(copy)
            }
            None => Cow::Borrowed(self),
        };

        Ok((source.slice(0, size_a), source.slice(size_a, size_b)))
    }

    /// Lazily yield batches of up to `batch_size` rows in the current order.
    pub fn batches(&self, batch_size: usize) -> Result<Batches<'_>> {
        Batches::new(Cow::Borrowed(self), batch_size)
    }

    /// Lazily yield batches of up to `batch_size` rows from a copy shuffled with `seed`.
    pub fn shuffled_batches(&self, batch_size: usize, seed: u64) -> Result<Batches<'static>> {
        let mut copy = self.clone();
        copy.shuffle(seed);
        Batches::new(Cow::Owned(copy), batch_size)
    }

    /// Per-column descriptive statistics (features first, then the label).
    pub fn summary(&self) -> Summary {
        let mut columns = Vec::with_capacity(self.feature_count + 1);
        if self.len == 0 {
            return Summary { columns };
        }

        for c in 0..self.feature_count {
            let values: Vec<f64> = (0..self.len).map(|r| self.row_at(r)[c]).collect();
            columns.push(ColumnSummary::from_values(format!("feature{c}"), values));
        }
        columns.push(ColumnSummary::from_values(
            "label".to_owned(),
            self.labels(),
        ));

        Summary { columns }
    }

    #[inline]
    pub(crate) fn row_at(&self, idx: usize) -> &[f64] {
        let start = idx * self.feature_count;
        &self.features[start..start + self.feature_count]
    }

    #[inline]
    pub(crate) fn label_at(&self, idx: usize) -> f64 {
        self.labels[idx]
    }

    #[inline]
    fn row_slot_mut(&mut self, idx: usize) -> &mut [f64] {
        let start = idx * self.feature_count;
        &mut self.features[start..start + self.feature_count]
    }

    #[inline]
    fn rows_flat(&self) -> &[f64] {
        &self.features[..self.len * self.feature_count]
    }

    fn resolve(&self, index: isize) -> Result<usize> {
        let len = self.len as isize;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(idx as usize)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.feature_count {
            return Err(Error::InvalidShape(format!(
                "row has {width} features, expected {}",
                self.feature_count
            )));
        }
        Ok(())
    }

    /// Copy of `count` rows starting at `start`; capacity equals `count`.
    fn slice(&self, start: usize, count: usize) -> Dataset {
        let fc = self.feature_count;
        Dataset {
            features: self.features[start * fc..(start + count) * fc].to_vec(),
            labels: self.labels[start..start + count].to_vec(),
            feature_count: fc,
            len: count,
        }
    }

    /// Ensure room for `additional` more rows, allocating exactly what is needed.
    fn reserve_exact(&mut self, additional: usize) {
        let required = self.len + additional;
        if required > self.capacity() {
            self.resize_capacity(required);
        }
    }

    /// Amortized growth: at least 1.5x the old capacity, and at least `min_required`.
    fn grow_to(&mut self, min_required: usize) {
        let cap = self.capacity();
        let grown = (cap + (cap >> 1)).max(cap + 1);
        self.resize_capacity(grown.max(min_required));
    }

    fn resize_capacity(&mut self, new_capacity: usize) {
        let fc = self.feature_count;
        self.features
            .reserve_exact(new_capacity * fc - self.features.len());
        self.features.resize(new_capacity * fc, 0.0);
        self.labels.reserve_exact(new_capacity - self.labels.len());
        self.labels.resize(new_capacity, 0.0);
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let fc = self.feature_count;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (left, right) = self.features.split_at_mut(hi * fc);
        left[lo * fc..(lo + 1) * fc].swap_with_slice(&mut right[..fc]);
        self.labels.swap(a, b);
    }
}

impl Clone for Dataset {
    /// Deep copy trimmed to the rows in use.
    fn clone(&self) -> Self {
        self.slice(0, self.len)
    }
}

impl PartialEq for Dataset {
    /// Same feature count, same length, and bit-identical rows and labels.
    fn eq(&self, other: &Self) -> bool {
        self.feature_count == other.feature_count
            && self.len == other.len
            && bits_eq(self.rows_flat(), other.rows_flat())
            && bits_eq(&self.labels[..self.len], &other.labels[..other.len])
    }
}

fn bits_eq(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape();
        writeln!(f, "Dataset({rows} rows, {cols} cols)")?;

        let preview = rows.min(PREVIEW_ROWS);
        for point in self.iter().take(preview) {
            f.write_str("[")?;
            for v in point.features {
                write!(f, "{v:?}, ")?;
            }
            writeln!(f, "label={:?}]", point.label)?;
        }
        if rows > preview {
            writeln!(f, "... ({} more rows)", rows - preview)?;
        }
        Ok(())
    }
}

/// Borrowing row iterator returned by [`Dataset::iter`].
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    data: &'a Dataset,
    next: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = DataPoint<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.data.len {
            return None;
        }
        let idx = self.next;
        self.next += 1;
        Some(DataPoint {
            features: self.data.row_at(idx),
            label: self.data.label_at(idx),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.data.len - self.next;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for Rows<'_> {}

impl<'a> IntoIterator for &'a Dataset {
    type Item = DataPoint<'a>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Single-pass batch iterator returned by [`Dataset::batches`] and
/// [`Dataset::shuffled_batches`].
#[derive(Debug)]
pub struct Batches<'a> {
    source: Cow<'a, Dataset>,
    batch_size: usize,
    cursor: usize,
}

impl<'a> Batches<'a> {
    fn new(source: Cow<'a, Dataset>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidArgument("batch size must be > 0".to_owned()));
        }
        Ok(Self {
            source,
            batch_size,
            cursor: 0,
        })
    }
}

impl Iterator for Batches<'_> {
    type Item = Dataset;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.source.len();
        if self.cursor >= len {
            return None;
        }
        let start = self.cursor;
        let count = self.batch_size.min(len - start);
        self.cursor += count;
        Some(self.source.slice(start, count))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.source.len() - self.cursor;
        let n = rest.div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches<'_> {}

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for fewer than 2 values.
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl ColumnSummary {
    fn from_values(name: String, mut values: Vec<f64>) -> Self {
        let count = values.len();
        let mean = mean(&values);
        let std = std_sample(&values, mean);
        values.sort_by(f64::total_cmp);

        Self {
            name,
            count,
            mean,
            std,
            min: values.first().copied().unwrap_or(f64::NAN),
            p25: percentile_sorted(&values, 0.25),
            p50: percentile_sorted(&values, 0.50),
            p75: percentile_sorted(&values, 0.75),
            max: values.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Result of [`Dataset::summary`]; `Display` renders an aligned table.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub columns: Vec<ColumnSummary>,
}

impl Summary {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_w = 8;
        let col_w = 14;

        if self.columns.is_empty() {
            return writeln!(f, "Empty Dataset (0 rows).");
        }

        write!(f, "{:<name_w$}", "")?;
        for c in &self.columns {
            write!(f, "{:>col_w$}", c.name)?;
        }
        writeln!(f)?;

        write!(f, "{:<name_w$}", "count")?;
        for c in &self.columns {
            write!(f, "{:>col_w$}", c.count)?;
        }
        writeln!(f)?;

        let stats: [(&str, fn(&ColumnSummary) -> f64); 7] = [
            ("mean", |c| c.mean),
            ("std", |c| c.std),
            ("min", |c| c.min),
            ("25%", |c| c.p25),
            ("50%", |c| c.p50),
            ("75%", |c| c.p75),
            ("max", |c| c.max),
        ];
        for (label, get) in stats {
            write!(f, "{label:<name_w$}")?;
            for c in &self.columns {
                write!(f, "{:>col_w$}", format_stat(get(c)))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn format_stat(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_owned();
    }
    if v == v.round() && v.abs() < 1e12 {
        return format!("{v:.0}");
    }
    let s = format!("{v:.6}");
    s.trim_end_matches('0').trim_end_matches('.').to_owned()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_sample(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let s2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (s2 / (n - 1) as f64).sqrt()
}

/// Linear interpolation between the closest ranks of sorted `values`.
fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => values[0],
        n => {
            let pos = p * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            if lower == upper {
                return values[lower];
            }
            let frac = pos - lower as f64;
            values[lower] + frac * (values[upper] - values[lower])
        }
    }
}
