use serde::{Deserialize, Serialize};
use statistical::{mean, median, standard_deviation, variance};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::array::TypedArray;
use crate::datatypes::ColumnType;
use crate::error::{Error, Result};

/// A statistic that can be computed for a column.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StatKey {
    /// Number of non-missing values.
    Count,
    Missing,
    /// Number of distinct non-missing values.
    Unique,
    Min,
    Max,
    Sum,
    Mean,
    Median,
    Variance,
    StandardDeviation,
    Skew,
}

impl StatKey {
    /// Whether computing this statistic requires numeric values.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Count | Self::Missing | Self::Unique)
    }
}

pub type StatValues = BTreeMap<StatKey, f64>;

/// The statistics available for each kind of column.
#[derive(Clone, Debug)]
pub struct StatsCatalog {
    general: BTreeSet<StatKey>,
    numeric: BTreeSet<StatKey>,
}

impl StatsCatalog {
    /// Creates a catalog offering `keys`. Numeric-only keys are offered to
    /// numeric columns only.
    #[must_use]
    pub fn new<I: IntoIterator<Item = StatKey>>(keys: I) -> Self {
        let numeric: BTreeSet<StatKey> = keys.into_iter().collect();
        let general = numeric.iter().copied().filter(|k| !k.is_numeric()).collect();
        Self { general, numeric }
    }

    /// The catalog of every [`StatKey`], built once.
    #[must_use]
    pub fn standard() -> &'static Self {
        static STANDARD: OnceLock<StatsCatalog> = OnceLock::new();
        STANDARD.get_or_init(|| Self::new(StatKey::iter()))
    }

    #[must_use]
    pub fn supported(&self, column_type: ColumnType) -> &BTreeSet<StatKey> {
        if column_type.is_numeric() {
            &self.numeric
        } else {
            &self.general
        }
    }
}

/// Computes statistics over a typed array.
pub trait StatsKernel {
    /// Computes every key in `keys` in a single pass over `array`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric statistic is requested for a
    /// non-numeric array.
    fn compute(&self, array: &TypedArray, keys: &BTreeSet<StatKey>) -> Result<StatValues>;
}

/// The built-in statistics kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKernel;

impl StatsKernel for DefaultKernel {
    fn compute(&self, array: &TypedArray, keys: &BTreeSet<StatKey>) -> Result<StatValues> {
        let mut result = StatValues::new();
        let missing = array.missing().len();
        #[allow(clippy::cast_precision_loss)]
        let count = (array.len() - missing) as f64;
        let values = array.f64_values()?.map(|v| v.into_iter().flatten().collect::<Vec<_>>());

        for &key in keys {
            let value = match (key, &values) {
                (StatKey::Count, _) => count,
                #[allow(clippy::cast_precision_loss)]
                (StatKey::Missing, _) => missing as f64,
                (StatKey::Unique, _) => unique(array)?,
                (_, Some(values)) => numeric_stat(key, values),
                (_, None) => return Err(unsupported(array, &key.to_string())),
            };
            result.insert(key, value);
        }
        Ok(result)
    }
}

#[allow(clippy::cast_precision_loss)]
fn unique(array: &TypedArray) -> Result<f64> {
    let n = if let Some(values) = array.str_values() {
        values.into_iter().flatten().collect::<HashSet<_>>().len()
    } else if let Some(values) = array.i64_values()? {
        values.into_iter().flatten().collect::<HashSet<_>>().len()
    } else {
        array
            .f64_values()?
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(float_key)
            .collect::<HashSet<_>>()
            .len()
    };
    Ok(n as f64)
}

/// Bit pattern of `v` with zeros and NaNs folded to one value each.
fn float_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

#[allow(clippy::cast_precision_loss)]
fn numeric_stat(key: StatKey, values: &[f64]) -> f64 {
    let n = values.len();
    match key {
        StatKey::Min => find_min_max(values.iter()).map_or(f64::NAN, |m| m.min),
        StatKey::Max => find_min_max(values.iter()).map_or(f64::NAN, |m| m.max),
        StatKey::Sum => values.iter().sum(),
        StatKey::Mean if n > 0 => mean(values),
        StatKey::Median if n > 0 => median(values),
        StatKey::Variance if n > 1 => variance(values, None),
        StatKey::StandardDeviation if n > 1 => standard_deviation(values, None),
        StatKey::Skew if n > 2 => {
            let m = mean(values);
            let sd = standard_deviation(values, Some(m));
            let n = n as f64;
            let cubes: f64 = values.iter().map(|v| ((v - m) / sd).powi(3)).sum();
            n / ((n - 1.0) * (n - 2.0)) * cubes
        }
        _ => f64::NAN,
    }
}

struct MinMax<T> {
    min: T,
    max: T,
}

/// Returns the minimum and maximum values.
fn find_min_max<'a, I>(mut iter: I) -> Option<MinMax<f64>>
where
    I: Iterator<Item = &'a f64>,
{
    let mut min = *iter.next()?;
    let mut max = min;

    for &v in iter {
        if min > v {
            min = v;
        } else if max < v {
            max = v;
        }
    }
    Some(MinMax { min, max })
}

/// The kind of correlation coefficient to compute.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CorrelationKind {
    Pearson,
    Spearman,
    Kendall,
}

/// Computes the correlation between two numeric arrays of equal length.
/// Rows missing in either array are skipped.
///
/// # Errors
///
/// Returns an error if the lengths differ or either array is not numeric.
pub fn correlation(x: &TypedArray, y: &TypedArray, kind: CorrelationKind) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::InvalidArgument(format!(
            "cannot correlate {} ({} rows) with {} ({} rows)",
            x.name(),
            x.len(),
            y.name(),
            y.len()
        )));
    }
    let operation = format!("{} correlation", kind);
    let xs = x.f64_values()?.ok_or_else(|| unsupported(x, &operation))?;
    let ys = y.f64_values()?.ok_or_else(|| unsupported(y, &operation))?;
    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .into_iter()
        .zip(ys)
        .filter_map(|pair| match pair {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        })
        .unzip();

    Ok(match kind {
        CorrelationKind::Pearson => pearson(&xs, &ys),
        CorrelationKind::Spearman => pearson(&ranks(&xs), &ranks(&ys)),
        CorrelationKind::Kendall => kendall(&xs, &ys),
    })
}

fn unsupported(array: &TypedArray, operation: &str) -> Error {
    Error::UnsupportedOperation {
        column: array.name().to_string(),
        datatype: array.column_type().to_string(),
        operation: operation.to_string(),
    }
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    cov / (vx * vy).sqrt()
}

/// Ranks starting at 1; ties get the average of their ranks.
#[allow(clippy::cast_precision_loss)]
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Kendall's tau-b.
#[allow(clippy::cast_precision_loss)]
fn kendall(xs: &[f64], ys: &[f64]) -> f64 {
    let (mut concordant, mut discordant, mut tie_x, mut tie_y) = (0_i64, 0_i64, 0_i64, 0_i64);
    for i in 0..xs.len() {
        for j in i + 1..xs.len() {
            let dx = xs[i] - xs[j];
            let dy = ys[i] - ys[j];
            if dx == 0.0 && dy == 0.0 {
                continue;
            } else if dx == 0.0 {
                tie_x += 1;
            } else if dy == 0.0 {
                tie_y += 1;
            } else if (dx > 0.0) == (dy > 0.0) {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }
    let n0 = (concordant + discordant + tie_x) as f64;
    let n1 = (concordant + discordant + tie_y) as f64;
    (concordant - discordant) as f64 / (n0 * n1).sqrt()
}
