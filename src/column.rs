use itertools::Itertools;
use serde_json::Value as MetaValue;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::array::TypedArray;
use crate::datatypes::ColumnType;
use crate::error::{Error, Result};
use crate::stats::{
    self, CorrelationKind, DefaultKernel, StatKey, StatValues, StatsCatalog, StatsKernel,
};

/// Key-value properties attached to a column.
pub type Metadata = serde_json::Map<String, MetaValue>;

pub const NAME_KEY: &str = "name";
pub const SIZE_KEY: &str = "size";
pub const DATATYPE_KEY: &str = "datatype";
pub const CATEGORICAL_KEY: &str = "categorical?";

/// Number of values shown when a column is displayed.
const PREVIEW_LEN: usize = 20;

/// What a [`Column`] can be built from.
#[derive(Debug)]
pub enum Backing {
    Array(TypedArray),
    Wrapped(Box<Column>),
}

impl From<TypedArray> for Backing {
    fn from(array: TypedArray) -> Self {
        Self::Array(array)
    }
}

impl From<Column> for Backing {
    fn from(column: Column) -> Self {
        Self::Wrapped(Box::new(column))
    }
}

/// An immutable, named column.
///
/// A `Column` pairs a typed array with metadata and a cache of computed
/// statistics. Methods that change any of them return a new `Column`; the
/// array and unchanged maps are shared, not copied.
#[derive(Clone, Debug)]
pub struct Column {
    backing: TypedArray,
    metadata: Arc<Metadata>,
    cache: Arc<StatValues>,
}

impl Column {
    #[must_use]
    pub fn new(backing: TypedArray) -> Self {
        Self {
            backing,
            metadata: Arc::new(Metadata::new()),
            cache: Arc::new(StatValues::new()),
        }
    }

    /// Wraps `backing` with the given metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if `backing` is already a `Column`.
    pub fn wrap<B: Into<Backing>>(backing: B, metadata: Metadata) -> Result<Self> {
        match backing.into() {
            Backing::Array(backing) => Ok(Self {
                backing,
                metadata: Arc::new(metadata),
                cache: Arc::new(StatValues::new()),
            }),
            Backing::Wrapped(_) => Err(Error::NestedColumn),
        }
    }

    /// The name in the metadata, or the array's own name if there is none.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata
            .get(NAME_KEY)
            .and_then(MetaValue::as_str)
            .unwrap_or_else(|| self.backing.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backing.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.backing.column_type()
    }

    #[must_use]
    pub fn array(&self) -> &TypedArray {
        &self.backing
    }

    /// Returns a column with `name`. The statistics cache is cleared.
    #[must_use]
    pub fn with_name(&self, name: &str) -> Self {
        self.merge_metadata([(NAME_KEY.to_string(), MetaValue::from(name))])
    }

    /// Returns a column whose stored metadata is replaced by `metadata`.
    #[must_use]
    pub fn with_metadata(&self, metadata: Metadata) -> Self {
        Self {
            backing: self.backing.clone(),
            metadata: Arc::new(metadata),
            cache: Arc::new(StatValues::new()),
        }
    }

    /// Returns a column with `entries` added to its stored metadata.
    #[must_use]
    pub fn merge_metadata<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, MetaValue)>,
    {
        let mut metadata = Arc::clone(&self.metadata);
        Arc::make_mut(&mut metadata).extend(entries);
        Self {
            backing: self.backing.clone(),
            metadata,
            cache: Arc::new(StatValues::new()),
        }
    }

    /// Returns a column with `entries` stored in its statistics cache.
    #[must_use]
    pub fn with_cache(&self, entries: StatValues) -> Self {
        let mut cache = Arc::clone(&self.cache);
        Arc::make_mut(&mut cache).extend(entries);
        Self {
            backing: self.backing.clone(),
            metadata: Arc::clone(&self.metadata),
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &StatValues {
        &self.cache
    }

    /// Returns the stored metadata together with the current `name`, `size`
    /// and `datatype`.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let mut metadata = (*self.metadata).clone();
        metadata.insert(NAME_KEY.to_string(), MetaValue::from(self.name()));
        metadata.insert(SIZE_KEY.to_string(), MetaValue::from(self.len()));
        metadata.insert(
            DATATYPE_KEY.to_string(),
            MetaValue::from(self.column_type().to_string()),
        );
        metadata
    }

    /// Whether the metadata marks this column as categorical.
    #[must_use]
    pub fn is_categorical(&self) -> bool {
        self.metadata
            .get(CATEGORICAL_KEY)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }

    /// Indices of missing values, in ascending order.
    #[must_use]
    pub fn missing(&self) -> Vec<usize> {
        self.backing.missing()
    }

    /// Computes the `requested` statistics, or every supported one if
    /// `requested` is empty.
    ///
    /// Cached values are returned as-is. The results are not stored; use
    /// [`Column::with_cache`] to keep them.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric statistic is requested for a
    /// non-numeric column.
    pub fn stats(&self, requested: &BTreeSet<StatKey>) -> Result<StatValues> {
        self.stats_with(requested, StatsCatalog::standard(), &DefaultKernel)
    }

    /// Same as [`Column::stats`] with an explicit catalog and kernel.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric statistic is requested for a
    /// non-numeric column, or if the kernel fails.
    pub fn stats_with(
        &self,
        requested: &BTreeSet<StatKey>,
        catalog: &StatsCatalog,
        kernel: &dyn StatsKernel,
    ) -> Result<StatValues> {
        let column_type = self.column_type();
        if !column_type.is_numeric() {
            if let Some(key) = requested.iter().find(|k| k.is_numeric()) {
                return Err(Error::UnsupportedOperation {
                    column: self.name().to_string(),
                    datatype: column_type.to_string(),
                    operation: key.to_string(),
                });
            }
        }

        let requested = if requested.is_empty() {
            catalog.supported(column_type)
        } else {
            requested
        };
        let (cached, uncached): (BTreeSet<StatKey>, BTreeSet<StatKey>) =
            requested.iter().partition(|k| self.cache.contains_key(*k));

        let mut result: StatValues = cached.into_iter().map(|k| (k, self.cache[&k])).collect();
        if !uncached.is_empty() {
            result.extend(kernel.compute(&self.backing, &uncached)?);
        }
        Ok(result)
    }

    /// Returns a column of the values at `indices`, in that order. Metadata
    /// is kept; the statistics cache is not.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        Ok(self.with_backing(self.backing.select(indices)?))
    }

    /// Returns a column of `len` values starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range exceeds the column.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        Ok(self.with_backing(self.backing.slice(offset, len)?))
    }

    /// Returns a column over a private copy of the values.
    ///
    /// # Errors
    ///
    /// Returns an error if the values cannot be copied.
    pub fn deep_copy(&self) -> Result<Self> {
        Ok(self.with_backing(self.backing.deep_copy()?))
    }

    /// # Errors
    ///
    /// Returns an error if the columns differ in length or are not numeric.
    pub fn correlation(&self, other: &Self, kind: CorrelationKind) -> Result<f64> {
        stats::correlation(&self.backing, &other.backing, kind)
    }

    fn with_backing(&self, backing: TypedArray) -> Self {
        Self {
            backing,
            metadata: Arc::clone(&self.metadata),
            cache: Arc::new(StatValues::new()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .backing
            .display_values(PREVIEW_LEN)
            .map_err(|_| fmt::Error)?;
        let ellipsis = if self.len() > PREVIEW_LEN { ", ..." } else { "" };
        writeln!(f, "#column<{}>[{}]", self.column_type(), self.len())?;
        writeln!(f, "{}", self.name())?;
        write!(f, "[{}{}]", values.iter().join(", "), ellipsis)
    }
}
