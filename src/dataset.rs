use serde_json::Value as MetaValue;
use std::fmt;
use std::slice;

use crate::column::{Column, CATEGORICAL_KEY, NAME_KEY};
use crate::datatypes::ColumnType;

/// Name given to datasets that are not named explicitly.
pub const DEFAULT_TABLE_NAME: &str = "_unnamed";

/// A named collection of equal-length columns.
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    columns: Vec<Column>,
}

impl Dataset {
    /// Creates a `Dataset` from columns named by their own names. String
    /// columns are marked categorical.
    ///
    /// Column lengths are not reconciled; callers supply equal-length
    /// columns.
    #[must_use]
    pub fn from_columns(name: &str, columns: Vec<Column>) -> Self {
        let columns = columns
            .into_iter()
            .map(|column| {
                let mut entries = vec![(NAME_KEY.to_string(), MetaValue::from(column.name()))];
                if column.column_type() == ColumnType::String {
                    entries.push((CATEGORICAL_KEY.to_string(), MetaValue::Bool(true)));
                }
                column.merge_metadata(entries)
            })
            .collect();
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Creates a `Dataset` from `(name, column)` pairs. Each name replaces
    /// the column's own name.
    #[must_use]
    pub fn from_named<I>(name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, column)| column.with_name(&name))
            .collect();
        Self {
            name: name.to_string(),
            columns,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns an `Iterator` for columns.
    pub fn columns(&self) -> slice::Iter<Column> {
        self.columns.iter()
    }

    #[must_use]
    pub fn column(&self, i: usize) -> Option<&Column> {
        self.columns.get(i)
    }

    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of rows, which is zero if there are no columns.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} rows x {} columns]",
            self.name,
            self.num_rows(),
            self.num_columns()
        )?;
        for column in &self.columns {
            write!(f, "\n{}", column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::TypedArray;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::Int32Type;
    use std::sync::Arc;

    fn columns() -> Vec<Column> {
        let ints = TypedArray::try_from_slice::<Int32Type>("n", &[1, 2]).unwrap();
        let strings: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        vec![
            Column::new(ints),
            Column::new(TypedArray::new("s", strings).unwrap()),
        ]
    }

    #[test]
    fn empty_dataset() {
        let dataset = Dataset::from_columns(DEFAULT_TABLE_NAME, Vec::new());
        assert_eq!(dataset.num_columns(), 0);
        assert_eq!(dataset.num_rows(), 0);
        assert_eq!(dataset.name(), "_unnamed");
    }

    #[test]
    fn sequence_form() {
        let dataset = Dataset::from_columns("t", columns());
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.column_names(), vec!["n", "s"]);
        assert!(!dataset.column(0).unwrap().is_categorical());
        assert!(dataset.column_by_name("s").unwrap().is_categorical());
        assert_eq!(dataset.column(1).unwrap().metadata()[NAME_KEY], "s");
    }

    #[test]
    fn mapping_form_overrides_names() {
        let named = vec!["count".to_string(), "label".to_string()]
            .into_iter()
            .zip(columns());
        let dataset = Dataset::from_named("t", named);
        assert_eq!(dataset.column_names(), vec!["count", "label"]);
        assert_eq!(dataset.column(1).unwrap().array().name(), "s");
        assert!(dataset.column_by_name("s").is_none());
    }

    #[test]
    fn display() {
        let dataset = Dataset::from_columns("t", columns());
        assert_eq!(
            dataset.to_string(),
            "t [2 rows x 2 columns]\n#column<int32>[2]\nn\n[1, 2]\n#column<string>[2]\ns\n[a, b]"
        );
    }
}
