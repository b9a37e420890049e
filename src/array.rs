//! Typed backing storage for columns.
//!
//! A [`TypedArray`] is a named Arrow array of one of the supported
//! [`ColumnType`]s. Arrays are immutable; new ones are produced with
//! [`ColumnBuilder`], which appends values and missing markers.

use arrow::array::{
    Array, ArrayBuilder, ArrayRef, AsArray, Float32Builder, Float64Builder, Int16Builder,
    Int32Builder, Int64Builder, PrimitiveArray, StringBuilder, UInt64Array,
};
use arrow::compute::{cast, concat, take, TakeOptions};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Float64Type, Int64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use std::sync::Arc;

use crate::datatypes::ColumnType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Text shown in place of a missing value.
pub const MISSING_TEXT: &str = "missing";

/// A named, typed, immutable array.
#[derive(Clone, Debug)]
pub struct TypedArray {
    name: String,
    column_type: ColumnType,
    array: ArrayRef,
}

impl TypedArray {
    /// Wraps an Arrow array.
    ///
    /// # Errors
    ///
    /// Returns an error if the array's data type has no [`ColumnType`].
    pub fn new(name: &str, array: ArrayRef) -> Result<Self> {
        let column_type = ColumnType::try_from(array.data_type())?;
        Ok(Self {
            name: name.to_string(),
            column_type,
            array,
        })
    }

    /// Converts a slice into a `TypedArray`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` is not a supported primitive type.
    pub fn try_from_slice<T>(name: &str, slice: &[T::Native]) -> Result<Self>
    where
        T: ArrowPrimitiveType,
    {
        let array: ArrayRef = Arc::new(PrimitiveArray::<T>::from_iter_values(
            slice.iter().copied(),
        ));
        Self::new(name, array)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: self.column_type,
            array: self.array.clone(),
        }
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    #[must_use]
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    #[must_use]
    pub fn is_missing(&self, index: usize) -> bool {
        self.array.is_null(index)
    }

    /// Returns the indices of missing values in ascending order.
    #[must_use]
    pub fn missing(&self) -> Vec<usize> {
        if self.array.null_count() == 0 {
            return Vec::new();
        }
        (0..self.len()).filter(|&i| self.array.is_null(i)).collect()
    }

    /// Gathers the values at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let indices = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));
        let array = take(
            self.array.as_ref(),
            &indices,
            Some(TakeOptions { check_bounds: true }),
        )?;
        Ok(self.replace_array(array))
    }

    /// Returns `len` values starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range exceeds the array.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(self.replace_array(self.array.slice(offset, len))),
            _ => Err(Error::InvalidArgument(format!(
                "range {}..{}+{} exceeds length {}",
                offset,
                offset,
                len,
                self.len()
            ))),
        }
    }

    /// Copies the underlying buffers so the result shares nothing with `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffers cannot be copied.
    pub fn deep_copy(&self) -> Result<Self> {
        let array = concat(&[self.array.as_ref()])?;
        Ok(self.replace_array(array))
    }

    /// Returns the values as `f64`, or `None` for string arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if the cast fails.
    pub fn f64_values(&self) -> Result<Option<Vec<Option<f64>>>> {
        if !self.column_type.is_numeric() {
            return Ok(None);
        }
        let array = cast(self.array.as_ref(), &DataType::Float64)?;
        Ok(Some(array.as_primitive::<Float64Type>().iter().collect()))
    }

    /// Returns the values as `i64`, or `None` unless the array holds
    /// integers.
    ///
    /// # Errors
    ///
    /// Returns an error if the cast fails.
    pub fn i64_values(&self) -> Result<Option<Vec<Option<i64>>>> {
        if !self.column_type.is_integer() {
            return Ok(None);
        }
        let array = cast(self.array.as_ref(), &DataType::Int64)?;
        Ok(Some(array.as_primitive::<Int64Type>().iter().collect()))
    }

    /// Returns the values as strings, or `None` for numeric arrays.
    #[must_use]
    pub fn str_values(&self) -> Option<Vec<Option<&str>>> {
        if self.column_type.is_numeric() {
            return None;
        }
        Some(self.array.as_string::<i32>().iter().collect())
    }

    /// Formats at most `limit` leading values.
    ///
    /// # Errors
    ///
    /// Returns an error if the array cannot be formatted.
    pub fn display_values(&self, limit: usize) -> Result<Vec<String>> {
        let options = FormatOptions::default().with_null(MISSING_TEXT);
        let formatter = ArrayFormatter::try_new(self.array.as_ref(), &options)?;
        Ok((0..self.len().min(limit))
            .map(|i| formatter.value(i).to_string())
            .collect())
    }

    fn replace_array(&self, array: ArrayRef) -> Self {
        Self {
            name: self.name.clone(),
            column_type: self.column_type,
            array,
        }
    }
}

/// The initial contents of a new column.
#[derive(Clone, Debug, PartialEq)]
pub enum Initial {
    Count(usize),
    Values(Vec<Value>),
}

enum Inner {
    Short(Int16Builder),
    Integer(Int32Builder),
    Long(Int64Builder),
    Float(Float32Builder),
    Double(Float64Builder),
    String(StringBuilder),
}

/// Appends values of a single type and produces a [`TypedArray`].
pub struct ColumnBuilder {
    name: String,
    column_type: ColumnType,
    inner: Inner,
}

impl ColumnBuilder {
    #[must_use]
    pub fn with_capacity(name: &str, column_type: ColumnType, capacity: usize) -> Self {
        let inner = match column_type {
            ColumnType::Short => Inner::Short(Int16Builder::with_capacity(capacity)),
            ColumnType::Integer => Inner::Integer(Int32Builder::with_capacity(capacity)),
            ColumnType::Long => Inner::Long(Int64Builder::with_capacity(capacity)),
            ColumnType::Float => Inner::Float(Float32Builder::with_capacity(capacity)),
            ColumnType::Double => Inner::Double(Float64Builder::with_capacity(capacity)),
            ColumnType::String => Inner::String(StringBuilder::with_capacity(capacity, 0)),
        };
        Self {
            name: name.to_string(),
            column_type,
            inner,
        }
    }

    /// Creates a builder for a new column.
    ///
    /// An `empty` column starts with no values and reserves room for
    /// `Initial::Count` elements. Otherwise `Initial::Count(n)` starts with
    /// `n` missing values and `Initial::Values` with the cast values.
    ///
    /// # Errors
    ///
    /// Returns an error if `empty` is set without an element count, or if a
    /// value cannot be cast to `column_type`.
    pub fn create(
        name: &str,
        column_type: ColumnType,
        initial: Initial,
        empty: bool,
    ) -> Result<Self> {
        match (initial, empty) {
            (Initial::Count(n), true) => Ok(Self::with_capacity(name, column_type, n)),
            (Initial::Count(n), false) => {
                let mut builder = Self::with_capacity(name, column_type, n);
                builder.append_missing(n);
                Ok(builder)
            }
            (Initial::Values(_), true) => Err(Error::MissingSizeArgument),
            (Initial::Values(values), false) => {
                let mut builder = Self::with_capacity(name, column_type, values.len());
                for v in &values {
                    builder.append(v)?;
                }
                Ok(builder)
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Short(b) => b.len(),
            Inner::Integer(b) => b.len(),
            Inner::Long(b) => b.len(),
            Inner::Float(b) => b.len(),
            Inner::Double(b) => b.len(),
            Inner::String(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `n` missing markers.
    pub fn append_missing(&mut self, n: usize) {
        for _ in 0..n {
            match &mut self.inner {
                Inner::Short(b) => b.append_null(),
                Inner::Integer(b) => b.append_null(),
                Inner::Long(b) => b.append_null(),
                Inner::Float(b) => b.append_null(),
                Inner::Double(b) => b.append_null(),
                Inner::String(b) => b.append_null(),
            }
        }
    }

    /// Appends `value` cast to this builder's type. `Value::Null` appends a
    /// missing marker.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be cast.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.append_missing(1);
            return Ok(());
        }
        let ok = match &mut self.inner {
            Inner::Short(b) => value.to_integer::<i16>().map(|v| b.append_value(v)),
            Inner::Integer(b) => value.to_integer::<i32>().map(|v| b.append_value(v)),
            Inner::Long(b) => value.to_integer::<i64>().map(|v| b.append_value(v)),
            Inner::Float(b) => value.to_f32().map(|v| b.append_value(v)),
            Inner::Double(b) => value.to_f64().map(|v| b.append_value(v)),
            Inner::String(b) => value.to_text().map(|v| b.append_value(v)),
        };
        ok.ok_or_else(|| self.cast_error(&value.to_string()))
    }

    /// Appends a raw text field. An empty field is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if `field` cannot be parsed as this builder's type.
    pub fn append_str(&mut self, field: &str) -> Result<()> {
        if field.is_empty() {
            self.append_missing(1);
            return Ok(());
        }
        let ok = match &mut self.inner {
            Inner::Short(b) => field.trim().parse::<i16>().map(|v| b.append_value(v)).is_ok(),
            Inner::Integer(b) => field.trim().parse::<i32>().map(|v| b.append_value(v)).is_ok(),
            Inner::Long(b) => field.trim().parse::<i64>().map(|v| b.append_value(v)).is_ok(),
            Inner::Float(b) => field.trim().parse::<f32>().map(|v| b.append_value(v)).is_ok(),
            Inner::Double(b) => field.trim().parse::<f64>().map(|v| b.append_value(v)).is_ok(),
            Inner::String(b) => {
                b.append_value(field);
                true
            }
        };
        if ok {
            Ok(())
        } else {
            Err(self.cast_error(field))
        }
    }

    #[must_use]
    pub fn finish(self) -> TypedArray {
        let array: ArrayRef = match self.inner {
            Inner::Short(mut b) => Arc::new(b.finish()),
            Inner::Integer(mut b) => Arc::new(b.finish()),
            Inner::Long(mut b) => Arc::new(b.finish()),
            Inner::Float(mut b) => Arc::new(b.finish()),
            Inner::Double(mut b) => Arc::new(b.finish()),
            Inner::String(mut b) => Arc::new(b.finish()),
        };
        TypedArray {
            name: self.name,
            column_type: self.column_type,
            array,
        }
    }

    fn cast_error(&self, value: &str) -> Error {
        Error::Cast {
            column: self.name.clone(),
            expected: self.column_type.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{Float64Type, Int32Type, Int64Type};

    #[test]
    fn typed_array_new() {
        let array: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None, Some("c")]));
        let typed = TypedArray::new("s", array).unwrap();
        assert_eq!(typed.name(), "s");
        assert_eq!(typed.column_type(), ColumnType::String);
        assert_eq!(typed.len(), 3);
        assert_eq!(typed.missing(), vec![1]);
        assert_eq!(
            typed.str_values(),
            Some(vec![Some("a"), None, Some("c")])
        );
    }

    #[test]
    fn unsupported_arrow_type() {
        let array: ArrayRef = Arc::new(arrow::array::UInt8Array::from(vec![1_u8]));
        assert!(matches!(
            TypedArray::new("u", array),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn select_and_slice() {
        let typed = TypedArray::try_from_slice::<Int64Type>("n", &[10, 20, 30, 40]).unwrap();
        let picked = typed.select(&[3, 0, 0]).unwrap();
        let values = picked.array().as_primitive::<Int64Type>();
        assert_eq!(values.values().to_vec(), vec![40, 10, 10]);
        assert!(typed.select(&[4]).is_err());

        let sliced = typed.slice(1, 2).unwrap();
        assert_eq!(sliced.f64_values().unwrap(), Some(vec![Some(20.0), Some(30.0)]));
        assert!(typed.slice(3, 2).is_err());
    }

    #[test]
    fn deep_copy_keeps_values() {
        let typed = TypedArray::try_from_slice::<Float64Type>("f", &[1.5, 2.5]).unwrap();
        let copy = typed.deep_copy().unwrap();
        assert_eq!(copy.f64_values().unwrap(), typed.f64_values().unwrap());
        assert_eq!(copy.name(), "f");
    }

    #[test]
    fn builder_appends_and_casts() {
        let mut builder = ColumnBuilder::with_capacity("i", ColumnType::Integer, 4);
        builder.append(&Value::Int(1)).unwrap();
        builder.append_missing(2);
        builder.append(&Value::from("4")).unwrap();
        builder.append(&Value::Null).unwrap();
        assert_eq!(builder.len(), 5);
        let typed = builder.finish();
        assert_eq!(typed.missing(), vec![1, 2, 4]);
        let values = typed.array().as_primitive::<Int32Type>();
        assert_eq!(values.value(0), 1);
        assert_eq!(values.value(3), 4);
    }

    #[test]
    fn builder_cast_error() {
        let mut builder = ColumnBuilder::with_capacity("s", ColumnType::Short, 1);
        let err = builder.append(&Value::from("abc")).unwrap_err();
        assert!(matches!(
            err,
            Error::Cast { ref column, ref expected, ref value }
                if column == "s" && expected == "int16" && value == "abc"
        ));
        assert!(builder.append(&Value::Int(1 << 20)).is_err());
        assert!(builder.append_str("1.5").is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn builder_text_fields() {
        let mut builder = ColumnBuilder::with_capacity("d", ColumnType::Double, 3);
        builder.append_str("1.25").unwrap();
        builder.append_str("").unwrap();
        builder.append_str(" 3 ").unwrap();
        let typed = builder.finish();
        assert_eq!(
            typed.f64_values().unwrap(),
            Some(vec![Some(1.25), None, Some(3.0)])
        );
    }

    #[test]
    fn create_empty_column() {
        let builder = ColumnBuilder::create("e", ColumnType::Long, Initial::Count(10), true).unwrap();
        assert_eq!(builder.len(), 0);

        let builder =
            ColumnBuilder::create("e", ColumnType::Long, Initial::Count(3), false).unwrap();
        assert_eq!(builder.finish().missing(), vec![0, 1, 2]);

        let builder = ColumnBuilder::create(
            "e",
            ColumnType::String,
            Initial::Values(vec![Value::Symbol("red".into()), Value::Int(2)]),
            false,
        )
        .unwrap();
        let typed = builder.finish();
        assert_eq!(typed.str_values(), Some(vec![Some("red"), Some("2")]));
    }

    #[test]
    fn create_empty_without_count() {
        assert!(matches!(
            ColumnBuilder::create(
                "e",
                ColumnType::Long,
                Initial::Values(vec![Value::Int(1)]),
                true
            ),
            Err(Error::MissingSizeArgument)
        ));
    }

    #[test]
    fn display_values_marks_missing() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
        let typed = TypedArray::new("n", array).unwrap();
        assert_eq!(
            typed.display_values(2).unwrap(),
            vec!["1".to_string(), MISSING_TEXT.to_string()]
        );
    }
}
