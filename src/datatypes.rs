use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// Logical tag for symbol-valued columns; stored as strings.
pub const KEYWORD_TAG: &str = "keyword";

/// The storage type of a column.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum ColumnType {
    #[serde(rename = "int16")]
    #[strum(serialize = "int16")]
    Short,
    #[serde(rename = "int32")]
    #[strum(serialize = "int32")]
    Integer,
    #[serde(rename = "int64")]
    #[strum(serialize = "int64")]
    Long,
    #[serde(rename = "float32")]
    #[strum(serialize = "float32")]
    Float,
    #[serde(rename = "float64")]
    #[strum(serialize = "float64")]
    Double,
    #[serde(rename = "string", alias = "keyword")]
    #[strum(serialize = "string")]
    String,
}

impl ColumnType {
    /// Maps a logical type tag (`int16`, `float64`, `string`, ...) to its
    /// storage type.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not a known logical type.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::from_str(tag).map_err(|_| Error::UnknownType(tag.to_string()))
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::String)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Short | Self::Integer | Self::Long)
    }
}

impl From<ColumnType> for DataType {
    fn from(ct: ColumnType) -> Self {
        match ct {
            ColumnType::Short => Self::Int16,
            ColumnType::Integer => Self::Int32,
            ColumnType::Long => Self::Int64,
            ColumnType::Float => Self::Float32,
            ColumnType::Double => Self::Float64,
            ColumnType::String => Self::Utf8,
        }
    }
}

impl TryFrom<&DataType> for ColumnType {
    type Error = Error;

    fn try_from(dt: &DataType) -> Result<Self> {
        match dt {
            DataType::Int16 => Ok(Self::Short),
            DataType::Int32 => Ok(Self::Integer),
            DataType::Int64 => Ok(Self::Long),
            DataType::Float32 => Ok(Self::Float),
            DataType::Float64 => Ok(Self::Double),
            DataType::Utf8 => Ok(Self::String),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }
}

/// Lookup table from logical type tags to storage types.
///
/// Starts with the built-in tags and accepts additional ones at runtime.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    tags: HashMap<String, ColumnType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut tags: HashMap<String, ColumnType> =
            ColumnType::iter().map(|ct| (ct.to_string(), ct)).collect();
        tags.insert(KEYWORD_TAG.to_string(), ColumnType::String);
        Self { tags }
    }
}

impl TypeRegistry {
    /// Registers `tag` as another name for `column_type`, replacing any
    /// previous mapping of the same tag.
    pub fn register(&mut self, tag: &str, column_type: ColumnType) -> &mut Self {
        self.tags.insert(tag.to_string(), column_type);
        self
    }

    /// # Errors
    ///
    /// Returns an error if `tag` has not been registered.
    pub fn resolve(&self, tag: &str) -> Result<ColumnType> {
        self.tags
            .get(tag)
            .copied()
            .ok_or_else(|| Error::UnknownType(tag.to_string()))
    }

    /// Resolves one tag per column, in column order.
    ///
    /// # Errors
    ///
    /// Returns an error on the first unregistered tag.
    pub fn resolve_all<S: AsRef<str>>(&self, tags: &[S]) -> Result<Vec<ColumnType>> {
        tags.iter().map(|t| self.resolve(t.as_ref())).collect()
    }
}

/// The name and type of an output column, known before any data.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub datatype: ColumnType,
}

impl ColumnDefinition {
    #[must_use]
    pub fn new(name: &str, datatype: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
        }
    }

    /// Creates a definition from a logical type tag. `keyword` columns are
    /// stored as strings.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is not a known logical type.
    pub fn with_tag(name: &str, tag: &str) -> Result<Self> {
        let tag = if tag == KEYWORD_TAG { "string" } else { tag };
        Ok(Self::new(name, ColumnType::from_tag(tag)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_tag_maps_to_one_type() {
        let answers = [
            ("int16", ColumnType::Short, DataType::Int16),
            ("int32", ColumnType::Integer, DataType::Int32),
            ("int64", ColumnType::Long, DataType::Int64),
            ("float32", ColumnType::Float, DataType::Float32),
            ("float64", ColumnType::Double, DataType::Float64),
            ("string", ColumnType::String, DataType::Utf8),
        ];
        let registry = TypeRegistry::default();
        for (tag, ct, dt) in answers {
            assert_eq!(ColumnType::from_tag(tag).unwrap(), ct);
            assert_eq!(registry.resolve(tag).unwrap(), ct);
            assert_eq!(DataType::from(ct), dt);
            assert_eq!(ColumnType::try_from(&dt).unwrap(), ct);
            assert_eq!(ct.to_string(), tag);
        }
    }

    #[test]
    fn unknown_tag() {
        assert!(matches!(
            ColumnType::from_tag("decimal"),
            Err(Error::UnknownType(t)) if t == "decimal"
        ));
        assert!(matches!(
            TypeRegistry::default().resolve("uint8"),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn registered_tag() {
        let mut registry = TypeRegistry::default();
        assert_eq!(registry.resolve("keyword").unwrap(), ColumnType::String);
        registry.register("text", ColumnType::String);
        assert_eq!(registry.resolve("text").unwrap(), ColumnType::String);
        assert_eq!(
            registry.resolve_all(&["int64", "text"]).unwrap(),
            vec![ColumnType::Long, ColumnType::String]
        );
    }

    #[test]
    fn keyword_definition_is_string() {
        let def = ColumnDefinition::with_tag("kind", "keyword").unwrap();
        assert_eq!(def.datatype, ColumnType::String);
        let def: ColumnDefinition =
            serde_json::from_str(r#"{"name":"kind","datatype":"keyword"}"#).unwrap();
        assert_eq!(def.datatype, ColumnType::String);
    }
}
