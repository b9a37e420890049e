pub mod array;
mod column;
pub mod csv;
mod dataset;
mod datatypes;
pub mod detect;
mod error;
mod options;
pub mod record;
mod source;
mod stats;
mod value;

pub use arrow;
pub use column::{Backing, Column, Metadata, CATEGORICAL_KEY, DATATYPE_KEY, NAME_KEY, SIZE_KEY};
pub use dataset::{Dataset, DEFAULT_TABLE_NAME};
pub use datatypes::{ColumnDefinition, ColumnType, TypeRegistry, KEYWORD_TAG};
pub use error::{Error, Result};
pub use options::{Options, DEFAULT_SCAN_DEPTH};
pub use record::records_to_dataset;
pub use source::{load_path, load_reader};
pub use stats::{
    correlation, CorrelationKind, DefaultKernel, StatKey, StatValues, StatsCatalog, StatsKernel,
};
pub use value::Value;
