use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("a column cannot wrap another column")]
    NestedColumn,
    #[error("column {column} of type {datatype} does not support {operation}")]
    UnsupportedOperation {
        column: String,
        datatype: String,
        operation: String,
    },
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("cannot cast {value} to {expected} in column {column}")]
    Cast {
        column: String,
        expected: String,
        value: String,
    },
    #[error("an empty column requires an element count")]
    MissingSizeArgument,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("array error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("parse error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
