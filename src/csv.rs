//! An interface to CSV (comma-separated values).

pub(crate) mod reader;

pub use reader::{sample_rows, Reader, Record};
