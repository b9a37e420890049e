use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::dataset::DEFAULT_TABLE_NAME;
use crate::datatypes::{ColumnDefinition, ColumnType, TypeRegistry};
use crate::detect::{TypeDetector, DEFAULT_AUTODETECT_MAX_BYTES};
use crate::error::{Error, Result};

/// Default number of records scanned to infer a record-sequence schema.
pub const DEFAULT_SCAN_DEPTH: usize = 100;

/// Options for loading a dataset.
///
/// Every field has a default, so a JSON configuration only needs the keys
/// it changes.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Whether the first CSV row holds column names.
    #[serde(rename = "header?")]
    pub header: bool,
    /// The CSV field delimiter; detected if not set.
    pub separator: Option<char>,
    /// Column types for CSV input; skips type detection.
    pub column_types: Option<Vec<ColumnType>>,
    /// Type detection for CSV input and record-sequence schema scans.
    #[serde(skip)]
    pub column_type_fn: Option<Arc<dyn TypeDetector>>,
    pub autodetect_max_bytes: usize,
    /// Number of leading records scanned to infer a record-sequence schema.
    pub scan_depth: usize,
    /// Record-sequence schema; skips scanning.
    pub column_definitions: Option<Vec<ColumnDefinition>>,
    pub table_name: String,
    #[serde(skip)]
    pub type_registry: TypeRegistry,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            header: true,
            separator: None,
            column_types: None,
            column_type_fn: None,
            autodetect_max_bytes: DEFAULT_AUTODETECT_MAX_BYTES,
            scan_depth: DEFAULT_SCAN_DEPTH,
            column_definitions: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            type_registry: TypeRegistry::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("header", &self.header)
            .field("separator", &self.separator)
            .field("column_types", &self.column_types)
            .field("column_type_fn", &self.column_type_fn.is_some())
            .field("autodetect_max_bytes", &self.autodetect_max_bytes)
            .field("scan_depth", &self.scan_depth)
            .field("column_definitions", &self.column_definitions)
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl Options {
    /// Parses options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid options object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    #[must_use]
    pub fn with_column_types(mut self, column_types: Vec<ColumnType>) -> Self {
        self.column_types = Some(column_types);
        self
    }

    #[must_use]
    pub fn with_column_type_fn<D: TypeDetector + 'static>(mut self, detector: D) -> Self {
        self.column_type_fn = Some(Arc::new(detector));
        self
    }

    #[must_use]
    pub fn with_autodetect_max_bytes(mut self, max_bytes: usize) -> Self {
        self.autodetect_max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn with_scan_depth(mut self, scan_depth: usize) -> Self {
        self.scan_depth = scan_depth;
        self
    }

    #[must_use]
    pub fn with_column_definitions(mut self, definitions: Vec<ColumnDefinition>) -> Self {
        self.column_definitions = Some(definitions);
        self
    }

    #[must_use]
    pub fn with_table_name(mut self, name: &str) -> Self {
        self.table_name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_type_registry(mut self, registry: TypeRegistry) -> Self {
        self.type_registry = registry;
        self
    }

    /// The separator as a byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the separator is not an ASCII character.
    pub fn separator_byte(&self) -> Result<Option<u8>> {
        match self.separator {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(Error::InvalidArgument(format!(
                "separator {:?} is not an ASCII character",
                c
            ))),
        }
    }
}
