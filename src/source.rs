//! Loading datasets from CSV files and streams.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use crate::column::Column;
use crate::csv::Reader;
use crate::dataset::Dataset;
use crate::detect::{
    detect_delimiter, detect_types, CandidateSniffer, InferTypes, SampleReader, TypeDetector,
};
use crate::error::Result;
use crate::options::Options;

const GZIP_SUFFIX: &str = ".gz";

/// Loads a CSV dataset from `input`.
///
/// The delimiter is detected unless `options.separator` is set. Column
/// types come from `options.column_types`, or are detected with
/// `options.column_type_fn` (or [`InferTypes`] if that is not set either).
///
/// # Errors
///
/// Returns an error if reading fails, a detected type is unknown, or a
/// field cannot be parsed as its column's type.
pub fn load_reader<R: Read>(input: R, options: &Options) -> Result<Dataset> {
    let mut input = SampleReader::new(input);
    let delimiter = match options.separator_byte()? {
        Some(delimiter) => delimiter,
        None => detect_delimiter(&mut input, &CandidateSniffer::default())?,
    };
    let column_types = match &options.column_types {
        Some(column_types) => column_types.clone(),
        None => {
            let detector: Arc<dyn TypeDetector> = options
                .column_type_fn
                .clone()
                .unwrap_or_else(|| Arc::new(InferTypes));
            detect_types(
                &mut input,
                delimiter,
                options.header,
                options.autodetect_max_bytes,
                detector.as_ref(),
                &options.type_registry,
            )?
        }
    };

    let arrays = Reader::new(delimiter, options.header)
        .with_column_types(column_types)
        .read(&mut BufReader::new(input))?;
    let dataset = Dataset::from_columns(
        &options.table_name,
        arrays.into_iter().map(Column::new).collect(),
    );
    log::info!(
        "loaded {} with {} rows and {} columns",
        dataset.name(),
        dataset.num_rows(),
        dataset.num_columns()
    );
    Ok(dataset)
}

/// Loads a CSV dataset from a file. Files ending in `.gz` are decompressed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, or for any reason
/// [`load_reader`] fails.
pub fn load_path<P: AsRef<Path>>(path: P, options: &Options) -> Result<Dataset> {
    let path = path.as_ref();
    log::info!("loading {}", path.display());
    let file = File::open(path)?;
    if is_gzip(path) {
        load_reader(GzDecoder::new(file), options)
    } else {
        load_reader(file, options)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(GZIP_SUFFIX)
}
