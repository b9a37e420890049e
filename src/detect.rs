//! Delimiter and column type detection from a sample of the input.
//!
//! Detection never consumes input: [`SampleReader`] keeps the sampled
//! prefix and replays it to later reads.

use std::io::{self, Read};

use crate::csv::sample_rows;
use crate::datatypes::{ColumnType, TypeRegistry};
use crate::error::Result;

/// Number of bytes sampled to detect the delimiter.
pub const DELIMITER_SAMPLE_LEN: usize = 200;
/// Default number of bytes sampled to detect column types.
pub const DEFAULT_AUTODETECT_MAX_BYTES: usize = 4096;
/// Delimiter used when none can be detected.
pub const DEFAULT_DELIMITER: u8 = b',';

/// A reader that can look ahead without consuming.
pub struct SampleReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
}

impl<R: Read> SampleReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Returns up to `max` bytes from the current position. The bytes are
    /// returned again by subsequent reads.
    ///
    /// Fewer than `max` bytes are returned only if the stream ends first.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying stream fails.
    pub fn sample(&mut self, max: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
        while self.buffer.len() < max {
            let start = self.buffer.len();
            self.buffer.resize(max, 0);
            match self.inner.read(&mut self.buffer[start..]) {
                Ok(0) => {
                    self.buffer.truncate(start);
                    break;
                }
                Ok(n) => self.buffer.truncate(start + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buffer.truncate(start),
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            }
        }
        let len = std::cmp::min(max, self.buffer.len());
        Ok(&self.buffer[..len])
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SampleReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buffer.len() {
            let n = (&self.buffer[self.pos..]).read(buf)?;
            self.pos += n;
            if self.pos == self.buffer.len() {
                self.buffer.clear();
                self.pos = 0;
            }
            Ok(n)
        } else {
            self.inner.read(buf)
        }
    }
}

/// Guesses the field delimiter of a CSV sample.
pub trait DelimiterSniffer {
    /// Returns the most likely delimiter, or `None` if no candidate fits.
    fn sniff(&self, sample: &[u8]) -> Option<u8>;
}

/// Picks the candidate that splits the sample's lines most uniformly.
#[derive(Clone, Debug)]
pub struct CandidateSniffer {
    candidates: Vec<u8>,
}

impl Default for CandidateSniffer {
    fn default() -> Self {
        Self {
            candidates: vec![b',', b'\t', b';', b'|'],
        }
    }
}

impl CandidateSniffer {
    /// Candidates earlier in `candidates` win ties.
    #[must_use]
    pub fn new(candidates: Vec<u8>) -> Self {
        Self { candidates }
    }
}

impl DelimiterSniffer for CandidateSniffer {
    fn sniff(&self, sample: &[u8]) -> Option<u8> {
        let mut lines: Vec<&[u8]> = sample
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .collect();
        // The last line is likely cut short unless it is the only one.
        if lines.len() > 1 && !sample.ends_with(b"\n") {
            lines.pop();
        }

        let mut best: Option<(u8, usize, usize)> = None;
        for &candidate in &self.candidates {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| count_unquoted(line, candidate))
                .collect();
            let Some(mode) = modal_count(&counts) else {
                continue;
            };
            let uniform = counts.iter().filter(|&&c| c == mode).count();
            let better = best.map_or(true, |(_, u, m)| (uniform, mode) > (u, m));
            if better {
                best = Some((candidate, uniform, mode));
            }
        }
        best.map(|(candidate, _, _)| candidate)
    }
}

fn count_unquoted(line: &[u8], delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for &b in line {
        if b == b'"' {
            quoted = !quoted;
        } else if b == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

/// The most frequent non-zero count; larger counts win ties.
fn modal_count(counts: &[usize]) -> Option<usize> {
    let mut sorted: Vec<usize> = counts.iter().copied().filter(|&c| c > 0).collect();
    sorted.sort_unstable();
    let mut best: Option<(usize, usize)> = None;
    for group in sorted.chunk_by(|a, b| a == b) {
        if best.map_or(true, |(n, _)| group.len() >= n) {
            best = Some((group.len(), group[0]));
        }
    }
    best.map(|(_, count)| count)
}

/// Decides a logical type tag for each column of sampled text rows.
pub trait TypeDetector: Send + Sync {
    /// Returns one tag (such as `int64` or `string`) per column, in column
    /// order.
    fn detect(&self, rows: &[Vec<String>]) -> Vec<String>;
}

impl<F> TypeDetector for F
where
    F: Fn(&[Vec<String>]) -> Vec<String> + Send + Sync,
{
    fn detect(&self, rows: &[Vec<String>]) -> Vec<String> {
        self(rows)
    }
}

/// Detects `int64`, `float64`, or `string` columns from their values.
/// Empty fields do not affect the result.
#[derive(Clone, Copy, Debug, Default)]
pub struct InferTypes;

impl TypeDetector for InferTypes {
    fn detect(&self, rows: &[Vec<String>]) -> Vec<String> {
        let num_columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..num_columns)
            .map(|i| {
                rows.iter()
                    .filter_map(|row| row.get(i))
                    .filter(|field| !field.is_empty())
                    .map(|field| infer_field_type(field))
                    .reduce(widen)
                    .unwrap_or(ColumnType::String)
                    .to_string()
            })
            .collect()
    }
}

/// Infers the data type of a field in a CSV record.
fn infer_field_type(field: &str) -> ColumnType {
    let field = field.trim();
    if field.parse::<i64>().is_ok() {
        ColumnType::Long
    } else if field.parse::<f64>().is_ok() {
        ColumnType::Double
    } else {
        ColumnType::String
    }
}

fn widen(a: ColumnType, b: ColumnType) -> ColumnType {
    match (a, b) {
        (x, y) if x == y => x,
        (ColumnType::String, _) | (_, ColumnType::String) => ColumnType::String,
        _ => ColumnType::Double,
    }
}

/// Detects the delimiter from the first [`DELIMITER_SAMPLE_LEN`] bytes.
///
/// # Errors
///
/// Returns an error if reading the sample fails.
pub fn detect_delimiter<R: Read>(
    reader: &mut SampleReader<R>,
    sniffer: &dyn DelimiterSniffer,
) -> Result<u8> {
    let sample = reader.sample(DELIMITER_SAMPLE_LEN)?;
    let delimiter = sniffer.sniff(sample).unwrap_or(DEFAULT_DELIMITER);
    log::debug!(
        "detected delimiter {:?} from {} bytes",
        char::from(delimiter),
        sample.len()
    );
    Ok(delimiter)
}

/// Detects column types from the first `max_bytes` bytes.
///
/// The header row, if any, is not passed to `detector`. A trailing row cut
/// off by the sample limit is ignored.
///
/// # Errors
///
/// Returns an error if reading the sample fails or `detector` returns a tag
/// unknown to `registry`.
pub fn detect_types<R: Read>(
    reader: &mut SampleReader<R>,
    delimiter: u8,
    header: bool,
    max_bytes: usize,
    detector: &dyn TypeDetector,
    registry: &TypeRegistry,
) -> Result<Vec<ColumnType>> {
    let sample = reader.sample(max_bytes)?;
    let num_read = sample.len();
    let rows = sample_rows(sample, delimiter);
    let data = if header && !rows.is_empty() {
        &rows[1..]
    } else {
        &rows[..]
    };
    let tags = detector.detect(data);
    let types = registry.resolve_all(&tags)?;
    log::debug!(
        "detected column types {:?} from {} rows in {} bytes",
        types,
        data.len(),
        num_read
    );
    Ok(types)
}
