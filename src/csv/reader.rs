use csv_core::ReadRecordResult;
use std::io::BufRead;
use std::str;

use crate::array::{ColumnBuilder, TypedArray};
use crate::datatypes::ColumnType;
use crate::error::Result;

/// A single CSV record split into fields.
pub struct Record {
    fields: Vec<u8>,
    ends: Vec<usize>,
}

impl Record {
    /// Reads one record from the front of `input`.
    ///
    /// Returns the record and the number of bytes consumed, or `None` if
    /// `input` holds no more records. The end of `input` is treated as the
    /// end of the data.
    #[must_use]
    pub fn new(reader: &mut csv_core::Reader, input: &[u8]) -> Option<(Self, usize)> {
        let mut fields = vec![0; input.len().clamp(4, 1024)];
        let mut ends = vec![0; 16];
        let (mut cur, mut outlen, mut endlen) = (0, 0, 0);
        loop {
            let (res, nin, nout, nend) =
                reader.read_record(&input[cur..], &mut fields[outlen..], &mut ends[endlen..]);
            cur += nin;
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => fields.resize(fields.len() * 2, 0),
                ReadRecordResult::OutputEndsFull => ends.resize(ends.len() * 2, 0),
                ReadRecordResult::Record => {
                    fields.truncate(outlen);
                    ends.truncate(endlen);
                    return Some((Self { fields, ends }, cur));
                }
                ReadRecordResult::End => return None,
            }
        }
    }

    /// Reads one record from a buffered stream.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails.
    pub fn from_buf(reader: &mut csv_core::Reader, input: &mut dyn BufRead) -> Result<Option<Self>> {
        let mut fields = vec![0; 1024];
        let mut ends = vec![0; 16];
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let buf = input.fill_buf()?;
                reader.read_record(buf, &mut fields[outlen..], &mut ends[endlen..])
            };
            input.consume(nin);
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => fields.resize(fields.len() * 2, 0),
                ReadRecordResult::OutputEndsFull => ends.resize(ends.len() * 2, 0),
                ReadRecordResult::Record => {
                    fields.truncate(outlen);
                    ends.truncate(endlen);
                    return Ok(Some(Self { fields, ends }));
                }
                ReadRecordResult::End => return Ok(None),
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        let end = *self.ends.get(i)?;
        let start = match i.checked_sub(1).and_then(|i| self.ends.get(i)) {
            None => 0,
            Some(&start) => start,
        };
        Some(&self.fields[start..end])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    fn to_strings(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|i| self.get(i))
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }
}

fn new_reader(delimiter: u8) -> csv_core::Reader {
    csv_core::ReaderBuilder::new().delimiter(delimiter).build()
}

/// Splits a sample of CSV data into rows of text fields.
///
/// The sample may end in the middle of a row. If that last row is left
/// inside an open quoted field it is dropped; the other rows are kept.
#[must_use]
pub fn sample_rows(sample: &[u8], delimiter: u8) -> Vec<Vec<String>> {
    let mut reader = new_reader(delimiter);
    let mut rows = Vec::new();
    let mut cur = 0;
    while let Some((record, nin)) = Record::new(&mut reader, &sample[cur..]) {
        let raw = &sample[cur..cur + nin];
        cur += nin;
        if cur == sample.len() && ends_in_open_quote(raw, delimiter) {
            log::debug!("dropping incomplete sample row ({} bytes)", raw.len());
            break;
        }
        rows.push(record.to_strings());
        if cur == sample.len() {
            break;
        }
    }
    rows
}

/// Whether `raw` stops inside a quoted field. A terminator appended to a
/// complete row ends it; inside quotes it is read as field content.
fn ends_in_open_quote(raw: &[u8], delimiter: u8) -> bool {
    let mut input = Vec::with_capacity(raw.len() + 1);
    input.extend_from_slice(raw);
    input.push(b'\n');
    let mut fields = vec![0; input.len()];
    let mut ends = vec![0; input.len() + 1];
    let (res, ..) = new_reader(delimiter).read_record(&input, &mut fields, &mut ends);
    matches!(res, ReadRecordResult::InputEmpty)
}

/// CSV reader that builds one typed array per column.
#[derive(Clone, Debug)]
pub struct Reader {
    delimiter: u8,
    header: bool,
    column_types: Option<Vec<ColumnType>>,
}

impl Reader {
    #[must_use]
    pub fn new(delimiter: u8, header: bool) -> Self {
        Self {
            delimiter,
            header,
            column_types: None,
        }
    }

    /// Sets the type of each column. Columns without a type are strings.
    #[must_use]
    pub fn with_column_types(mut self, column_types: Vec<ColumnType>) -> Self {
        self.column_types = Some(column_types);
        self
    }

    /// Reads every record in `input`.
    ///
    /// Columns are named by the header row, or `column-<i>` without one.
    /// Empty and absent fields are missing; fields beyond the last column
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a field cannot be parsed as its
    /// column's type.
    pub fn read(&self, input: &mut dyn BufRead) -> Result<Vec<TypedArray>> {
        let mut reader = new_reader(self.delimiter);
        let Some(first) = Record::from_buf(&mut reader, input)? else {
            return Ok(Vec::new());
        };
        let types = self.column_types.as_deref().unwrap_or_default();
        let num_columns = std::cmp::max(first.len(), types.len());

        let names: Vec<String> = (0..num_columns)
            .map(|i| match first.get(i) {
                Some(name) if self.header => String::from_utf8_lossy(name).into_owned(),
                _ => format!("column-{}", i),
            })
            .collect();
        let mut builders: Vec<ColumnBuilder> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column_type = types.get(i).copied().unwrap_or(ColumnType::String);
                ColumnBuilder::with_capacity(name, column_type, 0)
            })
            .collect();

        if !self.header {
            append_record(&mut builders, &first)?;
        }
        while let Some(record) = Record::from_buf(&mut reader, input)? {
            append_record(&mut builders, &record)?;
        }
        Ok(builders.into_iter().map(ColumnBuilder::finish).collect())
    }
}

fn append_record(builders: &mut [ColumnBuilder], record: &Record) -> Result<()> {
    for (i, builder) in builders.iter_mut().enumerate() {
        match record.get(i) {
            Some(field) => builder.append_str(str::from_utf8(field)?)?,
            None => builder.append_missing(1),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::BufReader;

    #[test]
    fn record_fields() {
        let mut reader = new_reader(b',');
        let input = b"Cat,50,\"a,b\"\nDog";
        let (record, nin) = Record::new(&mut reader, input).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get(0), Some(&b"Cat"[..]));
        assert_eq!(record.get(2), Some(&b"a,b"[..]));
        assert_eq!(record.get(3), None);

        let (record, _) = Record::new(&mut reader, &input[nin..]).unwrap();
        assert_eq!(record.to_strings(), vec!["Dog".to_string()]);
    }

    #[test]
    fn sample_keeps_complete_rows() {
        let rows = sample_rows(b"a;b\n1;2\n3;4", b';');
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ]
        );
    }

    #[test]
    fn sample_drops_unterminated_quote() {
        let rows = sample_rows(b"a,b\n1,\"x\"\n2,\"unfinis", b',');
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["1".to_string(), "x".to_string()]);
    }

    #[test]
    fn sample_quote_state_follows_parser() {
        let rows = sample_rows(b"a,b\nx\"y,\"unfinished", b',');
        assert_eq!(rows, vec![vec!["a".to_string(), "b".to_string()]]);

        let rows = sample_rows(b"a,b\nx\"y,z", b',');
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["x\"y".to_string(), "z".to_string()]);

        let rows = sample_rows(b"a\n\"q\"\"\"", b',');
        assert_eq!(rows[1], vec!["q\"".to_string()]);
    }

    #[test]
    fn sample_with_many_rows_and_wide_fields() {
        let wide = "w".repeat(5000);
        let mut sample = format!("id,text\n0,{}\n", wide);
        for i in 1..20_000 {
            sample.push_str(&format!("{},t\n", i));
        }
        let rows = sample_rows(sample.as_bytes(), b',');
        assert_eq!(rows.len(), 20_001);
        assert_eq!(rows[1][1], wide);
        assert_eq!(rows[20_000], vec!["19999".to_string(), "t".to_string()]);
    }

    #[test]
    fn sample_of_nothing() {
        assert!(sample_rows(b"", b',').is_empty());
    }

    #[test]
    fn read_typed_columns() {
        let data = "name,age,score\nCat,5,1.5\nDog,,2\n";
        let mut input = BufReader::new(data.as_bytes());
        let arrays = Reader::new(b',', true)
            .with_column_types(vec![
                ColumnType::String,
                ColumnType::Integer,
                ColumnType::Double,
            ])
            .read(&mut input)
            .unwrap();
        assert_eq!(arrays.len(), 3);
        assert_eq!(arrays[0].name(), "name");
        assert_eq!(arrays[1].column_type(), ColumnType::Integer);
        assert_eq!(arrays[1].missing(), vec![1]);
        assert_eq!(
            arrays[2].f64_values().unwrap(),
            Some(vec![Some(1.5), Some(2.0)])
        );
    }

    #[test]
    fn read_without_header() {
        let mut input = BufReader::new("1\t2\n3\n".as_bytes());
        let arrays = Reader::new(b'\t', false).read(&mut input).unwrap();
        assert_eq!(arrays[0].name(), "column-0");
        assert_eq!(arrays[1].name(), "column-1");
        assert_eq!(arrays[0].len(), 2);
        assert_eq!(arrays[1].missing(), vec![1]);
    }

    #[test]
    fn read_bad_field() {
        let mut input = BufReader::new("n\n1\nx\n".as_bytes());
        let result = Reader::new(b',', true)
            .with_column_types(vec![ColumnType::Long])
            .read(&mut input);
        assert!(matches!(result, Err(Error::Cast { ref value, .. }) if value == "x"));
    }
}
