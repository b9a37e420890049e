//! Assembling a dataset from a sequence of loosely-typed records.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::array::{ColumnBuilder, Initial};
use crate::column::Column;
use crate::dataset::Dataset;
use crate::datatypes::ColumnDefinition;
use crate::detect::{InferTypes, TypeDetector};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::value::Value;

/// A record: field names mapped to values. Fields may be absent.
pub type Record = BTreeMap<String, Value>;

/// Converts a JSON array of objects into records.
///
/// # Errors
///
/// Returns an error if `json` is not an array of objects.
pub fn from_json(json: serde_json::Value) -> Result<Vec<Record>> {
    let serde_json::Value::Array(items) = json else {
        return Err(Error::InvalidArgument(
            "expected an array of objects".to_string(),
        ));
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(fields) => Ok(fields
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect()),
            other => Err(Error::InvalidArgument(format!(
                "expected an object, found {}",
                other
            ))),
        })
        .collect()
}

/// Builds a dataset with one column per field.
///
/// The columns are `options.column_definitions` if given; otherwise they are
/// inferred from the first `options.scan_depth` records. Fields that are
/// not among the columns are ignored. Every record is one row, and a field
/// absent from a record is missing in that row.
///
/// # Errors
///
/// Returns an error if a value cannot be cast to its column's type, or if
/// type detection yields an unknown type.
pub fn records_to_dataset<I>(records: I, options: &Options) -> Result<Dataset>
where
    I: IntoIterator<Item = Record>,
{
    let mut records = records.into_iter();
    let (definitions, scanned) = match &options.column_definitions {
        Some(definitions) => (definitions.clone(), Vec::new()),
        None => {
            let scanned: Vec<Record> = records.by_ref().take(options.scan_depth).collect();
            let detector: &dyn TypeDetector = match &options.column_type_fn {
                Some(detector) => detector.as_ref(),
                None => &InferTypes,
            };
            let definitions = infer_definitions(&scanned, detector, options)?;
            (definitions, scanned)
        }
    };
    log::debug!("record columns: {:?}", definitions);

    let mut builders = definitions
        .iter()
        .map(|d| ColumnBuilder::create(&d.name, d.datatype, Initial::Count(0), true))
        .collect::<Result<Vec<_>>>()?;
    let positions: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();
    let mut ignored = HashSet::new();

    let mut num_rows = 0;
    for (row, record) in scanned.into_iter().chain(records).enumerate() {
        for (field, value) in &record {
            let Some(&i) = positions.get(field.as_str()) else {
                if ignored.insert(field.clone()) {
                    log::warn!("ignoring field {:?} not in the column schema", field);
                }
                continue;
            };
            let builder = &mut builders[i];
            builder.append_missing(row - builder.len());
            builder.append(value)?;
        }
        num_rows = row + 1;
    }

    for builder in &mut builders {
        let len = builder.len();
        builder.append_missing(num_rows - len);
    }
    let columns = builders
        .into_iter()
        .map(|b| (b.name().to_string(), Column::new(b.finish())));
    Ok(Dataset::from_named(&options.table_name, columns))
}

/// Names columns in order of first appearance and types them with
/// `detector` applied to the scanned values as text.
fn infer_definitions(
    scanned: &[Record],
    detector: &dyn TypeDetector,
    options: &Options,
) -> Result<Vec<ColumnDefinition>> {
    let mut names: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for record in scanned {
        for name in record.keys() {
            if seen.insert(name.as_str()) {
                names.push(name);
            }
        }
    }
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<String>> = scanned
        .iter()
        .map(|record| {
            names
                .iter()
                .map(|&name| {
                    record
                        .get(name)
                        .and_then(Value::to_sample_text)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    let tags = detector.detect(&rows);
    if tags.len() != names.len() {
        return Err(Error::InvalidArgument(format!(
            "type detection returned {} types for {} columns",
            tags.len(),
            names.len()
        )));
    }
    let types = options.type_registry.resolve_all(&tags)?;
    Ok(names
        .into_iter()
        .zip(types)
        .map(|(name, datatype)| ColumnDefinition::new(name, datatype))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::ColumnType;
    use arrow::array::AsArray;
    use arrow::datatypes::Int64Type;

    fn record(fields: Vec<(&str, Value)>) -> Record {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn strings(column: &Column) -> Vec<Option<String>> {
        column
            .array()
            .str_values()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn rows_are_aligned() {
        let records = vec![
            record(vec![("a", Value::Int(1))]),
            record(vec![("a", Value::Int(2)), ("b", Value::from("x"))]),
            record(vec![("a", Value::Int(3))]),
        ];
        let dataset = records_to_dataset(records, &Options::default()).unwrap();
        assert_eq!(dataset.num_rows(), 3);
        assert_eq!(dataset.column_names(), vec!["a", "b"]);

        let a = dataset.column_by_name("a").unwrap();
        assert_eq!(a.column_type(), ColumnType::Long);
        let values = a.array().array().as_primitive::<Int64Type>();
        assert_eq!(values.values().to_vec(), vec![1, 2, 3]);
        assert!(a.missing().is_empty());

        let b = dataset.column_by_name("b").unwrap();
        assert_eq!(b.len(), 3);
        assert_eq!(strings(b), vec![None, Some("x".to_string()), None]);
    }

    #[test]
    fn no_records() {
        let dataset = records_to_dataset(Vec::new(), &Options::default()).unwrap();
        assert_eq!(dataset.num_columns(), 0);
        assert_eq!(dataset.num_rows(), 0);

        let options = Options::default()
            .with_column_definitions(vec![ColumnDefinition::new("a", ColumnType::Short)]);
        let dataset = records_to_dataset(Vec::new(), &options).unwrap();
        assert_eq!(dataset.num_columns(), 1);
        assert_eq!(dataset.num_rows(), 0);
    }

    #[test]
    fn explicit_definitions() {
        let options = Options::default()
            .with_table_name("t")
            .with_column_definitions(vec![
                ColumnDefinition::new("n", ColumnType::Double),
                ColumnDefinition::with_tag("kind", "keyword").unwrap(),
            ]);
        let records = vec![
            record(vec![("kind", Value::Symbol("red".into())), ("extra", Value::Int(1))]),
            record(vec![("n", Value::Int(2)), ("kind", Value::Null)]),
            record(vec![]),
        ];
        let dataset = records_to_dataset(records, &options).unwrap();
        assert_eq!(dataset.name(), "t");
        assert_eq!(dataset.num_rows(), 3);
        assert!(dataset.column_by_name("extra").is_none());

        let n = dataset.column_by_name("n").unwrap();
        assert_eq!(
            n.array().f64_values().unwrap(),
            Some(vec![None, Some(2.0), None])
        );
        let kind = dataset.column_by_name("kind").unwrap();
        assert_eq!(strings(kind), vec![Some("red".to_string()), None, None]);
    }

    #[test]
    fn late_fields_are_ignored() {
        let options = Options::default().with_scan_depth(1);
        let records = vec![
            record(vec![("a", Value::Int(1))]),
            record(vec![("a", Value::Int(2)), ("late", Value::Int(9))]),
        ];
        let dataset = records_to_dataset(records, &options).unwrap();
        assert_eq!(dataset.column_names(), vec!["a"]);
        assert_eq!(dataset.num_rows(), 2);
    }

    #[test]
    fn cast_failure_propagates() {
        let options = Options::default()
            .with_column_definitions(vec![ColumnDefinition::new("n", ColumnType::Integer)]);
        let records = vec![
            record(vec![("n", Value::Int(1))]),
            record(vec![("n", Value::Symbol("oops".into()))]),
        ];
        let result = records_to_dataset(records, &options);
        assert!(matches!(
            result,
            Err(Error::Cast { ref column, ref expected, .. })
                if column == "n" && expected == "int32"
        ));
    }

    #[test]
    fn custom_detector() {
        let options = Options::default()
            .with_column_type_fn(|rows: &[Vec<String>]| -> Vec<String> {
                rows.first()
                    .map(|r| r.iter().map(|_| "keyword".to_string()).collect())
                    .unwrap_or_default()
            });
        let records = vec![record(vec![("k", Value::Symbol("on".into())), ("v", Value::Int(1))])];
        let dataset = records_to_dataset(records, &options).unwrap();
        assert_eq!(dataset.column_by_name("k").unwrap().column_type(), ColumnType::String);
        assert_eq!(strings(dataset.column_by_name("v").unwrap()), vec![Some("1".to_string())]);
    }

    #[test]
    fn detector_shape_mismatch() {
        let options =
            Options::default().with_column_type_fn(|_: &[Vec<String>]| Vec::<String>::new());
        let records = vec![record(vec![("a", Value::Int(1))])];
        assert!(matches!(
            records_to_dataset(records, &options),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn integral_floats_stay_floats() {
        let records = from_json(serde_json::json!([{"x": 1.0}, {"x": 2.0}, {"x": 2.5}])).unwrap();
        let dataset =
            records_to_dataset(records.clone(), &Options::default().with_scan_depth(2)).unwrap();
        let x = dataset.column_by_name("x").unwrap();
        assert_eq!(x.column_type(), ColumnType::Double);
        assert_eq!(
            x.array().f64_values().unwrap(),
            Some(vec![Some(1.0), Some(2.0), Some(2.5)])
        );

        let dataset = records_to_dataset(records.into_iter().take(2), &Options::default()).unwrap();
        assert_eq!(
            dataset.column_by_name("x").unwrap().column_type(),
            ColumnType::Double
        );
    }

    #[test]
    fn no_records_with_fixed_detector() {
        let options = Options::default()
            .with_column_type_fn(|_: &[Vec<String>]| vec!["int64".to_string()]);
        let dataset = records_to_dataset(Vec::new(), &options).unwrap();
        assert_eq!(dataset.num_columns(), 0);
        assert_eq!(dataset.num_rows(), 0);
    }

    #[test]
    fn json_records() {
        let json = serde_json::json!([{"a": 1, "b": "x"}, {"a": 2.5}]);
        let records = from_json(json).unwrap();
        let dataset = records_to_dataset(records, &Options::default()).unwrap();
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(
            dataset.column_by_name("a").unwrap().column_type(),
            ColumnType::Double
        );
        assert!(from_json(serde_json::json!({"a": 1})).is_err());
        assert!(from_json(serde_json::json!([1])).is_err());
    }
}
