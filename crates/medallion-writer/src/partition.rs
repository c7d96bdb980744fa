//! Partition key derivation and row grouping.
//!
//! A [`PartitionSpec`] is resolved once from the configured column names.
//! `date` and `hour` are derived from the table's `timestamp` column; any
//! other name must already exist in the table. Rows are grouped by their
//! [`PartitionKey`], the ordered `column=value` segments of the directory the
//! rows are written to.

use crate::error::{Result, WriterError};
use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, StringArray, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::{
    DataType, Field, Schema, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType,
};
use arrow::util::display::array_value_to_string;
use chrono::{DateTime, Utc};
use medallion_core::field_names::{DATE, HOUR, TIMESTAMP};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory value used for null partition values.
pub const NULL_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Where a partition column's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSource {
    /// `YYYY-MM-DD` of the row's timestamp
    Date,
    /// Zero-padded hour of day of the row's timestamp
    Hour,
    /// An existing table column
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionColumn {
    pub name: String,
    pub source: PartitionSource,
}

/// Ordered partition columns, resolved at writer construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    columns: Vec<PartitionColumn>,
}

impl PartitionSpec {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns: Vec<PartitionColumn> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(WriterError::invalid_config(
                    "partition column names must not be empty",
                ));
            }
            if columns.iter().any(|c| c.name == name) {
                return Err(WriterError::invalid_config(format!(
                    "partition column '{}' listed more than once",
                    name
                )));
            }
            let source = match name {
                DATE => PartitionSource::Date,
                HOUR => PartitionSource::Hour,
                _ => PartitionSource::Column,
            };
            columns.push(PartitionColumn {
                name: name.to_string(),
                source,
            });
        }

        if columns.is_empty() {
            return Err(WriterError::invalid_config(
                "partitioning is enabled but no partition columns are configured",
            ));
        }

        Ok(Self { columns })
    }

    /// `date` then `hour`.
    pub fn date_hour() -> Self {
        Self {
            columns: vec![
                PartitionColumn {
                    name: DATE.to_string(),
                    source: PartitionSource::Date,
                },
                PartitionColumn {
                    name: HOUR.to_string(),
                    source: PartitionSource::Hour,
                },
            ],
        }
    }

    pub fn columns(&self) -> &[PartitionColumn] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    fn derived(&self) -> impl Iterator<Item = &PartitionColumn> {
        self.columns
            .iter()
            .filter(|c| c.source != PartitionSource::Column)
    }
}

/// Ordered `(column, value)` pairs identifying one partition directory.
///
/// Values are already formatted for use in a path, so two keys are equal
/// exactly when their rows belong in the same directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    segments: Vec<(String, String)>,
}

impl PartitionKey {
    /// The implicit partition: files go directly under the output root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn segments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// `{root}/{col1}={val1}/{col2}={val2}/...`
    pub fn directory(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for (column, value) in &self.segments {
            path.push(format!("{}={}", column, value));
        }
        path
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        for (i, (column, value)) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}={}", column, value)?;
        }
        Ok(())
    }
}

/// The rows of one partition, partition columns still attached.
#[derive(Debug, Clone)]
pub struct PartitionSlice {
    pub key: PartitionKey,
    pub batch: RecordBatch,
}

/// Append derived `date`/`hour` columns.
///
/// Returns `None` when `date`/`hour` are requested but the table has no
/// `timestamp` column; the caller then treats the table as a single partition.
pub fn annotate(batch: &RecordBatch, spec: &PartitionSpec) -> Result<Option<RecordBatch>> {
    let derived: Vec<&PartitionColumn> = spec.derived().collect();
    if derived.is_empty() {
        return Ok(Some(batch.clone()));
    }

    let Some(ts_column) = batch.column_by_name(TIMESTAMP) else {
        return Ok(None);
    };
    let timestamps = utc_timestamps(ts_column)?;

    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len() + derived.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        // Derived columns replace stale copies of themselves.
        if derived.iter().any(|d| d.name == *field.name()) {
            continue;
        }
        fields.push(Arc::clone(field));
        columns.push(Arc::clone(column));
    }

    for column in derived {
        let format = match column.source {
            PartitionSource::Date => "%Y-%m-%d",
            _ => "%H",
        };
        let values: StringArray = timestamps
            .iter()
            .map(|ts| Some(ts.format(format).to_string()))
            .collect();
        fields.push(Arc::new(Field::new(&column.name, DataType::Utf8, false)));
        columns.push(Arc::new(values));
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(schema, columns)
        .map(Some)
        .map_err(|e| WriterError::partition(format!("failed to append partition columns: {}", e)))
}

/// Split `batch` into per-partition slices in key order.
///
/// With no spec, or when annotation falls back to the implicit partition,
/// the whole batch comes back as a single slice keyed by [`PartitionKey::root`].
pub fn split_partitions(
    batch: &RecordBatch,
    spec: Option<&PartitionSpec>,
) -> Result<Vec<PartitionSlice>> {
    let implicit = || {
        vec![PartitionSlice {
            key: PartitionKey::root(),
            batch: batch.clone(),
        }]
    };

    let Some(spec) = spec else {
        return Ok(implicit());
    };
    let Some(annotated) = annotate(batch, spec)? else {
        tracing::warn!(
            step = "partitioning",
            rows = batch.num_rows(),
            "No timestamp column; writing table as a single partition"
        );
        return Ok(implicit());
    };

    let key_columns = spec
        .columns()
        .iter()
        .map(|c| {
            annotated
                .column_by_name(&c.name)
                .map(|array| (c.name.as_str(), array))
                .ok_or_else(|| {
                    WriterError::partition(format!(
                        "partition column '{}' not found in table",
                        c.name
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<PartitionKey, Vec<u32>> = BTreeMap::new();
    for row in 0..annotated.num_rows() {
        let segments = key_columns
            .iter()
            .map(|(name, array)| Ok((name.to_string(), format_value(name, array, row)?)))
            .collect::<Result<Vec<_>>>()?;
        let index = u32::try_from(row)
            .map_err(|_| WriterError::partition("batch too large to partition"))?;
        groups
            .entry(PartitionKey { segments })
            .or_default()
            .push(index);
    }

    if groups.len() == 1 {
        let (key, _) = groups.into_iter().next().unwrap_or_default();
        return Ok(vec![PartitionSlice {
            key,
            batch: annotated,
        }]);
    }

    groups
        .into_iter()
        .map(|(key, rows)| {
            let indices = UInt32Array::from(rows);
            let batch = take_record_batch(&annotated, &indices).map_err(|e| {
                WriterError::partition(format!("failed to gather rows for {}: {}", key, e))
            })?;
            Ok(PartitionSlice { key, batch })
        })
        .collect()
}

/// Remove partition columns; their values live in the directory path.
pub fn strip_partition_columns(batch: &RecordBatch, spec: &PartitionSpec) -> Result<RecordBatch> {
    let schema = batch.schema();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !spec.names().any(|name| name == f.name().as_str()))
        .map(|(i, _)| i)
        .collect();

    batch
        .project(&keep)
        .map_err(|e| WriterError::partition(format!("failed to drop partition columns: {}", e)))
}

/// Format one value for a `column=value` path segment.
///
/// Digit-only values are zero-padded to two characters; everything else is
/// Hive-escaped so a value can never escape its directory.
fn format_value(column: &str, array: &ArrayRef, row: usize) -> Result<String> {
    if array.is_null(row) {
        return Ok(NULL_PARTITION_VALUE.to_string());
    }

    let raw = array_value_to_string(array, row).map_err(|e| {
        WriterError::partition(format!(
            "cannot format partition column '{}' row {}: {}",
            column, row, e
        ))
    })?;

    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("{:0>2}", raw));
    }

    Ok(escape_path_value(&raw))
}

/// Percent-encode the characters Hive escapes in partition directory names.
pub fn escape_path_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        let needs_escape = matches!(
            c,
            '\u{01}'..='\u{1F}'
                | '\u{7F}'
                | '"'
                | '#'
                | '%'
                | '\''
                | '*'
                | '/'
                | ':'
                | '='
                | '?'
                | '\\'
                | '{'
                | '['
                | ']'
                | '^'
        );
        if needs_escape {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Read a timestamp column as UTC instants. Nulls are rejected.
fn utc_timestamps(array: &ArrayRef) -> Result<Vec<DateTime<Utc>>> {
    let values: Vec<Option<DateTime<Utc>>> = match array.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => array
            .as_primitive::<TimestampSecondType>()
            .iter()
            .map(|v| v.and_then(|s| DateTime::from_timestamp(s, 0)))
            .collect(),
        DataType::Timestamp(TimeUnit::Millisecond, _) => array
            .as_primitive::<TimestampMillisecondType>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_millis))
            .collect(),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_primitive::<TimestampMicrosecondType>()
            .iter()
            .map(|v| v.and_then(DateTime::from_timestamp_micros))
            .collect(),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => array
            .as_primitive::<TimestampNanosecondType>()
            .iter()
            .map(|v| v.map(DateTime::from_timestamp_nanos))
            .collect(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let parsed = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))
                .map_err(|e| {
                    WriterError::partition(format!("cannot parse '{}' values: {}", TIMESTAMP, e))
                })?;
            return utc_timestamps(&parsed);
        }
        other => {
            return Err(WriterError::partition(format!(
                "column '{}' has unsupported type {}",
                TIMESTAMP, other
            )))
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(row, ts)| {
            ts.ok_or_else(|| {
                WriterError::partition(format!(
                    "row {} has a null or out-of-range '{}'",
                    row, TIMESTAMP
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, TimestampMicrosecondArray};
    use chrono::TimeZone;

    fn micros(h: u32, m: u32) -> i64 {
        Utc.with_ymd_and_hms(2025, 1, 27, h, m, 0)
            .unwrap()
            .timestamp_micros()
    }

    fn batch(timestamps: Vec<i64>) -> RecordBatch {
        let n = timestamps.len() as i64;
        let schema = Arc::new(Schema::new(vec![
            Field::new(
                TIMESTAMP,
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("velocity", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
                Arc::new(Int64Array::from_iter_values(0..n)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_spec_resolution() {
        let spec = PartitionSpec::new(["date", "hour", "vin"]).unwrap();
        let sources: Vec<_> = spec.columns().iter().map(|c| c.source).collect();
        assert_eq!(
            sources,
            vec![
                PartitionSource::Date,
                PartitionSource::Hour,
                PartitionSource::Column
            ]
        );
        assert_eq!(PartitionSpec::new(["date", "hour"]).unwrap(), PartitionSpec::date_hour());
    }

    #[test]
    fn test_spec_rejects_empty_and_duplicates() {
        assert!(PartitionSpec::new(Vec::<String>::new()).is_err());
        assert!(PartitionSpec::new(["date", "date"]).is_err());
        assert!(PartitionSpec::new([""]).is_err());
    }

    #[test]
    fn test_annotate_derives_date_and_hour() {
        let annotated = annotate(&batch(vec![micros(9, 5)]), &PartitionSpec::date_hour())
            .unwrap()
            .unwrap();
        let date = annotated.column_by_name(DATE).unwrap().as_string::<i32>();
        let hour = annotated.column_by_name(HOUR).unwrap().as_string::<i32>();
        assert_eq!(date.value(0), "2025-01-27");
        assert_eq!(hour.value(0), "09");
    }

    #[test]
    fn test_split_groups_rows_by_hour() {
        let slices = split_partitions(
            &batch(vec![micros(10, 0), micros(11, 30), micros(10, 59)]),
            Some(&PartitionSpec::date_hour()),
        )
        .unwrap();

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].key.to_string(), "date=2025-01-27/hour=10");
        assert_eq!(slices[0].batch.num_rows(), 2);
        assert_eq!(slices[1].key.get(HOUR), Some("11"));
        assert_eq!(slices[1].batch.num_rows(), 1);
    }

    #[test]
    fn test_missing_timestamp_means_single_partition() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
        let no_ts = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))])
            .unwrap();
        let slices = split_partitions(&no_ts, Some(&PartitionSpec::date_hour())).unwrap();
        assert_eq!(slices.len(), 1);
        assert!(slices[0].key.is_root());
    }

    #[test]
    fn test_custom_column_must_exist() {
        let spec = PartitionSpec::new(["vin"]).unwrap();
        let err = split_partitions(&batch(vec![micros(1, 0)]), Some(&spec)).unwrap_err();
        assert!(err.to_string().contains("partition column 'vin' not found"));
    }

    #[test]
    fn test_numeric_values_are_zero_padded() {
        let spec = PartitionSpec::new(["velocity"]).unwrap();
        let slices = split_partitions(&batch(vec![micros(1, 0), micros(2, 0)]), Some(&spec))
            .unwrap();
        let keys: Vec<_> = slices.iter().map(|s| s.key.to_string()).collect();
        assert_eq!(keys, vec!["velocity=00", "velocity=01"]);
    }

    #[test]
    fn test_values_cannot_escape_directory() {
        let array: ArrayRef = Arc::new(StringArray::from(vec![Some("../a/b"), None]));
        assert_eq!(format_value("x", &array, 0).unwrap(), "..%2Fa%2Fb");
        assert_eq!(format_value("x", &array, 1).unwrap(), NULL_PARTITION_VALUE);
    }

    #[test]
    fn test_escaped_values_stay_distinct() {
        let array: ArrayRef = Arc::new(StringArray::from(vec!["a/b", "a_b", "a%2Fb", "k=v"]));
        let formatted: Vec<_> = (0..array.len())
            .map(|row| format_value("x", &array, row).unwrap())
            .collect();
        assert_eq!(formatted, vec!["a%2Fb", "a_b", "a%252Fb", "k%3Dv"]);
        assert_eq!(escape_path_value("2025-01-27"), "2025-01-27");
        assert_eq!(escape_path_value("a\\b"), "a%5Cb");
    }

    #[test]
    fn test_string_timestamps_are_parsed() {
        let schema = Arc::new(Schema::new(vec![Field::new(TIMESTAMP, DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["2025-01-27T23:10:00Z"]))],
        )
        .unwrap();
        let slices = split_partitions(&batch, Some(&PartitionSpec::date_hour())).unwrap();
        assert_eq!(slices[0].key.to_string(), "date=2025-01-27/hour=23");
    }

    #[test]
    fn test_null_timestamp_is_partition_error() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            TIMESTAMP,
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(TimestampMicrosecondArray::from(vec![None, Some(0)]))],
        )
        .unwrap();
        let err = split_partitions(&batch, Some(&PartitionSpec::date_hour())).unwrap_err();
        assert!(matches!(err, WriterError::Partition { .. }));
    }

    #[test]
    fn test_strip_partition_columns() {
        let annotated = annotate(&batch(vec![micros(3, 0)]), &PartitionSpec::date_hour())
            .unwrap()
            .unwrap();
        let stripped = strip_partition_columns(&annotated, &PartitionSpec::date_hour()).unwrap();
        let names: Vec<_> = stripped
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec![TIMESTAMP.to_string(), "velocity".to_string()]);
    }

    #[test]
    fn test_key_directory() {
        let slices = split_partitions(&batch(vec![micros(7, 0)]), Some(&PartitionSpec::date_hour()))
            .unwrap();
        assert_eq!(
            slices[0].key.directory(Path::new("/out")),
            PathBuf::from("/out/date=2025-01-27/hour=07")
        );
    }
}
