// End-to-end write scenarios against a real filesystem.

use arrow::array::{AsArray, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit, TimestampMicrosecondType};
use chrono::{DateTime, Utc};
use medallion_core::schema::bronze::vehicle_message_raw;
use medallion_core::RawRecord;
use medallion_writer::{
    Batch, ParquetWriter, WriteStatistics, WriteTarget, WriterConfig, WriterError,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn message(i: usize, timestamp: &str) -> RawRecord {
    json!({
        "vin": format!("1HGCM82633A{:06}", i),
        "manufacturer": "Honda",
        "model": "Accord",
        "gearPosition": "D",
        "velocity": i % 120,
        "timestamp": timestamp,
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn bronze_writer(root: &Path) -> ParquetWriter {
    ParquetWriter::new(WriterConfig::new(root).with_schema(vehicle_message_raw())).unwrap()
}

/// Every file under `dir`, recursively, sorted.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !dir.exists() {
        return files;
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn read_file(path: &Path) -> Vec<RecordBatch> {
    ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
        .unwrap()
        .build()
        .unwrap()
        .map(|b| b.unwrap())
        .collect()
}

fn row_count(path: &Path) -> usize {
    read_file(path).iter().map(|b| b.num_rows()).sum()
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/")
}

#[test]
fn test_same_hour_lands_in_one_partition() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        message(1, "2025-01-27T10:00:00Z"),
        message(2, "2025-01-27T10:59:00Z"),
    ];

    let stats = bronze_writer(dir.path()).write(records).unwrap();

    assert_eq!(stats.rows_written, 2);
    assert_eq!(stats.files_written, 1);
    assert_eq!(stats.partitions_written, 1);
    let files = files_under(dir.path());
    assert_eq!(
        files
            .iter()
            .map(|f| relative(dir.path(), f))
            .collect::<Vec<_>>(),
        vec!["date=2025-01-27/hour=10/data.parquet"]
    );
    assert_eq!(row_count(&files[0]), 2);
}

#[test]
fn test_two_hours_land_in_two_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        message(1, "2025-01-27T10:15:00Z"),
        message(2, "2025-01-27T11:15:00Z"),
    ];

    let stats = bronze_writer(dir.path()).write(records).unwrap();

    assert_eq!(stats.partitions_written, 2);
    assert_eq!(stats.files_written, 2);
    let files = files_under(dir.path());
    let names: Vec<_> = files.iter().map(|f| relative(dir.path(), f)).collect();
    assert_eq!(
        names,
        vec![
            "date=2025-01-27/hour=10/data.parquet",
            "date=2025-01-27/hour=11/data.parquet"
        ]
    );
    assert!(files.iter().all(|f| row_count(f) == 1));
}

#[test]
fn test_single_file_mode_writes_exact_path() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let target = out.join("report.parquet");
    let records: Vec<_> = (0..5)
        .map(|i| message(i, &format!("2025-01-27T{:02}:00:00Z", i)))
        .collect();

    let stats = bronze_writer(dir.path())
        .write_to(records, &WriteTarget::File(target.clone()))
        .unwrap();

    assert_eq!(stats.rows_written, 5);
    assert_eq!(stats.files_written, 1);
    assert_eq!(stats.partitions_written, 1);
    assert_eq!(files_under(dir.path()), vec![target.clone()]);
    assert!(!out.join("data.parquet").exists());
    assert_eq!(row_count(&target), 5);
}

#[test]
fn test_tiny_size_limit_splits_into_parts() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..1000)
        .map(|i| message(i, &format!("2025-01-27T10:{:02}:00Z", i % 60)))
        .collect();
    let writer = ParquetWriter::new(
        WriterConfig::new(dir.path())
            .with_schema(vehicle_message_raw())
            .with_max_file_size_mb(0.001),
    )
    .unwrap();

    let stats = writer.write(records).unwrap();

    let files = files_under(dir.path());
    assert!(files.len() > 1);
    assert_eq!(stats.files_written, files.len());
    assert_eq!(stats.partitions_written, 1);
    for (i, file) in files.iter().enumerate() {
        assert_eq!(
            relative(dir.path(), file),
            format!("date=2025-01-27/hour=10/part_{:03}.parquet", i)
        );
    }
    let total: usize = files.iter().map(|f| row_count(f)).sum();
    assert_eq!(total, 1000);
    assert_eq!(stats.rows_written, 1000);
}

#[test]
fn test_fixed_row_estimate_controls_chunk_count() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..100)
        .map(|i| message(i, "2025-01-27T10:00:00Z"))
        .collect();
    // 100 rows * 10 KiB = ~0.98 MB over a 0.25 MB limit -> 4 chunks of 25 rows
    let writer = ParquetWriter::new(
        WriterConfig::new(dir.path())
            .with_schema(vehicle_message_raw())
            .with_max_file_size_mb(0.25)
            .with_estimated_row_bytes(10.0 * 1024.0),
    )
    .unwrap();

    let stats = writer.write(records).unwrap();

    assert_eq!(stats.files_written, 4);
    assert!(stats.files.iter().all(|f| f.rows == 25));
}

#[test]
fn test_invalid_record_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bronze");
    let mut broken = message(2, "2025-01-27T10:00:00Z");
    broken.remove("timestamp");
    let records = vec![message(1, "2025-01-27T10:00:00Z"), broken];

    let err = bronze_writer(&root).write(records).unwrap_err();

    assert!(matches!(err, WriterError::Validation { failed: 1, .. }));
    assert!(err.to_string().contains("Record 1: timestamp: field required"));
    assert!(!root.exists());
}

#[test]
fn test_empty_input_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bronze");
    let writer = bronze_writer(&root);

    let from_records = writer.write(Vec::<RawRecord>::new()).unwrap();
    let schema = vehicle_message_raw();
    let empty_table = RecordBatch::new_empty(medallion_core::RecordValidator::arrow_schema(
        schema.as_ref(),
    ));
    let from_table = writer
        .write_to(empty_table, &WriteTarget::File(root.join("x.parquet")))
        .unwrap();

    for stats in [from_records, from_table] {
        assert_eq!(stats.rows_written, 0);
        assert_eq!(stats.files_written, 0);
        assert_eq!(stats.partitions_written, 0);
    }
    assert!(!root.exists());
}

#[test]
fn test_records_require_a_schema() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetWriter::new(WriterConfig::new(dir.path())).unwrap();

    let err = writer
        .write(vec![message(1, "2025-01-27T10:00:00Z")])
        .unwrap_err();

    assert!(matches!(err, WriterError::InvalidConfig { .. }));
    assert!(files_under(dir.path()).is_empty());
}

#[test]
fn test_partition_purity() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..48)
        .map(|i| {
            message(
                i,
                &format!("2025-01-{:02}T{:02}:30:00Z", 27 + i / 24, i % 24),
            )
        })
        .collect();

    let stats = bronze_writer(dir.path()).write(records).unwrap();
    assert_eq!(stats.partitions_written, 48);

    for written in &stats.files {
        let expected_date = written.partition.get("date").unwrap();
        let expected_hour = written.partition.get("hour").unwrap();
        for batch in read_file(&written.path) {
            let schema = batch.schema();
            assert!(schema.column_with_name("date").is_none());
            assert!(schema.column_with_name("hour").is_none());

            let ts = batch
                .column_by_name("timestamp")
                .unwrap()
                .as_primitive::<TimestampMicrosecondType>();
            for value in ts.iter().flatten() {
                let dt: DateTime<Utc> = DateTime::from_timestamp_micros(value).unwrap();
                assert_eq!(dt.format("%Y-%m-%d").to_string(), expected_date);
                assert_eq!(dt.format("%H").to_string(), expected_hour);
            }
        }
    }
}

#[test]
fn test_statistics_are_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let writer = bronze_writer(dir.path());

    let first = writer
        .write(vec![message(1, "2025-01-27T10:00:00Z")])
        .unwrap();
    let second = writer
        .write(vec![
            message(2, "2025-01-27T10:00:00Z"),
            message(3, "2025-01-27T10:00:00Z"),
        ])
        .unwrap();

    assert_eq!(first.rows_written, 1);
    assert_eq!(second.rows_written, 2);
    assert_eq!(second.files_written, 1);
    // Overlapping partition directory is reused; the file is replaced.
    assert_eq!(row_count(&second.files[0].path), 2);
}

#[test]
fn test_table_input_with_custom_partition_column() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(Schema::new(vec![
        Field::new("vin", DataType::Utf8, true),
        Field::new("velocity", DataType::Int64, true),
    ]));
    let table = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["A", "B", "A"])),
            Arc::new(Int64Array::from(vec![1, 2, 3])),
        ],
    )
    .unwrap();
    let writer =
        ParquetWriter::new(WriterConfig::new(dir.path()).with_partition_columns(["vin"])).unwrap();

    let stats = writer.write(Batch::Table(table)).unwrap();

    let names: Vec<_> = files_under(dir.path())
        .iter()
        .map(|f| relative(dir.path(), f))
        .collect();
    assert_eq!(names, vec!["vin=A/data.parquet", "vin=B/data.parquet"]);
    assert_eq!(stats.rows_written, 3);
    let first = read_file(&dir.path().join("vin=A/data.parquet"));
    assert_eq!(first[0].num_columns(), 1);
}

#[test]
fn test_table_without_timestamp_is_one_partition() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
    let table =
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();

    let stats = ParquetWriter::new(WriterConfig::new(dir.path()))
        .unwrap()
        .write(table)
        .unwrap();

    assert_eq!(stats.partitions_written, 1);
    assert_eq!(files_under(dir.path()), vec![dir.path().join("data.parquet")]);
}

#[test]
fn test_partitioning_disabled_writes_to_root() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetWriter::new(
        WriterConfig::new(dir.path())
            .with_schema(vehicle_message_raw())
            .with_partitioning(false),
    )
    .unwrap();

    let stats = writer
        .write(vec![
            message(1, "2025-01-27T10:00:00Z"),
            message(2, "2025-01-28T11:00:00Z"),
        ])
        .unwrap();

    assert_eq!(stats.partitions_written, 1);
    assert_eq!(files_under(dir.path()), vec![dir.path().join("data.parquet")]);
}

#[test]
fn test_null_timestamp_in_table_fails() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(Schema::new(vec![Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        true,
    )]));
    let table = RecordBatch::try_new(
        schema,
        vec![Arc::new(
            TimestampMicrosecondArray::from(vec![Some(0), None]).with_timezone("UTC"),
        )],
    )
    .unwrap();

    let err = ParquetWriter::new(WriterConfig::new(dir.path()))
        .unwrap()
        .write(table)
        .unwrap_err();

    assert!(matches!(err, WriterError::Partition { .. }));
    assert!(files_under(dir.path()).is_empty());
}

#[test]
fn test_rows_conserved_across_partitions_and_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..300)
        .map(|i| message(i, &format!("2025-01-27T{:02}:{:02}:00Z", i % 3, i % 60)))
        .collect();
    let writer = ParquetWriter::new(
        WriterConfig::new(dir.path())
            .with_schema(vehicle_message_raw())
            .with_max_file_size_mb(0.01)
            .with_estimated_row_bytes(1024.0),
    )
    .unwrap();

    let stats: WriteStatistics = writer.write(records).unwrap();

    assert_eq!(stats.partitions_written, 3);
    assert!(stats.files_written > 3);
    let on_disk: usize = files_under(dir.path()).iter().map(|f| row_count(f)).sum();
    assert_eq!(on_disk, 300);
    assert_eq!(stats.files.iter().map(|f| f.rows).sum::<usize>(), 300);
}

#[test]
fn test_single_file_mode_keeps_existing_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
    let table = |n: i64| {
        RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from_iter_values(0..n))],
        )
        .unwrap()
    };
    let writer =
        ParquetWriter::new(WriterConfig::new(dir.path()).with_partitioning(false)).unwrap();
    writer.write(table(3)).unwrap();
    let existing = dir.path().join("data.parquet");

    let err = writer
        .write_to(table(5), &WriteTarget::File(dir.path().join("report.parquet")))
        .unwrap_err();

    assert!(matches!(err, WriterError::InvalidConfig { .. }));
    assert_eq!(row_count(&existing), 3);
    assert_eq!(files_under(dir.path()), vec![existing]);
}

#[test]
fn test_output_root_that_is_a_file_is_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("not_a_dir");
    std::fs::write(&root, b"occupied").unwrap();

    let result = bronze_writer(&root).write(vec![message(1, "2025-01-27T10:00:00Z")]);

    let err = result.unwrap_err();
    assert!(matches!(err, WriterError::WriteFailure { .. }));
    assert_eq!(err.code().as_str(), "E004");
    assert_eq!(files_under(dir.path()), vec![root]);
}
