// Size estimation and chunk planning.
//
// Sizes are estimates only: a per-row byte cost times the row count. When
// the estimate exceeds the limit the rows are cut into contiguous ranges of
// `row_count / num_chunks` rows, with `num_chunks = floor(total / max) + 1`.

use arrow::array::RecordBatch;
use std::ops::Range;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Typical on-disk size of Parquet relative to in-memory Arrow.
pub const PARQUET_SIZE_RATIO: f64 = 0.3;

/// File name for chunk `index` of `total`.
pub fn chunk_file_name(index: usize, total: usize) -> String {
    if total <= 1 {
        "data.parquet".to_string()
    } else {
        format!("part_{:03}.parquet", index)
    }
}

/// Per-row byte estimate calibrated from the batch's Arrow buffers.
pub fn estimate_row_bytes(batch: &RecordBatch) -> f64 {
    let rows = batch.num_rows();
    if rows == 0 {
        return 0.0;
    }
    batch.get_array_memory_size() as f64 / rows as f64 * PARQUET_SIZE_RATIO
}

pub fn estimated_size_mb(row_count: usize, bytes_per_row: f64) -> f64 {
    row_count as f64 * bytes_per_row / BYTES_PER_MB
}

/// Plan contiguous row ranges so each chunk's estimate stays near `max_file_size_mb`.
///
/// `num_chunks` is clamped to `row_count`, so no range is ever empty.
pub fn plan_chunks(
    row_count: usize,
    bytes_per_row: f64,
    max_file_size_mb: f64,
) -> Vec<Range<usize>> {
    if row_count == 0 {
        return Vec::new();
    }

    let total_mb = estimated_size_mb(row_count, bytes_per_row);
    if total_mb <= max_file_size_mb {
        return vec![0..row_count];
    }

    let wanted = (total_mb / max_file_size_mb).floor() as usize + 1;
    let num_chunks = wanted.clamp(1, row_count);
    let chunk_size = row_count / num_chunks;

    (0..row_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(row_count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    const MB: f64 = 1024.0 * 1024.0;

    #[test]
    fn test_under_limit_is_single_chunk() {
        assert_eq!(plan_chunks(1000, 100.0, 125.0), vec![0..1000]);
    }

    #[test]
    fn test_exactly_at_limit_is_single_chunk() {
        // 1024 rows * 1 KiB = 1 MiB total
        assert_eq!(plan_chunks(1024, 1024.0, 1.0), vec![0..1024]);
    }

    #[test]
    fn test_split_into_equal_ranges() {
        // 3.5 MB over a 1 MB limit -> floor(3.5) + 1 = 4 chunks of 250 rows
        let chunks = plan_chunks(1000, 3.5 * MB / 1000.0, 1.0);
        assert_eq!(chunks, vec![0..250, 250..500, 500..750, 750..1000]);
    }

    #[test]
    fn test_remainder_gets_a_shorter_final_chunk() {
        // 2.5 MB over 1 MB -> 3 chunks of 333 rows, plus the 1-row remainder
        let chunks = plan_chunks(1000, 2.5 * MB / 1000.0, 1.0);
        assert_eq!(chunks, vec![0..333, 333..666, 666..999, 999..1000]);
        assert_eq!(chunks.iter().map(|r| r.len()).sum::<usize>(), 1000);
    }

    #[test]
    fn test_more_chunks_than_rows_is_clamped() {
        // Estimate asks for thousands of chunks but there are only 3 rows
        let chunks = plan_chunks(3, MB, 0.001);
        assert_eq!(chunks, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(plan_chunks(0, 100.0, 1.0).is_empty());
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name(0, 1), "data.parquet");
        assert_eq!(chunk_file_name(0, 3), "part_000.parquet");
        assert_eq!(chunk_file_name(12, 13), "part_012.parquet");
    }

    #[test]
    fn test_estimate_row_bytes_scales_with_ratio() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from_iter_values(0..1024))],
        )
        .unwrap();
        let per_row = estimate_row_bytes(&batch);
        assert!(per_row >= 8.0 * PARQUET_SIZE_RATIO);
    }
}
