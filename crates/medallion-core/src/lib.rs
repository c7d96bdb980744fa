//! medallion-core - record model shared by every pipeline layer
//!
//! Raw upstream messages are validated against a [`schema::TableSchema`]
//! into [`Row`]s, then pivoted into an Arrow [`RecordBatch`] with
//! [`rows_to_record_batch`]. Nothing in this crate performs I/O.

pub mod field_names;
pub mod gear;
pub mod schema;
mod table;
mod value;

pub use gear::{map_gear_position, GearPosition};
pub use schema::{
    FieldError, FieldKind, FieldSpec, Presence, RecordError, RecordValidator, TableSchema,
};
pub use table::rows_to_record_batch;
pub use value::{RawRecord, Row, Value};

pub use arrow::array::RecordBatch;
