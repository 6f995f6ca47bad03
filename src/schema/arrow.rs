// src/schema/arrow.rs

use arrow::{
    array::{ArrayRef, Float64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::types::{MergedTable, Metric};

pub const STATE_COLUMN: &str = "state";
pub const QUARTER_COLUMN: &str = "quarter";

/// Published schema:
/// - `state`   → Utf8, nullable
/// - `quarter` → Utf8 (`YYYYQn`)
/// - every `Metric` → Float64, nullable, in `Metric::ALL` order
pub fn merged_schema() -> SchemaRef {
    let mut fields = Vec::with_capacity(Metric::ALL.len() + 2);
    fields.push(Field::new(STATE_COLUMN, DataType::Utf8, true));
    fields.push(Field::new(QUARTER_COLUMN, DataType::Utf8, false));
    for metric in Metric::ALL {
        fields.push(Field::new(metric.column_name(), DataType::Float64, true));
    }
    Arc::new(Schema::new(fields))
}

/// Build the published `RecordBatch` in the table's row order.
pub fn to_record_batch(table: &MergedTable) -> Result<RecordBatch, ArrowError> {
    let rows = table.rows();

    let mut state = StringBuilder::with_capacity(rows.len(), rows.len() * 12);
    let mut quarter = StringBuilder::with_capacity(rows.len(), rows.len() * 6);
    for row in rows {
        state.append_option(row.state.as_deref());
        quarter.append_value(row.quarter.to_string());
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(state.finish()), Arc::new(quarter.finish())];
    for metric in Metric::ALL {
        let mut b = Float64Builder::with_capacity(rows.len());
        for row in rows {
            b.append_option(row.get(metric));
        }
        columns.push(Arc::new(b.finish()));
    }

    RecordBatch::try_new(merged_schema(), columns)
}
