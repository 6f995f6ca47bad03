use arrow::{
    array::{ArrayRef, StringArray},
    compute::{cast, concat_batches},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::error::SourceError;

/// One loaded source before any typing: every column is `Utf8`.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Where the table came from, for diagnostics.
    pub name: String,
    batch: RecordBatch,
}

impl RawTable {
    /// Cast every column of `batches` to `Utf8` and stack them into one table.
    pub fn from_batches(name: &str, batches: &[RecordBatch]) -> Result<Self, SourceError> {
        let Some(first) = batches.first() else {
            return Err(SourceError::malformed(name, "no record batches"));
        };
        let schema = Arc::new(Schema::new(
            first
                .schema()
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));

        let mut utf8 = Vec::with_capacity(batches.len());
        for batch in batches {
            if batch.num_columns() != schema.fields().len() {
                return Err(SourceError::malformed(name, "record batches disagree on columns"));
            }
            let columns = batch
                .columns()
                .iter()
                .map(|c| cast(c.as_ref(), &DataType::Utf8))
                .collect::<Result<Vec<ArrayRef>, _>>()?;
            utf8.push(RecordBatch::try_new(schema.clone(), columns)?);
        }

        let batch = concat_batches(&schema, &utf8)?;
        Ok(Self {
            name: name.to_string(),
            batch,
        })
    }

    /// Stack tables loaded from several files of the same source.
    pub fn concat(name: &str, tables: Vec<RawTable>) -> Result<Self, SourceError> {
        if let Some(first) = tables.first() {
            let headers = first.headers();
            if let Some(odd) = tables.iter().find(|t| t.headers() != headers) {
                return Err(SourceError::malformed(
                    name,
                    format!("`{}` has different headers from `{}`", odd.name, first.name),
                ));
            }
        }
        let batches: Vec<RecordBatch> = tables.into_iter().map(|t| t.batch).collect();
        Self::from_batches(name, &batches)
    }

    pub fn headers(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column(&self, index: usize) -> Option<&StringArray> {
        if index >= self.batch.num_columns() {
            return None;
        }
        self.batch
            .column(index)
            .as_any()
            .downcast_ref::<StringArray>()
    }
}
