pub mod arrow;
pub mod types;
pub mod write;

pub use self::arrow::{merged_schema, to_record_batch, QUARTER_COLUMN, STATE_COLUMN};
pub use types::{MergedRow, MergedTable, Metric, NationalQuarterRow, StateQuarterRow};
pub use write::{write_csv, write_json, write_parquet};
