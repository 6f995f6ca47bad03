use thiserror::Error;

use crate::schema::Metric;
use crate::sources::SourceSlot;

/// A single cell that could not be mapped onto the quarterly grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable date value `{0}`")]
pub struct Unparseable(pub String);

/// The category column carries no value from the overall/all alias set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no overall category in column `{column}` (saw {seen:?})")]
pub struct NoOverallCategoryFound {
    pub column: String,
    /// Distinct values seen, capped for display.
    pub seen: Vec<String>,
}

/// Failures that abort ingestion of one source only.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no column for `{key}` among {available:?}")]
    ColumnNotFound { key: String, available: Vec<String> },

    #[error("malformed source `{name}`: {reason}")]
    Malformed { name: String, reason: String },

    #[error(transparent)]
    NoOverallCategory(#[from] NoOverallCategoryFound),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("glob error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl SourceError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimError {
    #[error("core metrics share no quarter (no data at all for {empty:?})")]
    EmptyIntersection { empty: Vec<Metric> },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("insufficient sources: mandatory {missing:?} unavailable")]
    InsufficientSources { missing: Vec<SourceSlot> },

    #[error("invalid YMI weights: {0}")]
    InvalidWeights(String),
}
