//! The published result of one run, passed by reference to every consumer.

use anyhow::{Context, Result};
use arrow::{array::Array, error::ArrowError, record_batch::RecordBatch};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::config::OutputConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::SourceError;
use crate::load::load_path;
use crate::process::{
    coverage::{audit, CoverageReport},
    date_parser::to_quarter,
    raw_table::RawTable,
    resolve::{ColumnResolver, MatchTier},
    utils::{clean_str, parse_number},
};
use crate::quarter::QuarterKey;
use crate::schema::{
    to_record_batch, write_csv, write_json, write_parquet, MergedRow, MergedTable, Metric,
    QUARTER_COLUMN, STATE_COLUMN,
};

/// One merged table with everything derived from it. Never mutated; a new
/// run builds a new session.
#[derive(Debug, Clone)]
pub struct Session {
    table: MergedTable,
    coverage: CoverageReport,
    quarters: Vec<QuarterKey>,
    states: BTreeSet<String>,
    diagnostics: Diagnostics,
    trimmed: bool,
}

impl Session {
    pub fn new(table: MergedTable, diagnostics: Diagnostics, trimmed: bool) -> Self {
        let coverage = audit(&table).with_caveats(&diagnostics);
        Self {
            quarters: table.quarters(),
            states: table.states(),
            table,
            coverage,
            diagnostics,
            trimmed,
        }
    }

    pub fn table(&self) -> &MergedTable {
        &self.table
    }

    pub fn coverage(&self) -> &CoverageReport {
        &self.coverage
    }

    /// Distinct quarters of the table, ascending.
    pub fn quarters(&self) -> &[QuarterKey] {
        &self.quarters
    }

    pub fn states(&self) -> &BTreeSet<String> {
        &self.states
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Whether the table was restricted to the core quarter range.
    pub fn trimmed(&self) -> bool {
        self.trimmed
    }

    pub fn record_batch(&self) -> Result<RecordBatch, ArrowError> {
        to_record_batch(&self.table)
    }

    /// Load an already quarter-aligned table, skipping ingestion and joins.
    pub fn from_merged_path(path: &Path) -> Result<Self, SourceError> {
        let raw = load_path(path)?;
        Self::from_merged(&raw)
    }

    /// Canonical columns are found by name; absent metrics are all-null.
    pub fn from_merged(raw: &RawTable) -> Result<Self, SourceError> {
        let headers = raw.headers();
        let resolver = ColumnResolver::new(&headers);
        let quarter = resolver.require(QUARTER_COLUMN, &[], MatchTier::CaseInsensitive, None)?;
        let state = resolver.find(STATE_COLUMN, &[], MatchTier::CaseInsensitive);
        let text = |index: usize| {
            raw.column(index)
                .ok_or_else(|| SourceError::malformed(&raw.name, "column is not text"))
        };

        let quarters = text(quarter.index)?;
        let states = state.as_ref().map(|s| text(s.index)).transpose()?;
        let metrics = Metric::ALL
            .into_iter()
            .filter_map(|m| {
                resolver
                    .find(m.column_name(), &[], MatchTier::CaseInsensitive)
                    .map(|r| (m, r))
            })
            .map(|(m, r)| text(r.index).map(|col| (m, col)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw.num_rows());
        let mut dropped = 0usize;
        let mut samples = Vec::new();
        for i in 0..raw.num_rows() {
            let label = if quarters.is_valid(i) { quarters.value(i) } else { "" };
            let key = match to_quarter(label) {
                Ok(key) => key,
                Err(e) => {
                    dropped += 1;
                    if samples.len() < 5 {
                        samples.push(e.0);
                    }
                    continue;
                }
            };
            let state = states
                .filter(|s| s.is_valid(i))
                .map(|s| clean_str(s.value(i)))
                .filter(|s| !s.is_empty());
            let mut row = MergedRow::empty(state, key);
            for (metric, col) in &metrics {
                if col.is_valid(i) {
                    row.set(*metric, parse_number(col.value(i)));
                }
            }
            rows.push(row);
        }

        let mut diagnostics = Diagnostics::new();
        if dropped > 0 {
            diagnostics.push(Diagnostic::UnparseableDates {
                source: raw.name.clone(),
                column: quarter.name.clone(),
                dropped,
                samples,
            });
        }
        info!(
            source = %raw.name,
            rows = rows.len(),
            metrics = metrics.len(),
            dropped,
            "loaded pre-merged table"
        );
        Ok(Self::new(MergedTable::new(rows), diagnostics, false))
    }

    /// Write the table and reports into `output.dir`; returns the files written.
    pub fn write_outputs(&self, output: &OutputConfig) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&output.dir)
            .with_context(|| format!("creating output dir {}", output.dir.display()))?;
        let mut written = Vec::new();

        if output.parquet || output.csv {
            let batch = self.record_batch().context("building output batch")?;
            if output.parquet {
                let path = output.dir.join("merged.parquet");
                write_parquet(&batch, &path)?;
                written.push(path);
            }
            if output.csv {
                let path = output.dir.join("merged.csv");
                write_csv(&batch, &path)?;
                written.push(path);
            }
        }
        if output.coverage_json {
            let path = output.dir.join("coverage.json");
            write_json(&self.coverage, &path)?;
            written.push(path);
        }
        let path = output.dir.join("diagnostics.json");
        write_json(&self.diagnostics, &path)?;
        written.push(path);

        info!(files = written.len(), dir = %output.dir.display(), "wrote outputs");
        Ok(written)
    }
}
