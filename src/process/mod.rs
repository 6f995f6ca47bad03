// src/process/mod.rs
pub mod aggregate;
pub mod category;
pub mod coverage;
pub mod date_parser;
pub mod join;
pub mod raw_table;
pub mod resolve;
pub mod trimming;
pub mod utils;

use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{PipelineError, TrimError};
use crate::load::SourceSet;
use crate::schema::Metric;
use crate::session::Session;
use crate::sources::SourceSlot;

use aggregate::{aggregate_source, CategoryPolicy};
use join::{join, Weights};
use trimming::trim_to_core;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub weights: Weights,
    pub trim_to_core: bool,
    /// Slots whose absence aborts the run.
    pub required: Vec<SourceSlot>,
    pub category_policy: CategoryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            trim_to_core: true,
            required: vec![SourceSlot::YouthUnemployment],
            category_policy: CategoryPolicy::default(),
        }
    }
}

/// Aggregate every present source, join, audit and optionally trim.
///
/// A failing source is recorded and skipped; only a failing required source
/// stops the run.
#[tracing::instrument(level = "info", skip_all)]
pub fn run(sources: SourceSet, options: &PipelineOptions) -> Result<Session, PipelineError> {
    options.weights.validate()?;
    let (tables, failures) = sources.into_parts();
    let mut diagnostics = Diagnostics::new();
    let mut frames = BTreeMap::new();

    for slot in SourceSlot::ALL {
        if let Some(e) = failures.get(&slot) {
            diagnostics.push(Diagnostic::SourceFailed {
                slot,
                error: e.to_string(),
            });
            continue;
        }
        let Some(table) = tables.get(&slot) else {
            diagnostics.push(Diagnostic::SourceMissing { slot });
            continue;
        };
        match aggregate_source(slot, table, options.category_policy) {
            Ok(agg) => {
                diagnostics.extend(agg.diagnostics);
                frames.insert(slot, agg.frame);
            }
            Err(e) => diagnostics.push(Diagnostic::SourceFailed {
                slot,
                error: e.to_string(),
            }),
        }
    }

    let missing: Vec<SourceSlot> = options
        .required
        .iter()
        .copied()
        .filter(|slot| !frames.contains_key(slot))
        .collect();
    if !missing.is_empty() {
        error!(?missing, "mandatory sources unavailable");
        return Err(PipelineError::InsufficientSources { missing });
    }

    let merged = join(&frames, &options.weights);

    // only the core series that were supplied gate the range
    let core: Vec<Metric> = Metric::CORE
        .into_iter()
        .filter(|m| frames.values().any(|f| f.metrics.contains(m)))
        .collect();
    let (table, trimmed) = if options.trim_to_core && !core.is_empty() {
        match trim_to_core(&merged, &core) {
            Ok(t) => (t, true),
            Err(TrimError::EmptyIntersection { empty }) => {
                warn!(?empty, "core series share no quarter, publishing untrimmed table");
                diagnostics.push(Diagnostic::TrimSkipped { empty });
                (merged, false)
            }
        }
    } else {
        (merged, false)
    };

    info!(
        sources = frames.len(),
        rows = table.len(),
        trimmed,
        diagnostics = diagnostics.items().len(),
        "pipeline run complete"
    );
    Ok(Session::new(table, diagnostics, trimmed))
}
