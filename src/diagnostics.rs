//! Recoverable conditions collected during a run and returned beside the table.

use serde::Serialize;
use tracing::warn;

use crate::schema::Metric;
use crate::sources::SourceSlot;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No input was configured for the slot.
    SourceMissing { slot: SourceSlot },
    /// Load or aggregation failed; the slot contributes nothing.
    SourceFailed { slot: SourceSlot, error: String },
    /// The source parsed but produced no quarterly rows.
    SourceEmpty { slot: SourceSlot },
    UnparseableDates {
        source: String,
        column: String,
        dropped: usize,
        samples: Vec<String>,
    },
    /// A required column was guessed from its position.
    LowConfidenceColumn {
        source: String,
        key: String,
        column: String,
    },
    /// No overall label: values were averaged over every category instead.
    CategoryFallback {
        slot: SourceSlot,
        column: String,
        seen: Vec<String>,
    },
    /// National-aggregate rows (e.g. `Malaysia`) removed from a state source.
    NationalRowsDropped { slot: SourceSlot, count: usize },
    /// Trimming would have removed every row; the untrimmed table was published.
    TrimSkipped { empty: Vec<Metric> },
}

impl Diagnostic {
    /// The slot this diagnostic is about, when it concerns one source.
    pub fn slot(&self) -> Option<SourceSlot> {
        match self {
            Diagnostic::SourceMissing { slot }
            | Diagnostic::SourceFailed { slot, .. }
            | Diagnostic::SourceEmpty { slot }
            | Diagnostic::CategoryFallback { slot, .. }
            | Diagnostic::NationalRowsDropped { slot, .. } => Some(*slot),
            Diagnostic::UnparseableDates { source, .. }
            | Diagnostic::LowConfidenceColumn { source, .. } => SourceSlot::from_name(source),
            Diagnostic::TrimSkipped { .. } => None,
        }
    }

    /// Conditions that change what a metric means, surfaced in the coverage report.
    pub fn caveat(&self) -> Option<String> {
        match self {
            Diagnostic::CategoryFallback { column, .. } => Some(format!(
                "no overall category in `{}`; averaged across all categories",
                column
            )),
            Diagnostic::LowConfidenceColumn { key, column, .. } => Some(format!(
                "`{}` guessed from column position (`{}`)",
                key, column
            )),
            Diagnostic::UnparseableDates { dropped, .. } => {
                Some(format!("{} rows dropped for unparseable dates", dropped))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a condition.
    pub fn push(&mut self, item: Diagnostic) {
        warn!(diagnostic = ?item, "pipeline diagnostic");
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = Diagnostic>) {
        for item in items {
            self.push(item);
        }
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn for_slot(&self, slot: SourceSlot) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.slot() == Some(slot))
    }

    pub fn trim_skipped(&self) -> bool {
        self.items
            .iter()
            .any(|d| matches!(d, Diagnostic::TrimSkipped { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_lookup_covers_source_named_variants() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::UnparseableDates {
            source: "cpi_state".into(),
            column: "date".into(),
            dropped: 3,
            samples: vec!["soon".into()],
        });
        diags.push(Diagnostic::SourceEmpty {
            slot: SourceSlot::Productivity,
        });
        diags.push(Diagnostic::TrimSkipped { empty: vec![] });

        assert_eq!(diags.for_slot(SourceSlot::CpiState).count(), 1);
        assert_eq!(diags.for_slot(SourceSlot::Productivity).count(), 1);
        assert!(diags.trim_skipped());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let d = Diagnostic::CategoryFallback {
            slot: SourceSlot::YouthUnemployment,
            column: "age".into(),
            seen: vec!["15-19".into()],
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "category_fallback");
        assert_eq!(json["slot"], "youth_unemployment");
        assert!(d.caveat().unwrap().contains("`age`"));
    }
}
