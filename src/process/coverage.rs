use serde::Serialize;
use std::fmt;

use crate::diagnostics::Diagnostics;
use crate::quarter::QuarterKey;
use crate::schema::{MergedTable, Metric};
use crate::sources::SourceSlot;

/// Where one metric has data in the merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageEntry {
    pub metric: Metric,
    pub first_quarter: Option<QuarterKey>,
    pub last_quarter: Option<QuarterKey>,
    pub non_null_count: usize,
    /// Ingestion conditions that change what the numbers mean.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<String>,
}

impl CoverageEntry {
    pub fn has_data(&self) -> bool {
        self.non_null_count > 0
    }

    pub fn range_label(&self) -> String {
        match (self.first_quarter, self.last_quarter) {
            (Some(first), Some(last)) => format!("{}..{}", first, last),
            _ => "no data".to_string(),
        }
    }
}

/// One entry per canonical metric, in output column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoverageReport {
    entries: Vec<CoverageEntry>,
}

impl CoverageReport {
    pub fn entries(&self) -> &[CoverageEntry] {
        &self.entries
    }

    pub fn get(&self, metric: Metric) -> Option<&CoverageEntry> {
        self.entries.iter().find(|e| e.metric == metric)
    }

    /// Attach per-source caveats to the metrics that source feeds. Core
    /// caveats also mark YMI.
    pub fn with_caveats(mut self, diagnostics: &Diagnostics) -> Self {
        for d in diagnostics.items() {
            let (Some(slot), Some(caveat)) = (d.slot(), d.caveat()) else {
                continue;
            };
            let mut metrics = slot.metrics();
            if matches!(
                slot,
                SourceSlot::YouthUnemployment
                    | SourceSlot::SkillsUnderemployment
                    | SourceSlot::TimeUnderemployment
            ) {
                metrics.push(Metric::Ymi);
            }
            let text = format!("{}: {}", slot, caveat);
            for entry in self.entries.iter_mut().filter(|e| metrics.contains(&e.metric)) {
                if !entry.caveats.contains(&text) {
                    entry.caveats.push(text.clone());
                }
            }
        }
        self
    }
}

/// Scan the merged table once per metric. Bounds use `QuarterKey` order.
pub fn audit(table: &MergedTable) -> CoverageReport {
    let entries = Metric::ALL
        .into_iter()
        .map(|metric| {
            let mut entry = CoverageEntry {
                metric,
                first_quarter: None,
                last_quarter: None,
                non_null_count: 0,
                caveats: Vec::new(),
            };
            for row in table.rows().iter().filter(|r| r.get(metric).is_some()) {
                entry.non_null_count += 1;
                entry.first_quarter = Some(entry.first_quarter.map_or(row.quarter, |q| q.min(row.quarter)));
                entry.last_quarter = Some(entry.last_quarter.map_or(row.quarter, |q| q.max(row.quarter)));
            }
            entry
        })
        .collect();
    CoverageReport { entries }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<22} {:<16} {:>8}", "metric", "range", "non-null")?;
        for e in &self.entries {
            writeln!(
                f,
                "{:<22} {:<16} {:>8}",
                e.metric.column_name(),
                e.range_label(),
                e.non_null_count
            )?;
            for c in &e.caveats {
                writeln!(f, "    ! {}", c)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::schema::MergedRow;

    fn q(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    fn row(state: Option<&str>, quarter: QuarterKey, youth: Option<f64>) -> MergedRow {
        let mut r = MergedRow::empty(state.map(str::to_string), quarter);
        r.youth_unemp_rate = youth;
        r
    }

    #[test]
    fn bounds_follow_quarter_order() {
        let table = MergedTable::new(vec![
            row(None, q(2021, 3), Some(1.0)),
            row(None, q(999, 4), Some(1.0)),
            row(None, q(2022, 1), None),
            row(Some("Johor"), q(2021, 1), Some(2.0)),
        ]);
        let report = audit(&table);
        let youth = report.get(Metric::YouthUnempRate).unwrap();
        assert_eq!(youth.first_quarter, Some(q(999, 4)));
        assert_eq!(youth.last_quarter, Some(q(2021, 3)));
        assert_eq!(youth.non_null_count, 3);
        assert!(youth.first_quarter <= youth.last_quarter);
    }

    #[test]
    fn empty_metric_reports_no_data() {
        let table = MergedTable::new(vec![row(None, q(2020, 1), Some(1.0))]);
        let report = audit(&table);
        assert_eq!(report.entries().len(), Metric::ALL.len());
        let cpi = report.get(Metric::CpiIndex).unwrap();
        assert!(!cpi.has_data());
        assert_eq!((cpi.first_quarter, cpi.last_quarter), (None, None));
        assert_eq!(cpi.range_label(), "no data");
    }

    #[test]
    fn category_fallback_is_visible_in_report() {
        let table = MergedTable::new(vec![row(None, q(2020, 1), Some(1.0))]);
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::CategoryFallback {
            slot: SourceSlot::YouthUnemployment,
            column: "age".into(),
            seen: vec!["15-19".into()],
        });
        let report = audit(&table).with_caveats(&diags);
        assert_eq!(report.get(Metric::YouthUnempRate).unwrap().caveats.len(), 1);
        assert_eq!(report.get(Metric::Ymi).unwrap().caveats.len(), 1);
        assert!(report.get(Metric::CpiIndex).unwrap().caveats.is_empty());
        assert!(report.to_string().contains("averaged across all categories"));
    }
}
