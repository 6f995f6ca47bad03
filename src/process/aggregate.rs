use arrow::array::{Array, StringArray};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::diagnostics::Diagnostic;
use crate::error::SourceError;
use crate::geo::{canonical_state, is_national_aggregate};
use crate::process::{
    category::filter_overall,
    date_parser::to_periods,
    raw_table::RawTable,
    resolve::{ColumnResolver, MatchTier, Resolved},
    utils::parse_number,
};
use crate::quarter::QuarterKey;
use crate::schema::Metric;
use crate::sources::{Level, SourceSlot, DATE_FALLBACKS, DATE_KEY, STATE_FALLBACKS, STATE_KEY};

const SAMPLE_LIMIT: usize = 5;

/// What to do when a category column has no overall label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
    /// Average across every category and flag it.
    #[default]
    Unfiltered,
    /// Abort ingestion of that source.
    SkipSource,
}

/// Row key of a quarterly frame; national frames have no state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameKey {
    pub quarter: QuarterKey,
    pub state: Option<String>,
}

/// One source reduced to one row per key, values aligned with `metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterlyFrame {
    pub slot: SourceSlot,
    pub metrics: Vec<Metric>,
    pub rows: BTreeMap<FrameKey, Vec<Option<f64>>>,
}

impl QuarterlyFrame {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, key: &FrameKey, metric: Metric) -> Option<f64> {
        let j = self.metrics.iter().position(|m| *m == metric)?;
        self.rows.get(key).and_then(|values| values[j])
    }

    /// `(metric, value)` pairs of one row.
    pub fn entries<'a>(
        &'a self,
        values: &'a [Option<f64>],
    ) -> impl Iterator<Item = (Metric, Option<f64>)> + 'a {
        self.metrics.iter().copied().zip(values.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub struct SourceAggregate {
    pub frame: QuarterlyFrame,
    pub diagnostics: Vec<Diagnostic>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Resolved column layout of one source.
struct Layout {
    date: Resolved,
    state: Option<Resolved>,
    categories: Vec<Resolved>,
    measures: Vec<(Metric, Option<Resolved>)>,
}

fn resolve_layout(
    slot: SourceSlot,
    headers: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Layout, SourceError> {
    let spec = slot.spec();
    let mut resolver = ColumnResolver::new(headers);
    let mut low_confidence = |key: &str, r: &Resolved| {
        if r.tier.is_low_confidence() {
            diagnostics.push(Diagnostic::LowConfidenceColumn {
                source: slot.name().to_string(),
                key: key.to_string(),
                column: r.name.clone(),
            });
        }
    };

    let date = resolver.require(DATE_KEY, DATE_FALLBACKS, MatchTier::Positional, Some(0))?;
    low_confidence(DATE_KEY, &date);
    resolver.claim(&date);

    let state = match spec.level {
        Level::State => {
            let r = resolver.require(STATE_KEY, STATE_FALLBACKS, MatchTier::Loose, None)?;
            resolver.claim(&r);
            Some(r)
        }
        Level::National => None,
    };

    let mut categories = Vec::new();
    for key in spec.category_keys {
        if let Some(r) = resolver.find(key, &[], MatchTier::Normalized) {
            resolver.claim(&r);
            categories.push(r);
        }
    }

    let mut measures = Vec::with_capacity(spec.measures.len());
    for m in spec.measures {
        let key = m.metric.column_name();
        let found = if m.primary {
            let r = resolver.require(key, m.fallbacks, MatchTier::Positional, Some(1))?;
            low_confidence(key, &r);
            Some(r)
        } else {
            resolver.find(key, m.fallbacks, MatchTier::Loose)
        };
        match &found {
            Some(r) => {
                debug!(%slot, metric = key, column = %r.name, tier = ?r.tier, "resolved measure");
                resolver.claim(r);
            }
            None => debug!(%slot, metric = key, "optional measure absent"),
        }
        measures.push((m.metric, found));
    }

    Ok(Layout {
        date,
        state,
        categories,
        measures,
    })
}

/// Reduce one raw source to a quarterly (or quarterly-by-state) frame.
///
/// load → resolve columns → map dates to quarters → keep the overall category
/// → group → mean. A source with no usable rows yields an empty frame.
#[tracing::instrument(level = "info", skip(table, policy), fields(source = %table.name))]
pub fn aggregate_source(
    slot: SourceSlot,
    table: &RawTable,
    policy: CategoryPolicy,
) -> Result<SourceAggregate, SourceError> {
    let spec = slot.spec();
    let headers = table.headers();
    let mut diagnostics = Vec::new();
    let layout = resolve_layout(slot, &headers, &mut diagnostics)?;

    let column = |r: &Resolved| {
        table.column(r.index).ok_or_else(|| {
            SourceError::malformed(&table.name, format!("column `{}` is not text", r.name))
        })
    };
    let dates = column(&layout.date)?;
    let states = layout.state.as_ref().map(&column).transpose()?;

    // 1) dates → quarters
    let mut periods: Vec<Vec<QuarterKey>> = vec![Vec::new(); table.num_rows()];
    let mut rows = Vec::with_capacity(table.num_rows());
    let mut dropped = 0usize;
    let mut samples = Vec::new();
    for i in 0..table.num_rows() {
        let raw = if dates.is_valid(i) { dates.value(i) } else { "" };
        match to_periods(raw, spec.cadence) {
            Ok(p) => {
                periods[i] = p;
                rows.push(i);
            }
            Err(e) => {
                dropped += 1;
                if samples.len() < SAMPLE_LIMIT {
                    samples.push(e.0);
                }
            }
        }
    }
    if dropped > 0 {
        diagnostics.push(Diagnostic::UnparseableDates {
            source: slot.name().to_string(),
            column: layout.date.name.clone(),
            dropped,
            samples,
        });
    }

    // 2) national total rows out of state tables
    if let Some(states) = states {
        let before = rows.len();
        rows.retain(|&i| !(states.is_valid(i) && is_national_aggregate(states.value(i))));
        let count = before - rows.len();
        if count > 0 {
            diagnostics.push(Diagnostic::NationalRowsDropped { slot, count });
        }
        let before = rows.len();
        rows.retain(|&i| states.is_valid(i) && !states.value(i).trim().is_empty());
        if rows.len() < before {
            warn!(%slot, count = before - rows.len(), "rows without a state dropped");
        }
    }

    // 3) overall category only
    for cat in &layout.categories {
        let values = column(cat)?;
        rows = match filter_overall(rows.clone(), &cat.name, Some(values)) {
            Ok(kept) => kept,
            Err(e) => match policy {
                CategoryPolicy::Unfiltered => {
                    diagnostics.push(Diagnostic::CategoryFallback {
                        slot,
                        column: e.column.clone(),
                        seen: e.seen.clone(),
                    });
                    rows
                }
                CategoryPolicy::SkipSource => return Err(e.into()),
            },
        };
    }

    // 4) group + mean
    let measure_columns: Vec<Option<&StringArray>> = layout
        .measures
        .iter()
        .map(|(_, r)| r.as_ref().map(&column).transpose())
        .collect::<Result<_, _>>()?;
    let mut groups: BTreeMap<FrameKey, Vec<(f64, usize)>> = BTreeMap::new();
    for &i in &rows {
        let state = states.map(|s| canonical_state(s.value(i)));
        let values: Vec<Option<f64>> = measure_columns
            .iter()
            .map(|col| col.filter(|c| c.is_valid(i)).and_then(|c| parse_number(c.value(i))))
            .collect();
        for &quarter in &periods[i] {
            let acc = groups
                .entry(FrameKey {
                    quarter,
                    state: state.clone(),
                })
                .or_insert_with(|| vec![(0.0, 0); values.len()]);
            for (slot_acc, v) in acc.iter_mut().zip(&values) {
                if let Some(v) = v {
                    slot_acc.0 += v;
                    slot_acc.1 += 1;
                }
            }
        }
    }

    let frame = QuarterlyFrame {
        slot,
        metrics: layout.measures.iter().map(|(m, _)| *m).collect(),
        rows: groups
            .into_iter()
            .map(|(key, acc)| {
                let means = acc
                    .into_iter()
                    .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
                    .collect();
                (key, means)
            })
            .collect(),
    };

    if frame.is_empty() {
        diagnostics.push(Diagnostic::SourceEmpty { slot });
    }
    info!(
        %slot,
        rows_read = table.num_rows(),
        rows_used = rows.len(),
        keys = frame.rows.len(),
        "aggregated source"
    );

    Ok(SourceAggregate {
        frame,
        diagnostics,
        rows_read: table.num_rows(),
        rows_used: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::read_csv;
    use anyhow::Result;

    fn q(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    fn national(quarter: QuarterKey) -> FrameKey {
        FrameKey {
            quarter,
            state: None,
        }
    }

    fn state(quarter: QuarterKey, name: &str) -> FrameKey {
        FrameKey {
            quarter,
            state: Some(name.to_string()),
        }
    }

    #[test]
    fn monthly_rows_average_into_quarters() -> Result<()> {
        crate::init_test_tracing();
        let csv = "date,age,u_rate\n\
                   2021-07-01,overall,10\n\
                   2021-08-01,overall,12\n\
                   2021-09-01,overall,14\n\
                   2021-08-01,15-19,40\n\
                   2021-10-01,overall,9\n";
        let table = read_csv("youth", csv.as_bytes())?;
        let agg = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::default())?;

        let frame = &agg.frame;
        assert_eq!(frame.metrics, vec![Metric::YouthUnempRate]);
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.value(&national(q(2021, 3)), Metric::YouthUnempRate), Some(12.0));
        assert_eq!(frame.value(&national(q(2021, 4)), Metric::YouthUnempRate), Some(9.0));
        assert_eq!(agg.rows_used, 4);
        assert!(agg.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn unparseable_dates_are_counted_not_fatal() -> Result<()> {
        let csv = "date,rate\n2020-01-15,5\nsoon,6\n,7\n2020-02-15,7\n";
        let table = read_csv("skills", csv.as_bytes())?;
        let agg = aggregate_source(
            SourceSlot::SkillsUnderemployment,
            &table,
            CategoryPolicy::default(),
        )?;
        assert_eq!(agg.frame.value(&national(q(2020, 1)), Metric::SkillsUnderempRate), Some(6.0));
        match &agg.diagnostics[..] {
            [Diagnostic::UnparseableDates { dropped, samples, .. }] => {
                assert_eq!(*dropped, 2);
                assert_eq!(samples[0], "soon");
            }
            other => panic!("unexpected diagnostics {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn state_rows_are_harmonized_and_national_total_dropped() -> Result<()> {
        let csv = "date,state,p_rate,u_rate\n\
                   2020-01-01,Penang,68,3.0\n\
                   2020-02-01,Pulau Pinang,70,3.2\n\
                   2020-01-01,Malaysia,69,3.5\n\
                   2020-01-01,Johor,66,\n";
        let table = read_csv("lfs", csv.as_bytes())?;
        let agg = aggregate_source(SourceSlot::LabourForceState, &table, CategoryPolicy::default())?;
        let frame = &agg.frame;

        assert_eq!(frame.metrics, vec![Metric::PRate, Metric::URate]);
        let penang = state(q(2020, 1), "Pulau Pinang");
        assert_eq!(frame.value(&penang, Metric::PRate), Some(69.0));
        assert!((frame.value(&penang, Metric::URate).unwrap() - 3.1).abs() < 1e-9);
        // a group whose values are all missing stays as a null cell
        assert_eq!(frame.value(&state(q(2020, 1), "Johor"), Metric::URate), None);
        assert!(frame.rows.contains_key(&state(q(2020, 1), "Johor")));
        assert!(agg
            .diagnostics
            .contains(&Diagnostic::NationalRowsDropped { slot: SourceSlot::LabourForceState, count: 1 }));
        Ok(())
    }

    #[test]
    fn state_source_without_state_column_fails() -> Result<()> {
        let table = read_csv("cpi", b"date,index\n2020-01-01,120\n")?;
        let err = aggregate_source(SourceSlot::CpiState, &table, CategoryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SourceError::ColumnNotFound { ref key, .. } if key == "state"));
        Ok(())
    }

    #[test]
    fn missing_overall_label_follows_policy() -> Result<()> {
        crate::init_test_tracing();
        let csv = "date,age,u_rate\n2020-01-01,15-19,20\n2020-01-01,20-24,10\n";
        let table = read_csv("youth", csv.as_bytes())?;

        let agg = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::Unfiltered)?;
        assert_eq!(agg.frame.value(&national(q(2020, 1)), Metric::YouthUnempRate), Some(15.0));
        assert!(matches!(
            &agg.diagnostics[..],
            [Diagnostic::CategoryFallback { column, .. }] if column == "age"
        ));

        let err = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::SkipSource)
            .unwrap_err();
        assert!(matches!(err, SourceError::NoOverallCategory(_)));
        Ok(())
    }

    #[test]
    fn spaced_category_header_is_filtered() -> Result<()> {
        let csv = "Date,Age Group,Rate\n\
                   2021-07-01,Overall,10\n\
                   2021-07-01,15-19,40\n\
                   2021-07-01,20-24,30\n";
        let table = read_csv("youth", csv.as_bytes())?;
        let agg = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::default())?;
        assert_eq!(agg.frame.value(&national(q(2021, 3)), Metric::YouthUnempRate), Some(10.0));
        assert!(agg.diagnostics.is_empty());

        let csv = "Tarikh,Kumpulan Umur,Kadar\n2021-07-01,15-19,40\n2021-07-01,20-24,30\n";
        let table = read_csv("youth", csv.as_bytes())?;
        let agg = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::default())?;
        assert_eq!(agg.frame.value(&national(q(2021, 3)), Metric::YouthUnempRate), Some(35.0));
        assert!(agg.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::CategoryFallback { column, .. } if column == "Kumpulan Umur"
        )));
        Ok(())
    }

    #[test]
    fn state_measure_falls_past_claimed_position() -> Result<()> {
        let csv = "tarikh,negeri,nilai\n2020-01-01,Johor,66\n";
        let table = read_csv("lfs", csv.as_bytes())?;
        let agg = aggregate_source(SourceSlot::LabourForceState, &table, CategoryPolicy::default())?;
        assert_eq!(
            agg.frame.value(&state(q(2020, 1), "Johor"), Metric::PRate),
            Some(66.0)
        );
        assert!(agg.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::LowConfidenceColumn { key, column, .. } if key == "p_rate" && column == "nilai"
        )));
        Ok(())
    }

    #[test]
    fn positional_fallback_is_flagged() -> Result<()> {
        let table = read_csv("time", b"when,how_much\n2020-05-01,2.5\n")?;
        let agg = aggregate_source(SourceSlot::TimeUnderemployment, &table, CategoryPolicy::default())?;
        assert_eq!(agg.frame.value(&national(q(2020, 2)), Metric::TimeUnderempRate), Some(2.5));
        let flagged: Vec<&str> = agg
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::LowConfidenceColumn { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(flagged, vec!["date", "time_underemp_rate"]);
        Ok(())
    }

    #[test]
    fn single_column_source_is_column_not_found() -> Result<()> {
        let table = read_csv("time", b"when\n2020-05-01\n")?;
        let err = aggregate_source(SourceSlot::TimeUnderemployment, &table, CategoryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SourceError::ColumnNotFound { .. }));
        Ok(())
    }

    #[test]
    fn no_valid_rows_is_an_empty_frame() -> Result<()> {
        let table = read_csv("youth", b"date,u_rate\nnever,1\n")?;
        let agg = aggregate_source(SourceSlot::YouthUnemployment, &table, CategoryPolicy::default())?;
        assert!(agg.frame.is_empty());
        assert!(agg
            .diagnostics
            .contains(&Diagnostic::SourceEmpty { slot: SourceSlot::YouthUnemployment }));
        Ok(())
    }

    #[test]
    fn annual_source_fills_every_quarter() -> Result<()> {
        let csv = "date,state,income_mean\n2019,Selangor,9000\n2022-01-01,Selangor,10000\n";
        let table = read_csv("income", csv.as_bytes())?;
        let agg = aggregate_source(
            SourceSlot::HouseholdIncomeState,
            &table,
            CategoryPolicy::default(),
        )?;
        assert_eq!(agg.frame.rows.len(), 8);
        for quarter in QuarterKey::quarters_of(2022) {
            assert_eq!(
                agg.frame.value(&state(quarter, "Selangor"), Metric::IncomeMean),
                Some(10000.0)
            );
        }
        Ok(())
    }
}
