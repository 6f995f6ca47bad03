//! Read-only derivations over a published table: the national trend, the
//! per-quarter state league table and metric correlations.

use serde::Serialize;
use std::{cmp::Ordering, collections::BTreeMap};

use crate::process::{join::Weights, utils::mean};
use crate::quarter::QuarterKey;
use crate::schema::{MergedTable, Metric};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub quarter: QuarterKey,
    /// Mean over the quarter's rows; metrics with no value are absent.
    pub values: BTreeMap<Metric, f64>,
    /// YMI renormalized over the components present this quarter.
    pub ymi_reweighted: Option<f64>,
}

impl TrendPoint {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }
}

pub fn national_trend(table: &MergedTable, weights: &Weights) -> Vec<TrendPoint> {
    let mut by_quarter: BTreeMap<QuarterKey, Vec<_>> = BTreeMap::new();
    for row in table.rows() {
        by_quarter.entry(row.quarter).or_default().push(row);
    }
    by_quarter
        .into_iter()
        .map(|(quarter, rows)| {
            let values: BTreeMap<Metric, f64> = Metric::ALL
                .into_iter()
                .filter_map(|m| mean(rows.iter().map(|r| r.get(m))).map(|v| (m, v)))
                .collect();
            let part = |m: Metric| values.get(&m).copied();
            let ymi_reweighted = weights.ymi_available(
                part(Metric::YouthUnempRate),
                part(Metric::SkillsUnderempRate),
                part(Metric::TimeUnderempRate),
            );
            TrendPoint {
                quarter,
                values,
                ymi_reweighted,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueRow {
    pub state: String,
    pub ymi: Option<f64>,
    pub youth_unemp_rate: Option<f64>,
    pub u_rate: Option<f64>,
    pub cpi_index: Option<f64>,
    /// Youth rate above the state's overall unemployment rate.
    pub youth_gap: Option<f64>,
}

/// State rows of `quarter`, worst YMI first. Null YMI sorts last, ties by name.
pub fn league_table(table: &MergedTable, quarter: QuarterKey) -> Vec<LeagueRow> {
    let mut rows: Vec<LeagueRow> = table
        .rows()
        .iter()
        .filter(|r| r.quarter == quarter)
        .filter_map(|r| {
            let state = r.state.clone()?;
            Some(LeagueRow {
                state,
                ymi: r.ymi,
                youth_unemp_rate: r.youth_unemp_rate,
                u_rate: r.u_rate,
                cpi_index: r.cpi_index,
                youth_gap: r.youth_unemp_rate.zip(r.u_rate).map(|(y, u)| y - u),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        let by_ymi = match (a.ymi, b.ymi) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_ymi.then_with(|| a.state.cmp(&b.state))
    });
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub metrics: Vec<Metric>,
    /// Row-major, `metrics.len()` squared.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Metric, b: Metric) -> Option<f64> {
        let i = self.metrics.iter().position(|m| *m == a)?;
        let j = self.metrics.iter().position(|m| *m == b)?;
        self.values[i][j]
    }
}

/// Pearson over the quarters where both series have a value.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

pub fn correlation_matrix(trend: &[TrendPoint], metrics: &[Metric]) -> CorrelationMatrix {
    let values = metrics
        .iter()
        .map(|&a| {
            metrics
                .iter()
                .map(|&b| {
                    let pairs: Vec<(f64, f64)> = trend
                        .iter()
                        .filter_map(|p| p.get(a).zip(p.get(b)))
                        .collect();
                    pearson(&pairs)
                })
                .collect()
        })
        .collect();
    CorrelationMatrix {
        metrics: metrics.to_vec(),
        values,
    }
}
