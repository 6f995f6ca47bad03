// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::quarter::QuarterKey;

/// Every numeric column of the published table, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "p_rate")]
    PRate,
    #[serde(rename = "u_rate")]
    URate,
    #[serde(rename = "cpi_index")]
    CpiIndex,
    #[serde(rename = "youth_unemp_rate")]
    YouthUnempRate,
    #[serde(rename = "skills_underemp_rate")]
    SkillsUnderempRate,
    #[serde(rename = "time_underemp_rate")]
    TimeUnderempRate,
    #[serde(rename = "YMI")]
    Ymi,
    #[serde(rename = "income_mean")]
    IncomeMean,
    #[serde(rename = "productivity")]
    Productivity,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::PRate,
        Metric::URate,
        Metric::CpiIndex,
        Metric::YouthUnempRate,
        Metric::SkillsUnderempRate,
        Metric::TimeUnderempRate,
        Metric::Ymi,
        Metric::IncomeMean,
        Metric::Productivity,
    ];

    /// The three national series whose joint coverage bounds the trimmed range.
    pub const CORE: [Metric; 3] = [
        Metric::YouthUnempRate,
        Metric::SkillsUnderempRate,
        Metric::TimeUnderempRate,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::PRate => "p_rate",
            Metric::URate => "u_rate",
            Metric::CpiIndex => "cpi_index",
            Metric::YouthUnempRate => "youth_unemp_rate",
            Metric::SkillsUnderempRate => "skills_underemp_rate",
            Metric::TimeUnderempRate => "time_underemp_rate",
            Metric::Ymi => "YMI",
            Metric::IncomeMean => "income_mean",
            Metric::Productivity => "productivity",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.column_name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn is_national(&self) -> bool {
        matches!(
            self,
            Metric::YouthUnempRate
                | Metric::SkillsUnderempRate
                | Metric::TimeUnderempRate
                | Metric::Ymi
                | Metric::Productivity
        )
    }
}

/// One row per quarter of the national pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NationalQuarterRow {
    pub youth_unemp_rate: Option<f64>,
    pub skills_underemp_rate: Option<f64>,
    pub time_underemp_rate: Option<f64>,
    pub productivity: Option<f64>,
    pub ymi: Option<f64>,
}

impl NationalQuarterRow {
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::YouthUnempRate => self.youth_unemp_rate = value,
            Metric::SkillsUnderempRate => self.skills_underemp_rate = value,
            Metric::TimeUnderempRate => self.time_underemp_rate = value,
            Metric::Productivity => self.productivity = value,
            Metric::Ymi => self.ymi = value,
            other => tracing::debug!(metric = ?other, "not a national metric, ignored"),
        }
    }
}

/// One row per `(state, quarter)` of the state pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateQuarterRow {
    pub p_rate: Option<f64>,
    pub u_rate: Option<f64>,
    pub cpi_index: Option<f64>,
    pub income_mean: Option<f64>,
}

impl StateQuarterRow {
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::PRate => self.p_rate = value,
            Metric::URate => self.u_rate = value,
            Metric::CpiIndex => self.cpi_index = value,
            Metric::IncomeMean => self.income_mean = value,
            other => tracing::debug!(metric = ?other, "not a state metric, ignored"),
        }
    }
}

/// A published row: state metrics plus the national figures broadcast for its quarter.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub state: Option<String>,
    pub quarter: QuarterKey,
    pub p_rate: Option<f64>,
    pub u_rate: Option<f64>,
    pub cpi_index: Option<f64>,
    pub youth_unemp_rate: Option<f64>,
    pub skills_underemp_rate: Option<f64>,
    pub time_underemp_rate: Option<f64>,
    pub ymi: Option<f64>,
    pub income_mean: Option<f64>,
    pub productivity: Option<f64>,
}

impl MergedRow {
    /// A row with every metric null.
    pub fn empty(state: Option<String>, quarter: QuarterKey) -> Self {
        Self {
            state,
            quarter,
            p_rate: None,
            u_rate: None,
            cpi_index: None,
            youth_unemp_rate: None,
            skills_underemp_rate: None,
            time_underemp_rate: None,
            ymi: None,
            income_mean: None,
            productivity: None,
        }
    }

    pub fn from_parts(
        state: Option<String>,
        quarter: QuarterKey,
        local: Option<&StateQuarterRow>,
        national: Option<&NationalQuarterRow>,
    ) -> Self {
        let mut row = Self::empty(state, quarter);
        if let Some(s) = local {
            row.p_rate = s.p_rate;
            row.u_rate = s.u_rate;
            row.cpi_index = s.cpi_index;
            row.income_mean = s.income_mean;
        }
        if let Some(n) = national {
            row.youth_unemp_rate = n.youth_unemp_rate;
            row.skills_underemp_rate = n.skills_underemp_rate;
            row.time_underemp_rate = n.time_underemp_rate;
            row.ymi = n.ymi;
            row.productivity = n.productivity;
        }
        row
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::PRate => self.p_rate,
            Metric::URate => self.u_rate,
            Metric::CpiIndex => self.cpi_index,
            Metric::YouthUnempRate => self.youth_unemp_rate,
            Metric::SkillsUnderempRate => self.skills_underemp_rate,
            Metric::TimeUnderempRate => self.time_underemp_rate,
            Metric::Ymi => self.ymi,
            Metric::IncomeMean => self.income_mean,
            Metric::Productivity => self.productivity,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::PRate => self.p_rate = value,
            Metric::URate => self.u_rate = value,
            Metric::CpiIndex => self.cpi_index = value,
            Metric::YouthUnempRate => self.youth_unemp_rate = value,
            Metric::SkillsUnderempRate => self.skills_underemp_rate = value,
            Metric::TimeUnderempRate => self.time_underemp_rate = value,
            Metric::Ymi => self.ymi = value,
            Metric::IncomeMean => self.income_mean = value,
            Metric::Productivity => self.productivity = value,
        }
    }

    fn sort_key(&self) -> (QuarterKey, Option<&str>) {
        (self.quarter, self.state.as_deref())
    }
}

/// The published table. Rows are always sorted by `(quarter, state)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn new(mut rows: Vec<MergedRow>) -> Self {
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { rows }
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct quarters, ascending.
    pub fn quarters(&self) -> Vec<QuarterKey> {
        let set: BTreeSet<QuarterKey> = self.rows.iter().map(|r| r.quarter).collect();
        set.into_iter().collect()
    }

    /// Distinct non-null state names.
    pub fn states(&self) -> BTreeSet<String> {
        self.rows.iter().filter_map(|r| r.state.clone()).collect()
    }

    /// Quarters in which `metric` is non-null in at least one row.
    pub fn quarters_with(&self, metric: Metric) -> BTreeSet<QuarterKey> {
        self.rows
            .iter()
            .filter(|r| r.get(metric).is_some())
            .map(|r| r.quarter)
            .collect()
    }

    pub fn retain_quarters(&self, keep: &BTreeSet<QuarterKey>) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .filter(|r| keep.contains(&r.quarter))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    #[test]
    fn table_sorts_by_quarter_then_state() {
        let table = MergedTable::new(vec![
            MergedRow::empty(Some("Selangor".into()), q(2021, 1)),
            MergedRow::empty(Some("Johor".into()), q(2021, 1)),
            MergedRow::empty(Some("Johor".into()), q(2020, 4)),
            MergedRow::empty(None, q(2021, 1)),
        ]);
        let keys: Vec<(String, Option<&str>)> = table
            .rows()
            .iter()
            .map(|r| (r.quarter.to_string(), r.state.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2020Q4".to_string(), Some("Johor")),
                ("2021Q1".to_string(), None),
                ("2021Q1".to_string(), Some("Johor")),
                ("2021Q1".to_string(), Some("Selangor")),
            ]
        );
    }

    #[test]
    fn metric_names_round_trip() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_column_name(m.column_name()), Some(m));
        }
        assert_eq!(Metric::from_column_name("ymi"), Some(Metric::Ymi));
        assert_eq!(Metric::from_column_name("state"), None);
    }

    #[test]
    fn quarters_with_skips_nulls() {
        let mut a = MergedRow::empty(None, q(2020, 1));
        a.set(Metric::CpiIndex, Some(120.0));
        let b = MergedRow::empty(None, q(2020, 2));
        let table = MergedTable::new(vec![a, b]);
        assert_eq!(
            table.quarters_with(Metric::CpiIndex).into_iter().collect::<Vec<_>>(),
            vec![q(2020, 1)]
        );
        assert_eq!(table.quarters(), vec![q(2020, 1), q(2020, 2)]);
    }
}
