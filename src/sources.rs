//! The optional typed inputs of the pipeline. Each slot knows which semantic
//! columns to look for and which canonical metrics it feeds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSlot {
    YouthUnemployment,
    SkillsUnderemployment,
    TimeUnderemployment,
    LabourForceState,
    CpiState,
    HouseholdIncomeState,
    Productivity,
}

/// Whether a source is keyed by quarter only or by `(state, quarter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    National,
    State,
}

/// How a record's date is projected onto quarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Monthly or quarterly: one record, one quarter.
    SubAnnual,
    /// Yearly: one record fills all four quarters of its year.
    Annual,
}

/// A measurement column a slot extracts.
#[derive(Debug, Clone, Copy)]
pub struct Measure {
    pub metric: Metric,
    /// Domain-specific alternatives tried after the canonical name.
    pub fallbacks: &'static [&'static str],
    /// The primary measure may fall back to the second column.
    pub primary: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub level: Level,
    pub cadence: Cadence,
    pub measures: &'static [Measure],
    /// Columns that may carry sub-population breakdowns.
    pub category_keys: &'static [&'static str],
}

pub const DATE_KEY: &str = "date";
pub const DATE_FALLBACKS: &[&str] = &["quarter", "period", "tarikh", "month", "year"];

pub const STATE_KEY: &str = "state";
pub const STATE_FALLBACKS: &[&str] = &["negeri", "state_name", "region"];

const BREAKDOWNS: &[&str] = &[
    "age",
    "age_group",
    "kumpulan_umur",
    "umur",
    "sex",
    "jantina",
    "category",
    "kategori",
    "group",
];

const YOUTH: &[Measure] = &[Measure {
    metric: Metric::YouthUnempRate,
    fallbacks: &["u_rate", "unemployment_rate", "unemployment", "rate"],
    primary: true,
}];

const SKILLS: &[Measure] = &[Measure {
    metric: Metric::SkillsUnderempRate,
    fallbacks: &["skills_rate", "skills_related", "skills", "underemployment", "rate"],
    primary: true,
}];

const TIME: &[Measure] = &[Measure {
    metric: Metric::TimeUnderempRate,
    fallbacks: &["time_rate", "time_related", "underemployment", "rate"],
    primary: true,
}];

const LABOUR_FORCE: &[Measure] = &[
    Measure {
        metric: Metric::PRate,
        fallbacks: &["participation", "lfpr", "participation_rate"],
        primary: true,
    },
    Measure {
        metric: Metric::URate,
        fallbacks: &["unemployment", "unemployment_rate"],
        primary: false,
    },
];

const CPI: &[Measure] = &[Measure {
    metric: Metric::CpiIndex,
    fallbacks: &["index", "cpi", "value"],
    primary: true,
}];

const INCOME: &[Measure] = &[Measure {
    metric: Metric::IncomeMean,
    fallbacks: &["income", "mean", "purata"],
    primary: true,
}];

const PRODUCTIVITY: &[Measure] = &[Measure {
    metric: Metric::Productivity,
    fallbacks: &["output_per_worker", "output_hour", "value"],
    primary: true,
}];

impl SourceSlot {
    pub const ALL: [SourceSlot; 7] = [
        SourceSlot::YouthUnemployment,
        SourceSlot::SkillsUnderemployment,
        SourceSlot::TimeUnderemployment,
        SourceSlot::LabourForceState,
        SourceSlot::CpiState,
        SourceSlot::HouseholdIncomeState,
        SourceSlot::Productivity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceSlot::YouthUnemployment => "youth_unemployment",
            SourceSlot::SkillsUnderemployment => "skills_underemployment",
            SourceSlot::TimeUnderemployment => "time_underemployment",
            SourceSlot::LabourForceState => "labour_force_state",
            SourceSlot::CpiState => "cpi_state",
            SourceSlot::HouseholdIncomeState => "household_income_state",
            SourceSlot::Productivity => "productivity",
        }
    }

    /// Lenient lookup used for bundle entries: case and `-`/space vs `_` ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        Self::ALL.into_iter().find(|s| s.name() == wanted)
    }

    pub fn spec(&self) -> SourceSpec {
        use Cadence::*;
        use Level::*;
        match self {
            SourceSlot::YouthUnemployment => SourceSpec {
                level: National,
                cadence: SubAnnual,
                measures: YOUTH,
                category_keys: BREAKDOWNS,
            },
            SourceSlot::SkillsUnderemployment => SourceSpec {
                level: National,
                cadence: SubAnnual,
                measures: SKILLS,
                category_keys: BREAKDOWNS,
            },
            SourceSlot::TimeUnderemployment => SourceSpec {
                level: National,
                cadence: SubAnnual,
                measures: TIME,
                category_keys: BREAKDOWNS,
            },
            SourceSlot::LabourForceState => SourceSpec {
                level: State,
                cadence: SubAnnual,
                measures: LABOUR_FORCE,
                category_keys: BREAKDOWNS,
            },
            SourceSlot::CpiState => SourceSpec {
                level: State,
                cadence: SubAnnual,
                measures: CPI,
                category_keys: &["division", "category", "group"],
            },
            SourceSlot::HouseholdIncomeState => SourceSpec {
                level: State,
                cadence: Annual,
                measures: INCOME,
                category_keys: &["strata", "category"],
            },
            SourceSlot::Productivity => SourceSpec {
                level: National,
                cadence: Annual,
                measures: PRODUCTIVITY,
                category_keys: &["sector", "category"],
            },
        }
    }

    /// The metrics this slot contributes to the published table.
    pub fn metrics(&self) -> Vec<Metric> {
        self.spec().measures.iter().map(|m| m.metric).collect()
    }
}

impl fmt::Display for SourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
