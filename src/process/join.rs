use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::process::aggregate::QuarterlyFrame;
use crate::quarter::QuarterKey;
use crate::schema::{MergedRow, MergedTable, Metric, NationalQuarterRow, StateQuarterRow};
use crate::sources::SourceSlot;

/// Merge order of the national pass. Outer joins commute, the order only
/// pins down iteration for reproducible logs.
pub const NATIONAL_ORDER: [SourceSlot; 4] = [
    SourceSlot::YouthUnemployment,
    SourceSlot::SkillsUnderemployment,
    SourceSlot::TimeUnderemployment,
    SourceSlot::Productivity,
];

pub const STATE_ORDER: [SourceSlot; 3] = [
    SourceSlot::LabourForceState,
    SourceSlot::CpiState,
    SourceSlot::HouseholdIncomeState,
];

/// Relative YMI weights. Always divided by the sum of the weights used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub youth: f64,
    pub skills: f64,
    pub time: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            youth: 0.6,
            skills: 0.3,
            time: 0.1,
        }
    }
}

/// 0.6 + 0.3 + 0.1 lands one ulp below 1.0.
const UNIT_TOLERANCE: f64 = 4.0 * f64::EPSILON;

impl Weights {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let all = [self.youth, self.skills, self.time];
        if let Some(bad) = all.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(PipelineError::InvalidWeights(format!(
                "weights must be finite and non-negative, got {}",
                bad
            )));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(PipelineError::InvalidWeights(
                "weights sum to zero".to_string(),
            ));
        }
        Ok(())
    }

    fn pairs(&self, youth: Option<f64>, skills: Option<f64>, time: Option<f64>) -> [(f64, Option<f64>); 3] {
        [(self.youth, youth), (self.skills, skills), (self.time, time)]
    }

    /// Null when any component is null.
    pub fn ymi(&self, youth: Option<f64>, skills: Option<f64>, time: Option<f64>) -> Option<f64> {
        let pairs = self.pairs(youth, skills, time);
        if pairs.iter().any(|(_, x)| x.is_none()) {
            return None;
        }
        self.ymi_available(youth, skills, time)
    }

    /// Renormalized over the weights of the components that are present.
    /// Weights already summing to one give the plain linear combination.
    pub fn ymi_available(
        &self,
        youth: Option<f64>,
        skills: Option<f64>,
        time: Option<f64>,
    ) -> Option<f64> {
        let (num, den) = self
            .pairs(youth, skills, time)
            .iter()
            .filter_map(|(w, x)| x.map(|x| (w * x, *w)))
            .fold((0.0, 0.0), |(n, d), (wx, w)| (n + wx, d + w));
        if (den - 1.0).abs() <= UNIT_TOLERANCE {
            return Some(num);
        }
        (den > 0.0).then(|| num / den)
    }
}

/// Outer join of the national frames on quarter, then YMI per row.
pub fn national_pass(
    frames: &BTreeMap<SourceSlot, QuarterlyFrame>,
    weights: &Weights,
) -> BTreeMap<QuarterKey, NationalQuarterRow> {
    let mut rows: BTreeMap<QuarterKey, NationalQuarterRow> = BTreeMap::new();
    for slot in NATIONAL_ORDER {
        let Some(frame) = frames.get(&slot) else {
            continue;
        };
        for (key, values) in &frame.rows {
            let row = rows.entry(key.quarter).or_default();
            for (metric, value) in frame.entries(values) {
                row.set(metric, value);
            }
        }
        debug!(%slot, quarters = rows.len(), "national pass merged");
    }
    for row in rows.values_mut() {
        row.ymi = weights.ymi(
            row.youth_unemp_rate,
            row.skills_underemp_rate,
            row.time_underemp_rate,
        );
    }
    rows
}

/// Outer join of the state frames on `(state, quarter)`.
pub fn state_pass(
    frames: &BTreeMap<SourceSlot, QuarterlyFrame>,
) -> BTreeMap<(String, QuarterKey), StateQuarterRow> {
    let mut rows: BTreeMap<(String, QuarterKey), StateQuarterRow> = BTreeMap::new();
    for slot in STATE_ORDER {
        let Some(frame) = frames.get(&slot) else {
            continue;
        };
        for (key, values) in &frame.rows {
            let Some(state) = &key.state else {
                debug!(%slot, quarter = %key.quarter, "state frame row without state");
                continue;
            };
            let row = rows.entry((state.clone(), key.quarter)).or_default();
            for (metric, value) in frame.entries(values) {
                row.set(metric, value);
            }
        }
        debug!(%slot, keys = rows.len(), "state pass merged");
    }
    rows
}

/// Every state row inherits the national figures of its quarter. National
/// quarters no state row covers become rows with no state.
pub fn broadcast(
    national: &BTreeMap<QuarterKey, NationalQuarterRow>,
    states: &BTreeMap<(String, QuarterKey), StateQuarterRow>,
) -> MergedTable {
    let mut rows = Vec::with_capacity(states.len() + national.len());
    let mut covered = BTreeSet::new();
    for ((state, quarter), local) in states {
        covered.insert(*quarter);
        rows.push(MergedRow::from_parts(
            Some(state.clone()),
            *quarter,
            Some(local),
            national.get(quarter),
        ));
    }
    for (quarter, n) in national {
        if !covered.contains(quarter) {
            rows.push(MergedRow::from_parts(None, *quarter, None, Some(n)));
        }
    }
    MergedTable::new(rows)
}

/// National pass, state pass, broadcast.
pub fn join(frames: &BTreeMap<SourceSlot, QuarterlyFrame>, weights: &Weights) -> MergedTable {
    let national = national_pass(frames, weights);
    let states = state_pass(frames);
    let table = broadcast(&national, &states);
    info!(
        national_quarters = national.len(),
        state_keys = states.len(),
        rows = table.len(),
        with_ymi = table.quarters_with(Metric::Ymi).len(),
        "joined sources"
    );
    table
}
