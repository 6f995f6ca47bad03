use std::collections::BTreeSet;
use tracing::info;

use crate::error::TrimError;
use crate::quarter::QuarterKey;
use crate::schema::{MergedTable, Metric};

/// Restrict `table` to the quarters in which every `core` metric is non-null
/// in at least one row. An empty `core` leaves the table as is.
pub fn trim_to_core(table: &MergedTable, core: &[Metric]) -> Result<MergedTable, TrimError> {
    if core.is_empty() {
        return Ok(table.clone());
    }

    let empty: Vec<Metric> = core
        .iter()
        .copied()
        .filter(|m| table.quarters_with(*m).is_empty())
        .collect();
    if !empty.is_empty() {
        return Err(TrimError::EmptyIntersection { empty });
    }

    let mut keep: Option<BTreeSet<QuarterKey>> = None;
    for metric in core {
        let with = table.quarters_with(*metric);
        keep = Some(match keep {
            None => with,
            Some(acc) => acc.intersection(&with).copied().collect(),
        });
    }
    let keep = keep.unwrap_or_default();
    if keep.is_empty() {
        return Err(TrimError::EmptyIntersection { empty: Vec::new() });
    }

    let trimmed = table.retain_quarters(&keep);
    info!(
        before = table.len(),
        after = trimmed.len(),
        first = ?keep.first(),
        last = ?keep.last(),
        "trimmed to core coverage"
    );
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MergedRow;

    fn q(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    fn table(rows: &[(u8, Option<f64>, Option<f64>)]) -> MergedTable {
        MergedTable::new(
            rows.iter()
                .map(|&(quarter, youth, skills)| {
                    let mut r = MergedRow::empty(None, q(2020, quarter));
                    r.youth_unemp_rate = youth;
                    r.skills_underemp_rate = skills;
                    r
                })
                .collect(),
        )
    }

    const CORE: [Metric; 2] = [Metric::YouthUnempRate, Metric::SkillsUnderempRate];

    #[test]
    fn keeps_only_jointly_covered_quarters() -> Result<(), TrimError> {
        let t = table(&[
            (1, Some(1.0), None),
            (2, Some(1.0), Some(2.0)),
            (3, Some(1.0), Some(2.0)),
            (4, Some(1.0), None),
        ]);
        let trimmed = trim_to_core(&t, &CORE)?;
        assert_eq!(trimmed.quarters(), vec![q(2020, 2), q(2020, 3)]);
        for row in trimmed.rows() {
            assert!(CORE.iter().all(|m| row.get(*m).is_some()));
        }
        Ok(())
    }

    #[test]
    fn disjoint_coverage_is_an_empty_intersection() {
        let t = table(&[(1, Some(1.0), None), (2, None, Some(2.0))]);
        assert_eq!(
            trim_to_core(&t, &CORE),
            Err(TrimError::EmptyIntersection { empty: vec![] })
        );
    }

    #[test]
    fn metric_without_data_is_named() {
        let t = table(&[(1, Some(1.0), None)]);
        assert_eq!(
            trim_to_core(&t, &CORE),
            Err(TrimError::EmptyIntersection {
                empty: vec![Metric::SkillsUnderempRate]
            })
        );
    }

    #[test]
    fn empty_core_is_a_no_op() -> Result<(), TrimError> {
        let t = table(&[(1, Some(1.0), None)]);
        assert_eq!(trim_to_core(&t, &[])?, t);
        Ok(())
    }
}
