use arrow::array::{Array, StringArray};
use std::collections::BTreeSet;

use crate::error::NoOverallCategoryFound;
use crate::process::utils::clean_str;

/// Case-folded labels meaning "every sub-population".
pub const OVERALL_ALIASES: &[&str] = &[
    "overall",
    "all",
    "all ages",
    "total",
    "both sexes",
    "both",
    "semua",
    "semua umur",
    "keseluruhan",
    "jumlah",
];

pub fn is_overall(value: &str) -> bool {
    let folded = clean_str(value).to_lowercase();
    OVERALL_ALIASES.contains(&folded.as_str())
}

/// Narrow `rows` (indices into `category`) to those labelled overall.
///
/// With no category column the rows pass through. When the column exists but
/// no row carries an overall label the caller gets `NoOverallCategoryFound`
/// and decides whether to proceed unfiltered.
pub fn filter_overall(
    rows: Vec<usize>,
    column: &str,
    category: Option<&StringArray>,
) -> Result<Vec<usize>, NoOverallCategoryFound> {
    let Some(values) = category else {
        return Ok(rows);
    };
    if rows.is_empty() {
        return Ok(rows);
    }

    let kept: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&i| values.is_valid(i) && is_overall(values.value(i)))
        .collect();

    if kept.is_empty() {
        let seen: BTreeSet<String> = rows
            .iter()
            .filter(|&&i| values.is_valid(i))
            .map(|&i| clean_str(values.value(i)))
            .take(50)
            .collect();
        return Err(NoOverallCategoryFound {
            column: column.to_string(),
            seen: seen.into_iter().take(8).collect(),
        });
    }
    Ok(kept)
}
