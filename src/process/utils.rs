/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Markers statistical agencies use for "no value".
const MISSING: &[&str] = &["", "-", "--", "..", "na", "n/a", "nan", "null", "none", "x"];

/// Lenient numeric cell parser:
/// - outer quotes / whitespace trimmed
/// - thousands separators and a trailing `%` removed
/// - missing-value markers and non-finite values → `None`
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if MISSING.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return None;
    }
    let digits: String = cleaned
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lowercase alphanumerics only: `"Youth_Unemp Rate (%)"` → `"youthunemprate"`.
pub fn loose_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Arithmetic mean of the present values; `None` when there are none.
pub fn mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_and_space() {
        assert_eq!(clean_str("  \" Johor \" "), "Johor");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn parses_agency_numbers() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("\"1,234.5\""), Some(1234.5));
        assert_eq!(parse_number("3.1%"), Some(3.1));
        assert_eq!(parse_number("-0.4"), Some(-0.4));
        for missing in ["", "  ", "-", "..", "NA", "n/a", "NaN", "null"] {
            assert_eq!(parse_number(missing), None, "{missing:?}");
        }
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("high"), None);
    }

    #[test]
    fn loose_key_strips_punctuation() {
        assert_eq!(loose_key("Youth_Unemp Rate (%)"), "youthunemprate");
        assert_eq!(loose_key("p_rate"), "prate");
    }

    #[test]
    fn mean_skips_missing() {
        assert_eq!(mean([Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean([None, None]), None);
    }
}
