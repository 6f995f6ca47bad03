use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Unparseable;
use crate::process::utils::clean_str;
use crate::quarter::QuarterKey;
use crate::sources::Cadence;

/// `Q3 2021`, `Q32021`, `q3-2021`
static QUARTER_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Q([1-4])\s*[-/ ]?\s*(\d{4})$").expect("valid regex"));

/// `2021-08`, `2021/8`
static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("valid regex"));

/// `2021`, `2021.0` (a year column that went through a float cast)
static BARE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:\.0+)?$").expect("valid regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Project a raw date cell onto its quarter.
///
/// Quarter labels (`2021Q3`, `2021-Q3`, `Q3 2021`, ...) are taken as-is; anything
/// parseable as a calendar date maps month `m` to quarter `ceil(m / 3)`.
pub fn to_quarter(raw: &str) -> Result<QuarterKey, Unparseable> {
    let s = clean_str(raw);
    if s.is_empty() {
        return Err(Unparseable(raw.to_string()));
    }

    if let Ok(q) = s.parse::<QuarterKey>() {
        return Ok(q);
    }
    if let Some(caps) = QUARTER_FIRST.captures(&s) {
        let quarter: u8 = caps[1].parse().map_err(|_| Unparseable(raw.to_string()))?;
        let year: i32 = caps[2].parse().map_err(|_| Unparseable(raw.to_string()))?;
        return QuarterKey::new(year, quarter).ok_or_else(|| Unparseable(raw.to_string()));
    }

    parse_calendar_date(&s)
        .map(QuarterKey::from_date)
        .ok_or_else(|| Unparseable(raw.to_string()))
}

/// Calendar year of an annual record; a bare `YYYY` is accepted here only.
pub fn to_year(raw: &str) -> Result<i32, Unparseable> {
    let s = clean_str(raw);
    if let Some(caps) = BARE_YEAR.captures(&s) {
        return caps[1].parse().map_err(|_| Unparseable(raw.to_string()));
    }
    to_quarter(&s).map(|q| q.year())
}

/// All quarters a record covers under `cadence`.
pub fn to_periods(raw: &str, cadence: Cadence) -> Result<Vec<QuarterKey>, Unparseable> {
    match cadence {
        Cadence::SubAnnual => to_quarter(raw).map(|q| vec![q]),
        Cadence::Annual => to_year(raw).map(|y| QuarterKey::quarters_of(y).to_vec()),
    }
}

fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Some(caps) = YEAR_MONTH.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    // "Aug 2021" / "August 2021"
    let with_day = format!("1 {}", s);
    ["%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&with_day, fmt).ok())
}
