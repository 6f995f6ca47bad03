// src/quarter.rs

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::Unparseable;

/// `2021Q3`, `2021-Q3`, `2021 q3`
static YEAR_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{4})\s*[-/ ]?\s*Q([1-4])$").expect("valid regex"));

/// Canonical period identifier. Ordering is by `(year, quarter)`, never by label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QuarterKey {
    year: i32,
    quarter: u8,
}

impl QuarterKey {
    /// Returns `None` unless `quarter` is in `1..=4`.
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    /// Month `m` lands in quarter `ceil(m / 3)`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: ((date.month() - 1) / 3 + 1) as u8,
        }
    }

    /// All four quarters of `year`, in order.
    pub fn quarters_of(year: i32) -> [Self; 4] {
        [1, 2, 3, 4].map(|quarter| Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }

    /// Inclusive range `from..=to`; empty when `from > to`.
    pub fn range_inclusive(from: Self, to: Self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut q = from;
        while q <= to {
            out.push(q);
            q = q.next();
        }
        out
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}Q{}", self.year, self.quarter)
    }
}

impl FromStr for QuarterKey {
    type Err = Unparseable;

    /// Accepts the canonical label and its year-first variants only; the
    /// lenient parser lives in `process::date_parser`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = YEAR_FIRST
            .captures(s.trim())
            .ok_or_else(|| Unparseable(s.to_string()))?;
        let year: i32 = caps[1].parse().map_err(|_| Unparseable(s.to_string()))?;
        let quarter: u8 = caps[2].parse().map_err(|_| Unparseable(s.to_string()))?;
        Self::new(year, quarter).ok_or_else(|| Unparseable(s.to_string()))
    }
}

impl From<QuarterKey> for String {
    fn from(q: QuarterKey) -> Self {
        q.to_string()
    }
}

impl TryFrom<String> for QuarterKey {
    type Error = Unparseable;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
