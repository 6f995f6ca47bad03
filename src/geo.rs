//! State-name harmonization. Sources spell states differently (`Penang`,
//! `P. Pinang`, `Pulau Pinang`); the state join needs one spelling.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::process::utils::{clean_str, loose_key};

/// Canonical spelling → accepted variants.
const STATES: &[(&str, &[&str])] = &[
    ("Johor", &["johore"]),
    ("Kedah", &[]),
    ("Kelantan", &[]),
    ("Melaka", &["malacca", "melaka"]),
    ("Negeri Sembilan", &["n sembilan", "negri sembilan", "n. sembilan"]),
    ("Pahang", &[]),
    ("Perak", &[]),
    ("Perlis", &[]),
    ("Pulau Pinang", &["penang", "p pinang", "p. pinang", "pinang"]),
    ("Sabah", &[]),
    ("Sarawak", &[]),
    ("Selangor", &[]),
    ("Terengganu", &["trengganu", "terenganu"]),
    (
        "W.P. Kuala Lumpur",
        &[
            "kuala lumpur",
            "wp kuala lumpur",
            "w.p. kuala lumpur",
            "wilayah persekutuan kuala lumpur",
            "federal territory of kuala lumpur",
            "kl",
        ],
    ),
    (
        "W.P. Labuan",
        &[
            "labuan",
            "wp labuan",
            "wilayah persekutuan labuan",
            "federal territory of labuan",
        ],
    ),
    (
        "W.P. Putrajaya",
        &[
            "putrajaya",
            "wp putrajaya",
            "wilayah persekutuan putrajaya",
            "federal territory of putrajaya",
        ],
    ),
];

/// Labels state-level tables use for their national total row.
const NATIONAL: &[&str] = &["malaysia", "national", "overall", "all states", "semua negeri"];

static ALIASES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (canonical, variants) in STATES {
        map.insert(loose_key(canonical), *canonical);
        for v in *variants {
            map.insert(loose_key(v), *canonical);
        }
    }
    map
});

/// Normalized lookup key for a raw state label.
pub fn state_key(raw: &str) -> String {
    loose_key(&clean_str(raw))
}

/// Canonical spelling of `raw`; unknown names come back trimmed.
pub fn canonical_state(raw: &str) -> String {
    match ALIASES.get(&state_key(raw)) {
        Some(canonical) => canonical.to_string(),
        None => clean_str(raw),
    }
}

/// True for a state-table row that actually holds the national figure.
pub fn is_national_aggregate(raw: &str) -> bool {
    let key = state_key(raw);
    NATIONAL.iter().any(|n| loose_key(n) == key)
}
