//! Best-effort header detection: an ordered list of matchers, each with a
//! confidence tier. Callers pick the weakest tier they are willing to accept.

use std::collections::BTreeSet;

use crate::error::SourceError;
use crate::process::utils::loose_key;

/// Confidence of a column match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    /// Equal once case, spaces and punctuation are stripped.
    Normalized,
    /// Punctuation-stripped substring containment, either direction.
    Loose,
    /// Fixed column position; a degraded-mode guess.
    Positional,
}

impl MatchTier {
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, MatchTier::Positional)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub index: usize,
    pub name: String,
    pub tier: MatchTier,
    /// The fallback alias that matched, if the semantic key itself did not.
    pub via: Option<String>,
}

type Matcher = fn(&str, &str) -> bool;

const MATCHERS: [(MatchTier, Matcher); 4] = [
    (MatchTier::Exact, exact),
    (MatchTier::CaseInsensitive, case_insensitive),
    (MatchTier::Normalized, normalized),
    (MatchTier::Loose, loose),
];

fn exact(key: &str, column: &str) -> bool {
    key == column
}

fn case_insensitive(key: &str, column: &str) -> bool {
    key.trim().to_lowercase() == column.trim().to_lowercase()
}

fn normalized(key: &str, column: &str) -> bool {
    let k = loose_key(key);
    !k.is_empty() && k == loose_key(column)
}

fn loose(key: &str, column: &str) -> bool {
    let (k, c) = (loose_key(key), loose_key(column));
    !k.is_empty() && !c.is_empty() && (c.contains(&k) || k.contains(&c))
}

/// Resolve `key` against `columns` with every name-based strategy, first hit wins.
pub fn resolve(columns: &[String], key: &str) -> Option<Resolved> {
    ColumnResolver::new(columns).find(key, &[], MatchTier::Loose)
}

/// Resolves several keys against one source's headers. A column claimed by
/// one key is not offered to later keys.
#[derive(Debug)]
pub struct ColumnResolver<'a> {
    columns: &'a [String],
    claimed: BTreeSet<usize>,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(columns: &'a [String]) -> Self {
        Self {
            columns,
            claimed: BTreeSet::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        self.columns
    }

    /// Steps 1–4: the key through every matcher up to `accept`, then each
    /// fallback alias through the same matchers.
    pub fn find(&self, key: &str, fallbacks: &[&str], accept: MatchTier) -> Option<Resolved> {
        if let Some((index, tier)) = self.run_matchers(key, accept) {
            return Some(self.resolved(index, tier, None));
        }
        fallbacks.iter().find_map(|alias| {
            self.run_matchers(alias, accept)
                .map(|(index, tier)| self.resolved(index, tier, Some(alias.to_string())))
        })
    }

    /// Like `find`, then step 5: fall back to the first unclaimed column at or
    /// after `position` when `accept` allows positional matches. Errors with
    /// `ColumnNotFound` otherwise.
    pub fn require(
        &self,
        key: &str,
        fallbacks: &[&str],
        accept: MatchTier,
        position: Option<usize>,
    ) -> Result<Resolved, SourceError> {
        if let Some(found) = self.find(key, fallbacks, accept) {
            return Ok(found);
        }
        if accept >= MatchTier::Positional {
            let free = position.and_then(|start| {
                (start..self.columns.len()).find(|i| !self.claimed.contains(i))
            });
            if let Some(index) = free {
                return Ok(self.resolved(index, MatchTier::Positional, None));
            }
        }
        Err(SourceError::ColumnNotFound {
            key: key.to_string(),
            available: self.columns.to_vec(),
        })
    }

    pub fn claim(&mut self, resolved: &Resolved) {
        self.claimed.insert(resolved.index);
    }

    fn run_matchers(&self, key: &str, accept: MatchTier) -> Option<(usize, MatchTier)> {
        MATCHERS
            .iter()
            .filter(|(tier, _)| *tier <= accept)
            .find_map(|(tier, matches)| {
                self.columns
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !self.claimed.contains(i))
                    .find(|(_, column)| matches(key, column))
                    .map(|(i, _)| (i, *tier))
            })
    }

    fn resolved(&self, index: usize, tier: MatchTier, via: Option<String>) -> Resolved {
        Resolved {
            index,
            name: self.columns[index].clone(),
            tier,
            via,
        }
    }
}
