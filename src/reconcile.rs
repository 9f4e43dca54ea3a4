//! Column reconciliation: align uploaded headers with canonical names.
//!
//! Each column is tried, in input order, against prior resolutions (session
//! first, then the store), then a case-insensitive exact alias match, then
//! (optionally) fuzzy similarity. A canonical name claimed by an earlier
//! column is unavailable to later ones, so one pass never maps two columns to
//! the same canonical field.

use std::collections::HashSet;

use log::debug;
use serde::Serialize;
use similar::{DiffOp, TextDiff};

use crate::{config::DEFAULT_FUZZY_THRESHOLD, schema::CanonicalSchema, session::ColumnMapping};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    pub fuzzy: bool,
    /// Candidates must score strictly above this ratio.
    pub threshold: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            fuzzy: true,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    /// Resolved earlier in this session.
    Session,
    /// Resolved in an earlier session and persisted.
    Stored,
    /// Equal to a known alias ignoring case.
    Exact,
    Fuzzy { score: f64 },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnMatch {
    pub original: String,
    pub canonical: String,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Reconciliation {
    pub matches: Vec<ColumnMatch>,
    /// Columns with no automatic match, in input order.
    pub unmatched: Vec<String>,
    /// Canonical names nobody claimed, in first-seen order.
    pub unclaimed: Vec<String>,
}

impl Reconciliation {
    pub fn rename_map(&self) -> Vec<(String, String)> {
        self.matches
            .iter()
            .map(|m| (m.original.clone(), m.canonical.clone()))
            .collect()
    }

    pub fn canonical_for(&self, original: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.original == original)
            .map(|m| m.canonical.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Similarity ratio in `0..=1` between two header names, ignoring case and
/// surrounding whitespace. `2 * matches / total_len`, as in classic sequence
/// matchers.
pub fn similarity(left: &str, right: &str) -> f64 {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    let total = left.chars().count() + right.chars().count();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = TextDiff::from_chars(left.as_str(), right.as_str())
        .ops()
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();
    // Computed in f64 so 4 of 5 shared characters equals 0.8 exactly.
    (2 * matched) as f64 / total as f64
}

pub fn reconcile(
    columns: &[String],
    schema: &CanonicalSchema,
    session: &ColumnMapping,
    options: &ReconcileOptions,
) -> Reconciliation {
    let canonical_names = schema.canonical_names();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut outcome = Reconciliation::default();

    for column in columns {
        match match_column(column, schema, session, options, &canonical_names, &claimed) {
            Some((canonical, kind)) => {
                debug!("Matched '{column}' -> '{canonical}' ({kind:?})");
                claimed.insert(canonical.clone());
                outcome.matches.push(ColumnMatch {
                    original: column.clone(),
                    canonical,
                    kind,
                });
            }
            None => {
                debug!("No automatic match for '{column}'");
                outcome.unmatched.push(column.clone());
            }
        }
    }

    outcome.unclaimed = canonical_names
        .into_iter()
        .filter(|name| !claimed.contains(name))
        .collect();
    outcome
}

fn match_column(
    column: &str,
    schema: &CanonicalSchema,
    session: &ColumnMapping,
    options: &ReconcileOptions,
    canonical_names: &[String],
    claimed: &HashSet<String>,
) -> Option<(String, MatchKind)> {
    if let Some(canonical) = session.get(column)
        && !claimed.contains(canonical)
    {
        return Some((canonical.to_string(), MatchKind::Session));
    }
    if let Some(canonical) = schema.stored_resolution(column)
        && !claimed.contains(canonical)
    {
        return Some((canonical.to_string(), MatchKind::Stored));
    }

    let exact = schema.case_insensitive_matches(column);
    if !exact.is_empty() {
        // An exact alias hit is never second-guessed by fuzzy scoring.
        return exact
            .into_iter()
            .find(|canonical| !claimed.contains(*canonical))
            .map(|canonical| (canonical.to_string(), MatchKind::Exact));
    }

    if !options.fuzzy {
        return None;
    }
    best_fuzzy_candidate(column, schema, canonical_names, claimed, options.threshold)
        .map(|(canonical, score)| (canonical, MatchKind::Fuzzy { score }))
}

fn best_fuzzy_candidate(
    column: &str,
    schema: &CanonicalSchema,
    canonical_names: &[String],
    claimed: &HashSet<String>,
    threshold: f64,
) -> Option<(String, f64)> {
    let mut best: Option<(String, f64)> = None;
    for canonical in canonical_names {
        if claimed.contains(canonical) {
            continue;
        }
        let score = schema
            .aliases_for(canonical)
            .map(|alias| similarity(column, alias))
            .fold(0.0_f64, f64::max);
        if score <= threshold {
            continue;
        }
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((canonical.clone(), score));
        }
    }
    best
}
