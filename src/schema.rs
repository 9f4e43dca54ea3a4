//! The canonical schema: ordered `(source name, canonical name)` pairs that
//! the reconciler matches uploaded headers against.
//!
//! Pairs come from two places. Rows already persisted in the mapping store
//! are [`EntryOrigin::Stored`] and count as prior resolutions; aliases from
//! the configured dictionary are [`EntryOrigin::Dictionary`]. Canonical names
//! may repeat across pairs (several aliases per field).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    Stored,
    Dictionary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaEntry {
    pub source: String,
    pub canonical: String,
    pub origin: EntryOrigin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalSchema {
    entries: Vec<SchemaEntry>,
}

impl CanonicalSchema {
    pub fn new() -> Self {
        CanonicalSchema::default()
    }

    pub fn from_pairs<I, S, C>(pairs: I, origin: EntryOrigin) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        let mut schema = CanonicalSchema::new();
        schema.extend(pairs, origin);
        schema
    }

    /// Store rows first, then the configured dictionary.
    pub fn assemble(stored: &[(String, String)], config: &Config) -> Self {
        let mut schema =
            CanonicalSchema::from_pairs(stored.iter().cloned(), EntryOrigin::Stored);
        schema.extend(config.alias_pairs(), EntryOrigin::Dictionary);
        schema
    }

    /// Appends pairs, skipping blanks and pairs already present.
    pub fn extend<I, S, C>(&mut self, pairs: I, origin: EntryOrigin)
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        for (source, canonical) in pairs {
            let source = source.into();
            let canonical = canonical.into();
            if source.trim().is_empty() || canonical.trim().is_empty() {
                continue;
            }
            let duplicate = self
                .entries
                .iter()
                .any(|entry| entry.source == source && entry.canonical == canonical);
            if duplicate {
                continue;
            }
            self.entries.push(SchemaEntry {
                source,
                canonical,
                origin,
            });
        }
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct canonical names in first-seen order.
    pub fn canonical_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| seen.insert(entry.canonical.as_str()))
            .map(|entry| entry.canonical.clone())
            .collect()
    }

    /// Source names recorded for one canonical field, in order.
    pub fn aliases_for<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.canonical == canonical)
            .map(|entry| entry.source.as_str())
    }

    /// Canonical name persisted for exactly this source name.
    pub fn stored_resolution(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.origin == EntryOrigin::Stored && entry.source == source)
            .map(|entry| entry.canonical.as_str())
    }

    /// Canonical names whose source equals `name` ignoring case, in order.
    pub fn case_insensitive_matches(&self, name: &str) -> Vec<&str> {
        let lowered = name.trim().to_lowercase();
        let mut found: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if entry.source.trim().to_lowercase() == lowered
                && !found.contains(&entry.canonical.as_str())
            {
                found.push(entry.canonical.as_str());
            }
        }
        found
    }

    /// Every source and canonical name, for header-row detection.
    pub fn header_tokens(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .flat_map(|entry| [entry.source.as_str(), entry.canonical.as_str()])
            .filter(|token| seen.insert(*token))
            .map(str::to_string)
            .collect()
    }
}
