//! Per-upload state shared by the pipeline stages.
//!
//! A [`Session`] owns the uploaded table and the mappings resolved so far.
//! Starting a new upload resets it with a fresh id so nothing leaks between
//! files.

use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::IngestResult,
    grid::UploadedTable,
    reconcile::{MatchKind, Reconciliation},
    resolver::{MappingResolver, Resolution},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEntry {
    pub original: String,
    pub canonical: String,
}

/// Original column name to canonical name, in resolution order. Entries are
/// only ever added during a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        ColumnMapping::default()
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.original == original)
            .map(|entry| entry.canonical.as_str())
    }

    /// Records a resolution. Returns `false` when `original` was already mapped.
    pub fn record(&mut self, original: impl Into<String>, canonical: impl Into<String>) -> bool {
        let original = original.into();
        if self.get(&original).is_some() {
            return false;
        }
        self.entries.push(MappingEntry {
            original,
            canonical: canonical.into(),
        });
        true
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|entry| (entry.original.clone(), entry.canonical.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O: Into<String>, C: Into<String>> FromIterator<(O, C)> for ColumnMapping {
    fn from_iter<T: IntoIterator<Item = (O, C)>>(iter: T) -> Self {
        let mut mapping = ColumnMapping::new();
        for (original, canonical) in iter {
            mapping.record(original, canonical);
        }
        mapping
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    source_name: String,
    table: UploadedTable,
    /// Interactive resolutions; these are what gets persisted.
    mapping: ColumnMapping,
    /// Automatic matches applied to the table.
    matched: Vec<(String, String)>,
}

impl Session {
    pub fn start(source_name: impl Into<String>, table: UploadedTable) -> Self {
        let session = Session {
            id: Uuid::new_v4(),
            source_name: source_name.into(),
            table,
            mapping: ColumnMapping::new(),
            matched: Vec::new(),
        };
        debug!("Session {} started for '{}'", session.id, session.source_name);
        session
    }

    /// Drops every resolution and adopts a new upload.
    pub fn reset(&mut self, source_name: impl Into<String>, table: UploadedTable) {
        *self = Session::start(source_name, table);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn table(&self) -> &UploadedTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut UploadedTable {
        &mut self.table
    }

    pub fn into_table(self) -> UploadedTable {
        self.table
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Renames every automatically matched column.
    ///
    /// An unmatched column already named after a claimed canonical field is
    /// first moved to a suffixed name; `outcome.unmatched` follows the move so
    /// the resolver asks about the name the table now holds.
    pub fn apply_reconciliation(&mut self, outcome: &mut Reconciliation) -> IngestResult<()> {
        let targets: HashSet<&str> = outcome
            .matches
            .iter()
            .map(|m| m.canonical.as_str())
            .collect();
        for column in outcome.unmatched.iter_mut() {
            if !targets.contains(column.as_str()) {
                continue;
            }
            let moved = self
                .table
                .available_name(column, |name| targets.contains(name));
            self.table.rename_column(column, &moved)?;
            warn!("Column '{column}' clashes with a matched column; it is now '{moved}'");
            *column = moved;
        }
        self.table.rename_columns(
            outcome
                .matches
                .iter()
                .map(|m| (m.original.as_str(), m.canonical.as_str())),
        )?;
        for matched in &outcome.matches {
            if matched.kind == MatchKind::Session {
                self.mapping
                    .record(matched.original.clone(), matched.canonical.clone());
            } else {
                self.matched
                    .push((matched.original.clone(), matched.canonical.clone()));
            }
        }
        Ok(())
    }

    /// Feeds one answer to the resolver; a resolved column is renamed in the
    /// table and recorded in the mapping straight away.
    pub fn resolve(
        &mut self,
        resolver: &mut MappingResolver,
        column: &str,
        selection: Option<&str>,
    ) -> IngestResult<Resolution> {
        let resolution = resolver.resolve(column, selection)?;
        if let Resolution::Resolved {
            original,
            canonical,
        } = &resolution
        {
            self.table.rename_column(original, canonical)?;
            self.mapping.record(original.clone(), canonical.clone());
        }
        Ok(resolution)
    }

    /// Every rename applied so far: automatic matches, then resolutions.
    pub fn rename_map(&self) -> Vec<(String, String)> {
        self.matched
            .iter()
            .cloned()
            .chain(self.mapping.pairs())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Cell,
        reconcile::{ReconcileOptions, reconcile},
        schema::{CanonicalSchema, EntryOrigin},
    };

    fn table() -> UploadedTable {
        UploadedTable::new(
            vec!["Month of Report".into(), "XYZ".into()],
            vec![vec![Cell::text("Jan-24"), Cell::Integer(3)]],
        )
    }

    #[test]
    fn mapping_keeps_first_resolution() {
        let mut mapping = ColumnMapping::new();
        assert!(mapping.record("XYZ", "netRev"));
        assert!(!mapping.record("XYZ", "grossRev"));
        assert_eq!(mapping.get("XYZ"), Some("netRev"));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn unmatched_column_named_like_a_claimed_field_is_moved_aside() {
        let schema = CanonicalSchema::from_pairs(
            [("Land", "country"), ("country", "country")],
            EntryOrigin::Dictionary,
        );
        let table = UploadedTable::new(
            vec!["Land".into(), "country".into()],
            vec![vec![Cell::text("DE"), Cell::text("Germany")]],
        );
        let mut session = Session::start("r.csv", table);
        let mut outcome = reconcile(
            session.table().headers(),
            &schema,
            session.mapping(),
            &ReconcileOptions::default(),
        );
        assert_eq!(outcome.unmatched, vec!["country"]);

        session.apply_reconciliation(&mut outcome).unwrap();
        assert_eq!(session.table().headers(), &["country", "country_2"]);
        assert_eq!(outcome.unmatched, vec!["country_2"]);
        assert_eq!(
            session.table().rows()[0],
            vec![Cell::text("DE"), Cell::text("Germany")]
        );

        let mut resolver = MappingResolver::from_reconciliation(&outcome);
        assert!(resolver.prompt_for("country_2").is_ok());
        let resolution = session.resolve(&mut resolver, "country_2", None).unwrap();
        assert!(matches!(resolution, Resolution::Pending { .. }));
    }

    #[test]
    fn reset_issues_new_id_and_clears_mapping() {
        let mut session = Session::start("a.xlsx", table());
        let first = session.id();
        session.mapping.record("XYZ", "netRev");
        session.reset("b.xlsx", table());
        assert_ne!(session.id(), first);
        assert!(session.mapping().is_empty());
        assert_eq!(session.source_name(), "b.xlsx");
    }
}
