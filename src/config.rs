//! Runtime configuration: database location, matching knobs, the canonical
//! alias dictionary, and the cleanup/derivation rules applied before loading.
//!
//! Every key is optional in the YAML file; missing keys fall back to the
//! compiled-in defaults, which describe the monthly data-partner revenue
//! report this tool was built around.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::derive::DerivedColumn;

pub const DEFAULT_DATABASE: &str = "revenue.db";
pub const DEFAULT_MAPPING_TABLE: &str = "report_columns";
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CleanupKind {
    /// Thousands separators removed, coerced to an integer.
    Count,
    /// Currency symbols and separators removed, coerced to a decimal.
    Amount,
    /// Normalized to a `YYYY-MM` token; other shapes are reported.
    Month,
    /// Whitespace and a leading `s` marker removed.
    SegmentId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupRule {
    pub column: String,
    pub kind: CleanupKind,
    #[serde(default = "CleanupRule::default_required")]
    pub required: bool,
}

impl CleanupRule {
    const fn default_required() -> bool {
        true
    }

    pub fn new(column: &str, kind: CleanupKind, required: bool) -> Self {
        CleanupRule {
            column: column.to_string(),
            kind,
            required,
        }
    }
}

/// One canonical field and the report headers known to mean it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalField {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: String,
    pub mapping_table: String,
    pub fuzzy: bool,
    pub fuzzy_threshold: f64,
    pub header_scan_rows: Option<usize>,
    pub preview_rows: usize,
    pub canonical: Vec<CanonicalField>,
    pub cleanup: Vec<CleanupRule>,
    pub derived: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DEFAULT_DATABASE.to_string(),
            mapping_table: DEFAULT_MAPPING_TABLE.to_string(),
            fuzzy: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            header_scan_rows: None,
            preview_rows: 5,
            canonical: default_canonical_fields(),
            cleanup: vec![
                CleanupRule::new("eMonth", CleanupKind::Month, true),
                CleanupRule::new("impressions", CleanupKind::Count, true),
                CleanupRule::new("segId", CleanupKind::SegmentId, false),
                CleanupRule::new("grossRev", CleanupKind::Amount, false),
                CleanupRule::new("netRev", CleanupKind::Amount, false),
                CleanupRule::new("cpm", CleanupKind::Amount, false),
            ],
            derived: vec![r#"eDate = eMonth + "-1""#.to_string()],
        }
    }
}

fn default_canonical_fields() -> Vec<CanonicalField> {
    const FIELDS: &[(&str, &[&str])] = &[
        (
            "eMonth",
            &["Month of Report", "month report", "report month", "month"],
        ),
        ("country", &["Country", "country name", "region"]),
        (
            "targetingProduct",
            &["Product Name", "product", "product type"],
        ),
        ("agencyOriginal", &["Adsquare Client", "client name", "agency"]),
        (
            "distribution",
            &["Activation Type", "activation", "distribution type"],
        ),
        (
            "dspOriginal",
            &["Platform Partner Name (DSP)", "platform partner", "dsp name"],
        ),
        (
            "monetisation",
            &["Monetisation Type", "monetization", "revenue type"],
        ),
        ("segId", &["External Dataset ID", "dataset id", "external id"]),
        (
            "cpm",
            &[
                "Net Dataset Price",
                "ATTRIBUTE CPM in EUR",
                "NET ATTRIBUTE CPM in EUR",
            ],
        ),
        (
            "impressions",
            &["Share of Quantity", "quantity share", "impressions"],
        ),
        (
            "grossRev",
            &["Net Campaign Revenue", "campaign revenue", "gross revenue"],
        ),
        (
            "netRev",
            &["Data Partner Revenue", "partner revenue", "net revenue"],
        ),
        (
            "attributePath",
            &["Taxonomy", "attribute path", "taxonomy path"],
        ),
        ("attributeName", &["Dataset Name", "dataset", "attribute name"]),
    ];
    FIELDS
        .iter()
        .map(|(name, aliases)| CanonicalField {
            name: (*name).to_string(),
            aliases: aliases.iter().map(|alias| (*alias).to_string()).collect(),
        })
        .collect()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: Config = serde_yaml::from_reader(reader).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML string")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.fuzzy_threshold),
            "fuzzy_threshold must lie between 0 and 1 (found {})",
            self.fuzzy_threshold
        );
        ensure!(
            !self.mapping_table.trim().is_empty(),
            "mapping_table cannot be empty"
        );
        for field in &self.canonical {
            ensure!(
                !field.name.trim().is_empty(),
                "Canonical field names cannot be empty"
            );
        }
        self.derived_columns()?;
        Ok(())
    }

    pub fn derived_columns(&self) -> Result<Vec<DerivedColumn>> {
        crate::derive::parse_derived_columns(&self.derived)
    }

    /// Every (alias, canonical) pair the dictionary knows, in declaration order.
    ///
    /// The canonical name itself counts as an alias of its field.
    pub fn alias_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for field in &self.canonical {
            pairs.push((field.name.clone(), field.name.clone()));
            for alias in &field.aliases {
                let alias = alias.trim();
                if alias.is_empty() {
                    continue;
                }
                pairs.push((alias.to_string(), field.name.clone()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.canonical.len(), 14);
        assert_eq!(config.derived_columns().unwrap()[0].name, "eDate");
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "fuzzy: false\ncanonical:\n  - name: country\n    aliases: [Country, Land]\n";
        let config: Config = serde_yaml::from_str(yaml).expect("parse yaml");
        assert!(!config.fuzzy);
        assert_eq!(config.mapping_table, DEFAULT_MAPPING_TABLE);
        assert_eq!(config.canonical.len(), 1);
        assert_eq!(
            config.alias_pairs(),
            vec![
                ("country".to_string(), "country".to_string()),
                ("Country".to_string(), "country".to_string()),
                ("Land".to_string(), "country".to_string()),
            ]
        );
    }

    #[test]
    fn cleanup_rules_default_to_required() {
        let yaml = "cleanup:\n  - column: clicks\n    kind: count\n";
        let config: Config = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(
            config.cleanup,
            vec![CleanupRule::new("clicks", CleanupKind::Count, true)]
        );
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = Config {
            fuzzy_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn dumped_config_loads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("revenue-ingest.yaml");
        std::fs::write(&path, Config::default().to_yaml_string().unwrap()).unwrap();
        let loaded = Config::load(&path).expect("load dumped config");
        assert_eq!(loaded.canonical, Config::default().canonical);
        assert_eq!(loaded.cleanup, Config::default().cleanup);
    }
}
