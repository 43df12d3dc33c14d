//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.rxshare.toml` files.

use crate::dataset::InputFormat;
use crate::models::{ClassRule, MarkerMatch};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".rxshare.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Column mapping.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Facet filter settings.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Input format of the dataset.
    #[serde(default)]
    pub input_format: InputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            input_format: InputFormat::Auto,
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "rxshare_report.md".to_string()
}

/// Which columns drive the aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Classification column.
    #[serde(default = "default_class_field")]
    pub class_field: String,

    /// Classification value counted as positive.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// How classification values are compared with the marker.
    #[serde(default)]
    pub matching: MarkerMatch,

    /// Grouping columns; one ranked section is produced per column.
    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,

    /// Column naming the rolled-up entity.
    #[serde(default = "default_name_field")]
    pub name_field: String,

    /// Descriptive columns carried on entity rows.
    #[serde(default = "default_details")]
    pub details: Vec<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            class_field: default_class_field(),
            marker: default_marker(),
            matching: MarkerMatch::Exact,
            group_by: default_group_by(),
            name_field: default_name_field(),
            details: default_details(),
        }
    }
}

fn default_class_field() -> String {
    "VC2".to_string()
}

fn default_marker() -> String {
    "RNT".to_string()
}

fn default_group_by() -> Vec<String> {
    vec!["Prisma RSM", "CH_DIST"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_name_field() -> String {
    "PHY_NM".to_string()
}

fn default_details() -> Vec<String> {
    vec!["PHY_SPC", "CH_ADD", "CH_THN", "ING"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Facet filter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Facet column. No filtering when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Selected values. Empty means every known value is selected.
    #[serde(default)]
    pub select: Vec<String>,

    /// Values toggled off after the initial selection.
    #[serde(default)]
    pub deselect: Vec<String>,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the ungrouped share.
    #[serde(default = "default_true")]
    pub include_overall: bool,

    /// Maximum entity rows to display (all when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entities: Option<usize>,

    /// Width of the text bar chart at 100%.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_overall: true,
            max_entities: None,
            bar_width: default_bar_width(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bar_width() -> usize {
    40
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from `dir/.rxshare.toml`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.input_format {
            self.general.input_format = format;
        }

        // Column mapping
        if let Some(ref field) = args.class_field {
            self.columns.class_field = field.clone();
        }
        if let Some(ref marker) = args.marker {
            self.columns.marker = marker.clone();
        }
        if args.normalize_marker {
            self.columns.matching = MarkerMatch::Normalized;
        }
        if let Some(ref group_by) = args.group_by {
            self.columns.group_by = group_by.clone();
        }
        if let Some(ref name_field) = args.name_field {
            self.columns.name_field = name_field.clone();
        }
        if let Some(ref details) = args.details {
            self.columns.details = details.clone();
        }

        // Facet filter
        if let Some(ref facet) = args.facet {
            self.filter.field = Some(facet.clone());
        }
        if let Some(ref select) = args.select {
            self.filter.select = select.clone();
        }
        if let Some(ref deselect) = args.deselect {
            self.filter.deselect = deselect.clone();
        }

        // Report settings
        if args.max_entities.is_some() {
            self.report.max_entities = args.max_entities;
        }
        if args.no_overall {
            self.report.include_overall = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// The classification rule described by `[columns]`.
    pub fn class_rule(&self) -> ClassRule {
        ClassRule::new(&self.columns.class_field, &self.columns.marker)
            .with_matching(self.columns.matching)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.columns.class_field, "VC2");
        assert_eq!(config.columns.marker, "RNT");
        assert_eq!(config.columns.matching, MarkerMatch::Exact);
        assert!(config.columns.group_by.contains(&"Prisma RSM".to_string()));
        assert!(config.filter.field.is_none());
        assert!(config.report.include_overall);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
input_format = "json"
verbose = true

[columns]
marker = "PRX"
matching = "normalized"
group_by = ["Prisma PSO"]

[filter]
field = "Month"
deselect = ["Feb"]

[report]
max_entities = 25
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.general.input_format, InputFormat::Json);
        assert!(config.general.verbose);
        assert_eq!(config.columns.class_field, "VC2");
        assert_eq!(config.columns.marker, "PRX");
        assert_eq!(config.columns.matching, MarkerMatch::Normalized);
        assert_eq!(config.columns.group_by, vec!["Prisma PSO"]);
        assert_eq!(config.filter.field.as_deref(), Some("Month"));
        assert!(config.filter.select.is_empty());
        assert_eq!(config.filter.deselect, vec!["Feb"]);
        assert_eq!(config.report.max_entities, Some(25));
    }

    #[test]
    fn test_class_rule() {
        let mut config = Config::default();
        config.columns.matching = MarkerMatch::Normalized;

        let rule = config.class_rule();
        assert_eq!(rule.field, "VC2");
        assert!(rule.matches(" rnt"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.columns.details, Config::default().columns.details);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE), "[columns]\nmarker = \"X\"\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.columns.marker, "X");

        std::fs::write(dir.path().join(CONFIG_FILE), "[columns\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }
}
