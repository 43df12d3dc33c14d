//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::dataset::InputFormat;
use clap::Parser;
use std::path::PathBuf;

/// rxshare - share-of-prescription dashboards from tabular data
///
/// Load a CSV or JSON dataset, filter it by a facet column, and rank
/// groups and entities by the share of records matching a marker value.
///
/// Examples:
///   rxshare --input data.csv
///   rxshare --input data.csv --group-by "Prisma RSM,CH_DIST" --format json
///   rxshare --input data.json --facet Month --deselect Feb
///   rxshare --input data.csv --facet Month --list-facets
///   rxshare --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset to analyze (.csv or .json)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Input format; detected from the extension by default
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<InputFormat>,

    /// Output file path for the report
    ///
    /// Defaults to the config value or rxshare_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .rxshare.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Classification column
    #[arg(long, value_name = "COLUMN")]
    pub class_field: Option<String>,

    /// Classification value counted as positive
    #[arg(short, long, value_name = "VALUE")]
    pub marker: Option<String>,

    /// Trim and uppercase classification values before comparing
    ///
    /// By default values are compared with the marker exactly.
    #[arg(long)]
    pub normalize_marker: bool,

    /// Grouping columns (comma-separated)
    ///
    /// Example: --group-by "Prisma RSM,CH_DIST"
    #[arg(short, long, value_name = "COLUMNS", value_delimiter = ',')]
    pub group_by: Option<Vec<String>>,

    /// Column naming the entity to roll up
    #[arg(long, value_name = "COLUMN")]
    pub name_field: Option<String>,

    /// Descriptive columns shown on entity rows (comma-separated)
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub details: Option<Vec<String>>,

    /// Facet column to filter on
    #[arg(short, long, value_name = "COLUMN")]
    pub facet: Option<String>,

    /// Facet values to keep (comma-separated); all values when omitted
    #[arg(long, value_name = "VALUES", value_delimiter = ',')]
    pub select: Option<Vec<String>>,

    /// Facet values to toggle off (comma-separated)
    #[arg(long, value_name = "VALUES", value_delimiter = ',')]
    pub deselect: Option<Vec<String>>,

    /// Maximum entity rows in the report
    #[arg(long, value_name = "COUNT")]
    pub max_entities: Option<usize>,

    /// Leave the ungrouped share out of the report
    #[arg(long)]
    pub no_overall: bool,

    /// List the facet column's values with record counts and exit
    ///
    /// Requires a facet column from --facet or the config file.
    #[arg(long)]
    pub list_facets: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .rxshare.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            if !input.is_file() {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
        }

        if self.max_entities == Some(0) {
            return Err("Max entities must be at least 1".to_string());
        }

        if let Some(ref marker) = self.marker {
            if marker.is_empty() {
                return Err("Marker must not be empty".to_string());
            }
        }

        if let Some(ref group_by) = self.group_by {
            if group_by.iter().any(|g| g.trim().is_empty()) {
                return Err("Grouping columns must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            input_format: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            class_field: None,
            marker: None,
            normalize_marker: false,
            group_by: None,
            name_field: None,
            details: None,
            facet: None,
            select: None,
            deselect: None,
            max_entities: None,
            no_overall: false,
            list_facets: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_comma_separated_lists() {
        let args = Args::try_parse_from([
            "rxshare",
            "--input",
            "data.csv",
            "--group-by",
            "Prisma RSM,CH_DIST",
            "--facet",
            "Month",
            "--deselect",
            "Feb,Mar",
        ])
        .unwrap();

        assert_eq!(
            args.group_by,
            Some(vec!["Prisma RSM".to_string(), "CH_DIST".to_string()])
        );
        assert_eq!(args.facet.as_deref(), Some("Month"));
        assert_eq!(args.deselect.map(|d| d.len()), Some(2));
        assert_eq!(args.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let result = Args::try_parse_from(["rxshare", "--input", "data.csv", "--format", "html"]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["rxshare", "-i", "data.txt", "--input-format", "json"]).unwrap();
        assert_eq!(args.input_format, Some(InputFormat::Json));
    }

    #[test]
    fn test_input_required_unless_init_config() {
        assert!(Args::try_parse_from(["rxshare"]).is_err());
        assert!(Args::try_parse_from(["rxshare", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/nonexistent/data.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_entities() {
        let mut args = make_args();
        args.max_entities = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_config_verbose_raises_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
