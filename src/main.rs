//! rxshare - share-of-prescription dashboards from tabular data
//!
//! A CLI tool that loads a CSV or JSON dataset, applies a facet filter,
//! ranks groups and entities by the share of records matching a marker
//! value, and writes a Markdown or JSON dashboard report.
//!
//! Exit codes:
//!   0 - Success (including an empty selection)
//!   1 - Runtime error (bad arguments, config, unreadable dataset, etc.)

mod analysis;
mod cli;
mod config;
mod dataset;
mod models;
mod report;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use dataset::Dataset;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Dashboard, DashboardMetadata, FacetFilter, GroupSection};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so [general] verbose takes effect
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("rxshare v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .rxshare.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize columns, marker, grouping, and filters.");
    Ok(())
}

/// Initialize logging at `level`, unless `RUST_LOG` says otherwise.
fn init_logging(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load, filter, aggregate, and write the report.
fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("No input dataset given (use --input)")?;

    // Step 1: Load the dataset
    let dataset = load_with_spinner(&input, &config, args.quiet)?;
    info!("Loaded {} records from {}", dataset.len(), dataset.source);
    if dataset.is_empty() {
        warn!("Dataset {} has no records", dataset.source);
    }
    warn_missing_columns(&dataset, &config);

    // Handle --list-facets: print facet values and exit
    if args.list_facets {
        return handle_list_facets(&dataset, &config);
    }

    // Step 2: Resolve the facet selection
    let selection = resolve_selection(&dataset, &config);

    // Step 3: Aggregate
    let dashboard = build_dashboard(&dataset, &config, &selection);
    if dashboard.is_empty() {
        warn!("No records matched the current filter; writing an empty report");
    }

    // Step 4: Render and save
    let options = report::ReportOptions::from(&config.report);
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(&dashboard, &options),
    };

    let mut output_path = PathBuf::from(&config.general.output);
    if args.output.is_none()
        && args.format == OutputFormat::Json
        && output_path.extension().is_some_and(|e| e == "md")
    {
        output_path.set_extension("json");
    }
    report::write_report(&output, &output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        print_summary(&dashboard);
        println!("   Duration: {:.2}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    Ok(())
}

/// Load the dataset, showing a spinner unless quiet.
fn load_with_spinner(input: &Path, config: &Config, quiet: bool) -> Result<Dataset> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    spinner.set_message(format!("📥 Loading {}", input.display()));

    let result = dataset::load_dataset(input, config.general.input_format)
        .with_context(|| format!("Failed to load dataset {}", input.display()));

    match &result {
        Ok(dataset) => {
            spinner.finish_with_message(format!("📥 Loaded {} records", dataset.len()))
        }
        Err(_) => spinner.abandon(),
    }

    result
}

/// Warn about configured columns that the dataset does not have.
fn warn_missing_columns(dataset: &Dataset, config: &Config) {
    let columns = &config.columns;
    let configured = std::iter::once(columns.class_field.as_str())
        .chain(std::iter::once(columns.name_field.as_str()))
        .chain(columns.group_by.iter().map(String::as_str))
        .chain(columns.details.iter().map(String::as_str))
        .chain(config.filter.field.as_deref());

    for column in dataset.missing_columns(configured) {
        warn!("Column '{}' not found in dataset; it will read as empty", column);
    }
}

/// Handle --list-facets: print each facet value with its record count.
fn handle_list_facets(dataset: &Dataset, config: &Config) -> Result<()> {
    let Some(ref field) = config.filter.field else {
        bail!("--list-facets needs a facet column (use --facet or [filter] field)");
    };

    let values = analysis::distinct_values(&dataset.records, field);

    if values.is_empty() {
        println!("   Column '{}' has no values.", field);
    } else {
        println!("\n🔍 Values of '{}':\n", field);
        for (value, count) in &values {
            println!("     {} ({} records)", value, count);
        }
        println!("\n   Total: {} values", values.len());
    }

    Ok(())
}

/// The facet selection in effect for one run.
#[derive(Debug, Clone, PartialEq)]
struct Selection {
    /// Filter to apply, if a facet column is configured.
    filter: Option<FacetFilter>,
    /// Every known value was toggled off, so nothing is selected.
    nothing_selected: bool,
}

/// Build the facet selection from `[filter]`: start from the explicit
/// selection (or every known value), then toggle off the deselected values.
fn resolve_selection(dataset: &Dataset, config: &Config) -> Selection {
    let Some(ref field) = config.filter.field else {
        return Selection {
            filter: None,
            nothing_selected: false,
        };
    };

    let mut filter = if config.filter.select.is_empty() {
        FacetFilter::select_all(field.clone(), &dataset.records)
    } else {
        FacetFilter::new(field.clone(), config.filter.select.iter().cloned())
    };
    let had_values = !filter.allowed.is_empty();

    for value in &config.filter.deselect {
        if filter.is_selected(value) {
            filter.toggle(value);
        } else {
            warn!("Cannot deselect '{}': not a selected value of '{}'", value, field);
        }
    }

    debug!("Facet '{}' selection: {:?}", field, filter.allowed);

    Selection {
        nothing_selected: had_values && filter.allowed.is_empty(),
        filter: Some(filter),
    }
}

/// Run every aggregation over the selected records.
fn build_dashboard(dataset: &Dataset, config: &Config, selection: &Selection) -> Dashboard {
    let rule = config.class_rule();

    let selected = if selection.nothing_selected {
        Vec::new()
    } else {
        analysis::apply_facet_filter(&dataset.records, selection.filter.as_ref())
    };
    debug!("{} of {} records selected", selected.len(), dataset.len());

    let overall = config
        .report
        .include_overall
        .then(|| analysis::overall_share(selected.iter().copied(), &rule));

    let sections = config
        .columns
        .group_by
        .iter()
        .map(|field| GroupSection {
            field: field.clone(),
            groups: if selection.nothing_selected {
                Vec::new()
            } else {
                analysis::compute_share(
                    &dataset.records,
                    selection.filter.as_ref(),
                    field,
                    &rule,
                )
            },
        })
        .collect();

    let entities = analysis::rollup_by_name(
        selected.iter().copied(),
        &config.columns.name_field,
        &config.columns.details,
        &rule,
    );

    Dashboard {
        metadata: DashboardMetadata {
            source: dataset.source.clone(),
            generated_at: Utc::now(),
            records_loaded: dataset.len(),
            records_selected: selected.len(),
            rule,
            filter: selection.filter.clone(),
        },
        overall,
        sections,
        name_field: config.columns.name_field.clone(),
        detail_fields: config.columns.details.clone(),
        entities,
    }
}

/// Print a short summary of the dashboard.
fn print_summary(dashboard: &Dashboard) {
    println!("\n📊 Share Summary:");
    println!(
        "   Records selected: {} of {}",
        dashboard.metadata.records_selected, dashboard.metadata.records_loaded
    );
    if let Some(ref overall) = dashboard.overall {
        println!(
            "   Overall share: {:.2}% ({} of {})",
            overall.share_percent, overall.positive, overall.total
        );
    }
    for section in &dashboard.sections {
        match section.groups.first() {
            Some(top) => println!(
                "   Top {}: {} ({:.2}%)",
                section.field, top.label, top.share_percent
            ),
            None => println!("   {}: no groups", section.field),
        }
    }
    println!("   Entities: {}", dashboard.entities.len());
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::Default)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Builtin)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Fallback(format!("{:#}", e)))),
    }
}

/// Where the configuration came from, logged once the subscriber is up.
#[derive(Debug)]
enum ConfigOrigin {
    Explicit(PathBuf),
    Default,
    Builtin,
    /// The default file exists but could not be read.
    Fallback(String),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::Default => info!("Loaded default config from {}", config::CONFIG_FILE),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(e) => warn!("Failed to load config: {}", e),
        }
    }
}
