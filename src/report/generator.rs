//! Markdown and JSON dashboard generation.
//!
//! This module renders a [`Dashboard`] as a Markdown document with text bar
//! charts and ranked tables, or as JSON carrying the same data plus chart
//! series ready for a plotting front end.

use crate::models::{Dashboard, DashboardMetadata, EntityRow, GroupResult, GroupSection};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Line shown in place of results when nothing survived the filter.
pub const EMPTY_STATE: &str = "No records matched the current filter.";

/// Display options for generated reports.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Maximum entity rows to display (all when `None`).
    pub max_entities: Option<usize>,
    /// Width of a 100% bar in the text chart.
    pub bar_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            max_entities: None,
            bar_width: 40,
        }
    }
}

impl From<&crate::config::ReportConfig> for ReportOptions {
    fn from(config: &crate::config::ReportConfig) -> Self {
        Self {
            max_entities: config.max_entities,
            bar_width: config.bar_width,
        }
    }
}

/// Bar chart data in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Chart title.
    pub title: String,
    /// Group labels.
    pub labels: Vec<String>,
    /// Share values (percent), aligned with `labels`.
    pub values: Vec<f64>,
}

impl ChartSeries {
    /// Build a series from ranked groups, keeping their order.
    pub fn from_groups(title: impl Into<String>, groups: &[GroupResult]) -> Self {
        Self {
            title: title.into(),
            labels: groups.iter().map(|g| g.label.clone()).collect(),
            values: groups.iter().map(|g| g.share_percent).collect(),
        }
    }
}

/// Build the chart series for every section of a dashboard.
pub fn chart_series(dashboard: &Dashboard) -> Vec<ChartSeries> {
    let mut charts = Vec::new();

    if let Some(ref overall) = dashboard.overall {
        charts.push(ChartSeries::from_groups(
            "Overall Share (%)",
            std::slice::from_ref(overall),
        ));
    }

    for section in &dashboard.sections {
        charts.push(ChartSeries::from_groups(
            format!("Share by {} (%)", section.field),
            &section.groups,
        ));
    }

    charts
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(dashboard: &Dashboard, options: &ReportOptions) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Rx Share Dashboard\n\n");

    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str(&generate_table_of_contents(dashboard));

    if dashboard.is_empty() {
        output.push_str(EMPTY_STATE);
        output.push_str("\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    if let Some(ref overall) = dashboard.overall {
        output.push_str(&generate_overall_section(overall));
    }

    for section in &dashboard.sections {
        output.push_str(&generate_group_section(section, options.bar_width));
    }

    output.push_str(&generate_entity_section(dashboard, options.max_entities));

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Records Loaded:** {}\n",
        metadata.records_loaded
    ));
    section.push_str(&format!(
        "- **Records Selected:** {}\n",
        metadata.records_selected
    ));
    section.push_str(&format!(
        "- **Positive Class:** `{}` = `{}` ({} match)\n",
        metadata.rule.field, metadata.rule.marker, metadata.rule.matching
    ));
    if let Some(ref filter) = metadata.filter {
        let selected = if filter.allowed.is_empty() {
            "all".to_string()
        } else {
            filter.allowed.join(", ")
        };
        section.push_str(&format!(
            "- **Filter:** `{}` in [{}]\n",
            filter.field, selected
        ));
    }
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(dashboard: &Dashboard) -> String {
    if dashboard.is_empty() {
        return String::new();
    }

    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    if dashboard.overall.is_some() {
        toc.push_str("- [Overall Share](#overall-share)\n");
    }

    for section in &dashboard.sections {
        let title = format!("Share by {}", section.field);
        toc.push_str(&format!("- [{}](#{})\n", title, anchor(&title)));
    }

    toc.push_str("- [Entities](#entities)\n\n");

    toc
}

/// Generate the ungrouped share section.
fn generate_overall_section(overall: &GroupResult) -> String {
    let mut section = String::new();

    section.push_str("## Overall Share\n\n");
    section.push_str("| Total | Positive | Share (%) |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{:.2}** |\n\n",
        overall.total, overall.positive, overall.share_percent
    ));

    section
}

/// Generate one grouped section: a text bar chart followed by a ranked table.
fn generate_group_section(group: &GroupSection, bar_width: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Share by {}\n\n", group.field));

    if group.groups.is_empty() {
        section.push_str(&format!(
            "No selected record has both `{}` and a classification value.\n\n",
            group.field
        ));
        return section;
    }

    section.push_str("```text\n");
    section.push_str(&render_bar_chart(&group.groups, bar_width));
    section.push_str("```\n\n");

    section.push_str(&format!(
        "| Rank | {} | Total | Positive | Share (%) |\n",
        escape_cell(&group.field)
    ));
    section.push_str("|:---:|:---|:---:|:---:|:---:|\n");

    for (i, g) in group.groups.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.2} |\n",
            i + 1,
            escape_cell(&g.label),
            g.total,
            g.positive,
            g.share_percent
        ));
    }
    section.push('\n');

    section
}

/// Render groups as horizontal bars scaled so that 100% spans `width` cells.
pub fn render_bar_chart(groups: &[GroupResult], width: usize) -> String {
    let label_width = groups
        .iter()
        .map(|g| g.label.chars().count())
        .max()
        .unwrap_or(0);

    let mut chart = String::new();
    for g in groups {
        let cells = ((g.share_percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
        chart.push_str(&format!(
            "{:<label_width$} | {:<width$} {:>6.2}%\n",
            g.label,
            "█".repeat(cells),
            g.share_percent,
            label_width = label_width,
            width = width,
        ));
    }

    chart
}

/// Generate the entity roll-up table.
fn generate_entity_section(dashboard: &Dashboard, max_entities: Option<usize>) -> String {
    let mut section = String::new();

    section.push_str("## Entities\n\n");

    if dashboard.entities.is_empty() {
        section.push_str(&format!(
            "No selected record has a `{}` value.\n\n",
            dashboard.name_field
        ));
        return section;
    }

    let shown = max_entities
        .unwrap_or(dashboard.entities.len())
        .min(dashboard.entities.len());
    if shown < dashboard.entities.len() {
        section.push_str(&format!(
            "*Showing top {} of {} entities.*\n\n",
            shown,
            dashboard.entities.len()
        ));
    }

    let mut header = format!("| Rank | {} |", escape_cell(&dashboard.name_field));
    let mut align = String::from("|:---:|:---|");
    for field in &dashboard.detail_fields {
        header.push_str(&format!(" {} |", escape_cell(field)));
        align.push_str(":---|");
    }
    header.push_str(" Total | Positive | Share (%) |\n");
    align.push_str(":---:|:---:|:---:|\n");

    section.push_str(&header);
    section.push_str(&align);

    for (i, row) in dashboard.entities.iter().take(shown).enumerate() {
        section.push_str(&generate_entity_row(i + 1, row, &dashboard.detail_fields));
    }
    section.push('\n');

    section
}

fn generate_entity_row(rank: usize, row: &EntityRow, detail_fields: &[String]) -> String {
    let mut line = format!("| {} | {} |", rank, escape_cell(&row.name));
    for field in detail_fields {
        line.push_str(&format!(" {} |", escape_cell(row.detail(field))));
    }
    line.push_str(&format!(
        " {} | {} | {:.2} |\n",
        row.total, row.positive, row.share_percent
    ));
    line
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by rxshare*\n".to_string()
}

/// GitHub-style heading slug: lowercase, spaces to `-`, `_` kept, other punctuation dropped.
fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' => Some('-'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// JSON document: the dashboard plus its chart series.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    dashboard: &'a Dashboard,
    charts: Vec<ChartSeries>,
}

/// Generate a JSON report.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    let report = JsonReport {
        dashboard,
        charts: chart_series(dashboard),
    };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Write `content` to `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassRule, FacetFilter};
    use chrono::Utc;

    fn create_test_dashboard() -> Dashboard {
        let metadata = DashboardMetadata {
            source: "data.csv".to_string(),
            generated_at: Utc::now(),
            records_loaded: 10,
            records_selected: 6,
            rule: ClassRule::new("VC2", "RNT"),
            filter: Some(FacetFilter::new("Month", ["Jan", "Feb"])),
        };

        Dashboard {
            metadata,
            overall: Some(GroupResult::from_counts("Total", 6, 3)),
            sections: vec![GroupSection {
                field: "Prisma RSM".to_string(),
                groups: vec![
                    GroupResult::from_counts("North", 2, 2),
                    GroupResult::from_counts("South", 4, 1),
                ],
            }],
            name_field: "PHY_NM".to_string(),
            detail_fields: vec!["PHY_SPC".to_string()],
            entities: vec![
                EntityRow {
                    name: "Dr. Jones".to_string(),
                    details: [("PHY_SPC".to_string(), "Neuro".to_string())]
                        .into_iter()
                        .collect(),
                    total: 2,
                    positive: 2,
                    share_percent: 100.0,
                },
                EntityRow {
                    name: "Dr. Karim".to_string(),
                    details: [("PHY_SPC".to_string(), "Gastro | GI".to_string())]
                        .into_iter()
                        .collect(),
                    total: 4,
                    positive: 1,
                    share_percent: 25.0,
                },
            ],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let dashboard = create_test_dashboard();
        let markdown = generate_markdown_report(&dashboard, &ReportOptions::default());

        assert!(markdown.contains("# Rx Share Dashboard"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`Month` in [Jan, Feb]"));
        assert!(markdown.contains("## Overall Share"));
        assert!(markdown.contains("| 6 | 3 | **50.00** |"));
        assert!(markdown.contains("## Share by Prisma RSM"));
        assert!(markdown.contains("(#share-by-prisma-rsm)"));
        assert!(markdown.contains("| 1 | North | 2 | 2 | 100.00 |"));
        assert!(markdown.contains("| 2 | South | 4 | 1 | 25.00 |"));
        assert!(markdown.contains("| 1 | Dr. Jones | Neuro | 2 | 2 | 100.00 |"));
        assert!(markdown.contains("Gastro \\| GI"));
        assert!(!markdown.contains(EMPTY_STATE));
    }

    #[test]
    fn test_toc_anchor_keeps_underscores() {
        let mut dashboard = create_test_dashboard();
        dashboard.sections[0].field = "CH_DIST".to_string();

        let markdown = generate_markdown_report(&dashboard, &ReportOptions::default());

        assert!(markdown.contains("- [Share by CH_DIST](#share-by-ch_dist)"));
        assert!(markdown.contains("## Share by CH_DIST"));
        assert_eq!(anchor("Share by Prisma RSM"), "share-by-prisma-rsm");
        assert_eq!(anchor("Share by Region (2024)"), "share-by-region-2024");
    }

    #[test]
    fn test_group_order_is_preserved() {
        let markdown = generate_markdown_report(&create_test_dashboard(), &ReportOptions::default());
        let north = markdown.find("| 1 | North").unwrap();
        let south = markdown.find("| 2 | South").unwrap();
        assert!(north < south);
    }

    #[test]
    fn test_empty_dashboard_renders_empty_state() {
        let mut dashboard = create_test_dashboard();
        dashboard.metadata.records_selected = 0;
        dashboard.overall = Some(GroupResult::from_counts("Total", 0, 0));
        dashboard.sections[0].groups.clear();
        dashboard.entities.clear();

        let markdown = generate_markdown_report(&dashboard, &ReportOptions::default());

        assert!(markdown.contains(EMPTY_STATE));
        assert!(!markdown.contains("## Entities"));
        assert!(!markdown.contains("## Table of Contents"));
    }

    #[test]
    fn test_entity_table_truncation() {
        let dashboard = create_test_dashboard();
        let options = ReportOptions {
            max_entities: Some(1),
            ..ReportOptions::default()
        };

        let markdown = generate_markdown_report(&dashboard, &options);

        assert!(markdown.contains("Showing top 1 of 2 entities"));
        assert!(markdown.contains("Dr. Jones"));
        assert!(!markdown.contains("Dr. Karim"));
    }

    #[test]
    fn test_render_bar_chart() {
        let groups = vec![
            GroupResult::from_counts("North", 2, 2),
            GroupResult::from_counts("S", 4, 1),
        ];

        let chart = render_bar_chart(&groups, 8);
        let lines: Vec<&str> = chart.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("North | ████████ 100.00%"));
        assert!(lines[1].starts_with("S     | ██       "));
        assert!(lines[1].ends_with("25.00%"));
    }

    #[test]
    fn test_chart_series() {
        let charts = chart_series(&create_test_dashboard());

        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].labels, vec!["Total"]);
        assert_eq!(charts[1].title, "Share by Prisma RSM (%)");
        assert_eq!(charts[1].labels, vec!["North", "South"]);
        assert_eq!(charts[1].values, vec![100.0, 25.0]);
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_dashboard()).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"sections\""));
        assert!(json.contains("\"entities\""));
        assert!(json.contains("\"charts\""));
        assert!(json.contains("\"share_percent\": 25.0"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        write_report("# hello\n", &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");
    }
}
