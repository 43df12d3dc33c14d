//! Data models for share aggregation.
//!
//! This module contains the core data structures used throughout
//! the application for representing records, classification rules,
//! facet selections, aggregation results, and dashboard reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single row of the source table.
///
/// Empty values are indistinguishable from missing ones: both read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the non-empty value of `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Sets `field` to `value`, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns true when no field carries a non-empty value.
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }

    /// Number of fields present (empty values included).
    #[allow(dead_code)] // Used by loader tests
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// How a classification value is compared with the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerMatch {
    /// Byte-for-byte equality, no trimming or case folding.
    #[default]
    Exact,
    /// Trim surrounding whitespace and ASCII-uppercase the value first.
    Normalized,
}

impl fmt::Display for MarkerMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerMatch::Exact => write!(f, "exact"),
            MarkerMatch::Normalized => write!(f, "normalized"),
        }
    }
}

/// Decides whether a record belongs to the positive class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRule {
    /// Field holding the classification value.
    pub field: String,
    /// Value counted as positive.
    pub marker: String,
    /// Comparison policy.
    #[serde(default)]
    pub matching: MarkerMatch,
}

impl ClassRule {
    /// Creates an exact-match rule.
    pub fn new(field: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            marker: marker.into(),
            matching: MarkerMatch::Exact,
        }
    }

    /// Returns the same rule with a different comparison policy.
    pub fn with_matching(mut self, matching: MarkerMatch) -> Self {
        self.matching = matching;
        self
    }

    /// Returns true if `value` counts as positive under this rule.
    ///
    /// In `Normalized` mode both the value and the marker are trimmed and
    /// ASCII-uppercased before comparison.
    pub fn matches(&self, value: &str) -> bool {
        match self.matching {
            MarkerMatch::Exact => value == self.marker,
            MarkerMatch::Normalized => normalize(value) == normalize(&self.marker),
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

/// The set of allowed values for one facet column.
///
/// "No filtering" is an explicit selection of every known value, built with
/// [`FacetFilter::select_all`]. An empty `allowed` list keeps every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFilter {
    /// Column the facet applies to.
    pub field: String,
    /// Allowed values, in display order.
    pub allowed: Vec<String>,
}

impl FacetFilter {
    /// Creates a filter allowing exactly `values`.
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self {
            field: field.into(),
            allowed: Vec::new(),
        };
        for value in values {
            let value = value.into();
            if !filter.allowed.contains(&value) {
                filter.allowed.push(value);
            }
        }
        filter
    }

    /// Creates a filter that selects every distinct value of `field` in `records`.
    pub fn select_all(field: impl Into<String>, records: &[Record]) -> Self {
        let field = field.into();
        let values = crate::analysis::distinct_values(records, &field)
            .into_iter()
            .map(|(value, _)| value);
        Self::new(field, values)
    }

    /// Returns true if the record passes this filter.
    pub fn admits(&self, record: &Record) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        record
            .get(&self.field)
            .is_some_and(|v| self.allowed.iter().any(|a| a == v))
    }

    /// Flips the selection state of `value`. Returns true if it is now selected.
    pub fn toggle(&mut self, value: &str) -> bool {
        if let Some(pos) = self.allowed.iter().position(|a| a == value) {
            self.allowed.remove(pos);
            false
        } else {
            self.allowed.push(value.to_string());
            true
        }
    }

    /// Returns true if `value` is currently selected.
    pub fn is_selected(&self, value: &str) -> bool {
        self.allowed.iter().any(|a| a == value)
    }
}

/// Share of positive records within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    /// Group value.
    pub label: String,
    /// Records counted in this group.
    pub total: usize,
    /// Records matching the marker.
    pub positive: usize,
    /// `positive / total * 100`, rounded to 2 decimals.
    pub share_percent: f64,
}

impl GroupResult {
    /// Builds a result from raw counts.
    pub fn from_counts(label: impl Into<String>, total: usize, positive: usize) -> Self {
        Self {
            label: label.into(),
            total,
            positive,
            share_percent: share_percent(positive, total),
        }
    }
}

/// Per-entity roll-up row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Entity name.
    pub name: String,
    /// Last-seen descriptive values, keyed by field name.
    pub details: BTreeMap<String, String>,
    /// Records counted for this entity.
    pub total: usize,
    /// Records matching the marker.
    pub positive: usize,
    /// `positive / total * 100`, rounded to 2 decimals.
    pub share_percent: f64,
}

impl EntityRow {
    /// Returns a descriptive value, or an empty string.
    pub fn detail(&self, field: &str) -> &str {
        self.details.get(field).map(String::as_str).unwrap_or("")
    }
}

/// Computes `100 * positive / total` rounded to 2 decimal places, or 0 for an empty group.
pub fn share_percent(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = positive as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Per-group results for one grouping column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSection {
    /// Grouping column.
    pub field: String,
    /// Groups in ranking order.
    pub groups: Vec<GroupResult>,
}

/// Metadata about a generated dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetadata {
    /// Path of the input dataset.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Records loaded from the dataset.
    pub records_loaded: usize,
    /// Records left after the facet filter.
    pub records_selected: usize,
    /// Classification rule in effect.
    pub rule: ClassRule,
    /// Facet filter in effect, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FacetFilter>,
}

/// The complete dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    /// Metadata about the report.
    pub metadata: DashboardMetadata,
    /// Ungrouped share over all selected records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<GroupResult>,
    /// One section per grouping column.
    pub sections: Vec<GroupSection>,
    /// Column used to name entities.
    pub name_field: String,
    /// Descriptive columns carried on entity rows, in display order.
    pub detail_fields: Vec<String>,
    /// Entity roll-up rows in ranking order.
    pub entities: Vec<EntityRow>,
}

impl Dashboard {
    /// Returns true when no record survived the filter.
    pub fn is_empty(&self) -> bool {
        self.metadata.records_selected == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_record_treats_empty_as_missing() {
        let r = record(&[("VC2", ""), ("ING", "Prisma")]);
        assert_eq!(r.get("VC2"), None);
        assert_eq!(r.get("PHY_NM"), None);
        assert_eq!(r.get("ING"), Some("Prisma"));
        assert!(!r.is_blank());
        assert!(record(&[("VC2", "")]).is_blank());
    }

    #[test]
    fn test_exact_marker_match() {
        let rule = ClassRule::new("VC2", "RNT");
        assert!(rule.matches("RNT"));
        assert!(!rule.matches("rnt"));
        assert!(!rule.matches(" RNT"));
    }

    #[test]
    fn test_normalized_marker_match() {
        let rule = ClassRule::new("VC2", "RNT").with_matching(MarkerMatch::Normalized);
        assert!(rule.matches(" rnt "));
        assert!(rule.matches("RNT"));
        assert!(!rule.matches("RNX"));
    }

    #[test]
    fn test_normalized_rule_normalizes_marker() {
        let rule = ClassRule::new("VC2", " rnt").with_matching(MarkerMatch::Normalized);
        assert!(rule.matches("RNT"));
        assert!(rule.matches(" rnt "));
        assert!(!rule.matches("RNX"));

        let exact = ClassRule::new("VC2", "rnt");
        assert!(!exact.matches("RNT"));
    }

    #[test]
    fn test_share_percent_rounding() {
        assert_eq!(share_percent(0, 0), 0.0);
        assert_eq!(share_percent(1, 2), 50.0);
        assert_eq!(share_percent(1, 3), 33.33);
        assert_eq!(share_percent(2, 3), 66.67);
        assert_eq!(share_percent(5, 5), 100.0);
    }

    #[test]
    fn test_facet_filter_admits() {
        let filter = FacetFilter::new("Month", ["Jan"]);
        assert!(filter.admits(&record(&[("Month", "Jan")])));
        assert!(!filter.admits(&record(&[("Month", "Feb")])));
        assert!(!filter.admits(&record(&[("VC2", "RNT")])));

        let open = FacetFilter::new("Month", Vec::<String>::new());
        assert!(open.admits(&record(&[("VC2", "RNT")])));
    }

    #[test]
    fn test_facet_filter_toggle() {
        let mut filter = FacetFilter::new("Month", ["Jan", "Feb", "Jan"]);
        assert_eq!(filter.allowed, vec!["Jan", "Feb"]);

        assert!(!filter.toggle("Jan"));
        assert!(!filter.is_selected("Jan"));
        assert!(filter.toggle("Jan"));
        assert_eq!(filter.allowed, vec!["Feb", "Jan"]);
    }

    #[test]
    fn test_select_all_uses_first_appearance_order() {
        let records = vec![
            record(&[("Month", "Mar")]),
            record(&[("Month", "Jan")]),
            record(&[("Month", "Mar")]),
            record(&[("Month", "")]),
        ];
        let filter = FacetFilter::select_all("Month", &records);
        assert_eq!(filter.allowed, vec!["Mar", "Jan"]);
    }

    #[test]
    fn test_entity_detail_defaults_to_empty() {
        let row = EntityRow {
            name: "Dr. Jones".to_string(),
            details: [("PHY_SPC".to_string(), "Neuro".to_string())]
                .into_iter()
                .collect(),
            total: 1,
            positive: 0,
            share_percent: 0.0,
        };
        assert_eq!(row.detail("PHY_SPC"), "Neuro");
        assert_eq!(row.detail("CH_ADD"), "");
    }
}
