//! Share aggregation and ranking.
//!
//! This module provides the group-by engine: it filters records by a facet
//! selection, buckets them by a grouping column, and ranks buckets by the
//! share of records matching a classification marker.

use crate::models::{share_percent, ClassRule, EntityRow, FacetFilter, GroupResult, Record};
use std::collections::{BTreeMap, HashMap};

/// Label used for the ungrouped share.
pub const OVERALL_LABEL: &str = "Total";

/// Running counts for one bucket.
#[derive(Debug, Default)]
struct Tally {
    total: usize,
    positive: usize,
}

impl Tally {
    fn count(&mut self, class_value: &str, rule: &ClassRule) {
        self.total += 1;
        if rule.matches(class_value) {
            self.positive += 1;
        }
    }
}

/// Keep only the records admitted by `filter`.
pub fn apply_facet_filter<'a>(
    records: &'a [Record],
    filter: Option<&FacetFilter>,
) -> Vec<&'a Record> {
    match filter {
        Some(filter) => records.iter().filter(|r| filter.admits(r)).collect(),
        None => records.iter().collect(),
    }
}

/// Compute the share of positive records per distinct value of `group_field`.
///
/// Records missing the group value or the classification value are skipped.
/// Results are ordered by descending share; ties keep first-appearance order.
pub fn compute_share(
    records: &[Record],
    filter: Option<&FacetFilter>,
    group_field: &str,
    rule: &ClassRule,
) -> Vec<GroupResult> {
    share_by_group(apply_facet_filter(records, filter), group_field, rule)
}

/// Same as [`compute_share`] over records that were already filtered.
pub fn share_by_group<'a, I>(records: I, group_field: &str, rule: &ClassRule) -> Vec<GroupResult>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<(&str, Tally)> = Vec::new();

    for record in records {
        let (Some(group), Some(class_value)) = (record.get(group_field), record.get(&rule.field))
        else {
            continue;
        };

        let slot = *index.entry(group).or_insert_with(|| {
            tallies.push((group, Tally::default()));
            tallies.len() - 1
        });
        tallies[slot].1.count(class_value, rule);
    }

    let mut results: Vec<GroupResult> = tallies
        .into_iter()
        .map(|(label, tally)| GroupResult::from_counts(label, tally.total, tally.positive))
        .collect();

    rank_by_share(&mut results, |g| g.share_percent);
    results
}

/// Compute the share over every record that carries a classification value.
pub fn overall_share<'a, I>(records: I, rule: &ClassRule) -> GroupResult
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut tally = Tally::default();
    for class_value in records.into_iter().filter_map(|r| r.get(&rule.field)) {
        tally.count(class_value, rule);
    }
    GroupResult::from_counts(OVERALL_LABEL, tally.total, tally.positive)
}

/// Roll records up into one row per distinct, non-empty `name_field` value.
///
/// Descriptive fields are last-write-wins. Only records with a classification
/// value are counted, so an entity may end up with a total of zero.
pub fn rollup_by_name<'a, I>(
    records: I,
    name_field: &str,
    descriptive_fields: &[String],
    rule: &ClassRule,
) -> Vec<EntityRow>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<(EntityRow, Tally)> = Vec::new();

    for record in records {
        let Some(name) = record.get(name_field) else {
            continue;
        };

        let details: BTreeMap<String, String> = descriptive_fields
            .iter()
            .map(|field| (field.clone(), record.get(field).unwrap_or("").to_string()))
            .collect();

        let slot = match index.get(name) {
            Some(&slot) => {
                rows[slot].0.details = details;
                slot
            }
            None => {
                rows.push((
                    EntityRow {
                        name: name.to_string(),
                        details,
                        total: 0,
                        positive: 0,
                        share_percent: 0.0,
                    },
                    Tally::default(),
                ));
                index.insert(name, rows.len() - 1);
                rows.len() - 1
            }
        };

        if let Some(class_value) = record.get(&rule.field) {
            rows[slot].1.count(class_value, rule);
        }
    }

    let mut entities: Vec<EntityRow> = rows
        .into_iter()
        .map(|(mut row, tally)| {
            row.total = tally.total;
            row.positive = tally.positive;
            row.share_percent = share_percent(tally.positive, tally.total);
            row
        })
        .collect();

    rank_by_share(&mut entities, |e| e.share_percent);
    entities
}

/// Distinct non-empty values of `field` in first-appearance order, with counts.
pub fn distinct_values(records: &[Record], field: &str) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut values: Vec<(String, usize)> = Vec::new();

    for value in records.iter().filter_map(|r| r.get(field)) {
        match index.get(value) {
            Some(&slot) => values[slot].1 += 1,
            None => {
                index.insert(value, values.len());
                values.push((value.to_string(), 1));
            }
        }
    }

    values
}

/// Sort by share (highest first). `sort_by` is stable, so ties keep input order.
fn rank_by_share<T>(items: &mut [T], share: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        share(b)
            .partial_cmp(&share(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
