//! # Result Aggregator
//! Batch summary for charts: counts per label, optionally per group value.
//! Pure and recomputed on every call.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::pipeline::{ScoredRecord, Verdict};
use crate::record::display_value;

pub const DEFAULT_GROUP_FIELD: &str = "Department";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Both labels always present (zero-filled).
    pub by_label: BTreeMap<u8, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_field: Option<String>,
    /// group value → label → count; only combinations that occur.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub by_group: BTreeMap<String, BTreeMap<u8, usize>>,
}

/// One pie slice (name + count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSlice {
    pub name: String,
    pub count: usize,
}

impl BatchSummary {
    pub fn count(&self, label: u8) -> usize {
        self.by_label.get(&label).copied().unwrap_or(0)
    }

    /// Overall distribution, named by verdict; empty slices omitted.
    pub fn overall_slices(&self) -> Vec<ChartSlice> {
        label_slices(&self.by_label)
    }

    /// Per-group distribution, in group order.
    pub fn group_slices(&self) -> Vec<(String, Vec<ChartSlice>)> {
        self.by_group
            .iter()
            .map(|(g, counts)| (g.clone(), label_slices(counts)))
            .collect()
    }
}

fn label_slices(counts: &BTreeMap<u8, usize>) -> Vec<ChartSlice> {
    // positive class first, matching the risk-first ordering of the tables
    [1u8, 0u8]
        .iter()
        .filter_map(|l| {
            let c = counts.get(l).copied().unwrap_or(0);
            (c > 0).then(|| ChartSlice {
                name: Verdict::from_label(*l).label().to_string(),
                count: c,
            })
        })
        .collect()
}

/// Summarize scored rows. Rows with an absent or blank group value are left
/// out of `by_group` but still counted in the totals.
pub fn summarize(results: &[ScoredRecord], group_field: Option<&str>) -> BatchSummary {
    let mut by_label = BTreeMap::from([(0u8, 0usize), (1u8, 0usize)]);
    let mut by_group: BTreeMap<String, BTreeMap<u8, usize>> = BTreeMap::new();
    let mut group_seen = false;

    for s in results {
        *by_label.entry(s.result.label).or_insert(0) += 1;

        let Some(field) = group_field else { continue };
        if s.record.contains(field) {
            group_seen = true;
        }
        if let Some(v) = s.record.present(field) {
            let key = display_value(v).trim().to_string();
            *by_group
                .entry(key)
                .or_default()
                .entry(s.result.label)
                .or_insert(0) += 1;
        }
    }

    BatchSummary {
        total: results.len(),
        by_label,
        group_field: group_field.filter(|_| group_seen).map(str::to_string),
        by_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PredictionResult;
    use crate::record::EmployeeRecord;

    fn scored(dept: Option<&str>, label: u8) -> ScoredRecord {
        let mut record = EmployeeRecord::new().with("Age", 30);
        if let Some(d) = dept {
            record.insert("Department", d);
        }
        ScoredRecord {
            record,
            result: PredictionResult {
                label,
                probability: if label == 1 { 0.8 } else { 0.2 },
            },
            predictor_label: label,
        }
    }

    #[test]
    fn totals_three_leave_seven_stay() {
        let mut rows = Vec::new();
        for _ in 0..3 {
            rows.push(scored(Some("Sales"), 1));
        }
        for _ in 0..7 {
            rows.push(scored(Some("Research & Development"), 0));
        }
        let s = summarize(&rows, Some(DEFAULT_GROUP_FIELD));
        assert_eq!(s.count(1), 3);
        assert_eq!(s.count(0), 7);
        assert_eq!(s.by_label.values().sum::<usize>(), 10);
        assert_eq!(s.total, 10);
        assert_eq!(s.by_group["Sales"][&1u8], 3);
        assert_eq!(s.by_group["Research & Development"][&0u8], 7);
        assert!(!s.by_group["Sales"].contains_key(&0u8));
    }

    #[test]
    fn no_group_field_means_no_grouping() {
        let rows = vec![scored(None, 1), scored(None, 0)];
        let s = summarize(&rows, Some(DEFAULT_GROUP_FIELD));
        assert!(s.group_field.is_none());
        assert!(s.by_group.is_empty());

        let s = summarize(&rows, None);
        assert!(s.group_field.is_none());
    }

    #[test]
    fn blank_group_values_skip_grouping_only() {
        let rows = vec![scored(Some(""), 1), scored(Some("Sales"), 1)];
        let s = summarize(&rows, Some(DEFAULT_GROUP_FIELD));
        assert_eq!(s.group_field.as_deref(), Some("Department"));
        assert_eq!(s.by_group.len(), 1);
        assert_eq!(s.count(1), 2);
    }

    #[test]
    fn zero_filled_labels_and_slices() {
        let s = summarize(&[], None);
        assert_eq!(s.count(0), 0);
        assert_eq!(s.count(1), 0);
        assert!(s.overall_slices().is_empty());

        let s = summarize(&[scored(Some("Sales"), 0)], Some("Department"));
        assert_eq!(
            s.overall_slices(),
            vec![ChartSlice {
                name: "Likely to Stay".into(),
                count: 1
            }]
        );
        assert_eq!(s.group_slices()[0].0, "Sales");
    }

    #[test]
    fn summary_is_recomputed_not_accumulated() {
        let rows = vec![scored(Some("Sales"), 1)];
        let a = summarize(&rows, Some("Department"));
        let b = summarize(&rows, Some("Department"));
        assert_eq!(a, b);
    }
}
