use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::scanner::{AggregationResult, SubtreeStats};

pub const TOTAL_LABEL: &str = "TOTAL";

/// One top-level entry compared across both roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub size1: u64,
    pub size2: u64,
    pub size_differs: bool,
    pub count1: u64,
    pub count2: u64,
    pub count_differs: bool,
    pub any_diff: bool,
}

impl ReportRow {
    pub fn new(name: impl Into<String>, left: SubtreeStats, right: SubtreeStats) -> Self {
        let size_differs = left.size != right.size;
        let count_differs = left.files != right.files;
        Self {
            name: name.into(),
            size1: left.size,
            size2: right.size,
            size_differs,
            count1: left.files,
            count2: right.files,
            count_differs,
            any_diff: size_differs || count_differs,
        }
    }
}

/// Column sums plus the number of rows flagged in each diff column.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportTotals {
    pub size1: u64,
    pub size2: u64,
    pub size_diffs: usize,
    pub count1: u64,
    pub count2: u64,
    pub count_diffs: usize,
    pub diffs: usize,
}

impl ReportTotals {
    fn add_row(&mut self, row: &ReportRow) {
        self.size1 += row.size1;
        self.size2 += row.size2;
        self.count1 += row.count1;
        self.count2 += row.count2;
        self.size_diffs += usize::from(row.size_differs);
        self.count_diffs += usize::from(row.count_differs);
        self.diffs += usize::from(row.any_diff);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub folder1: String,
    pub folder2: String,
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
}

impl Report {
    pub fn has_differences(&self) -> bool {
        self.totals.diffs > 0
    }
}

/// Case-insensitive first, then case-sensitive so equal-folding names keep a fixed order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Lines up both results by entry name.
///
/// Totals always cover every row; `only_diffs` only hides matching rows
/// from `rows`.
pub fn merge(
    left: &AggregationResult,
    right: &AggregationResult,
    folder1: &str,
    folder2: &str,
    only_diffs: bool,
) -> Report {
    let mut names: Vec<&str> = left
        .entries
        .keys()
        .chain(right.entries.keys())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.sort_by(|a, b| compare_names(a, b));

    let mut totals = ReportTotals::default();
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let row = ReportRow::new(
            name,
            left.get(name).unwrap_or_default(),
            right.get(name).unwrap_or_default(),
        );
        totals.add_row(&row);
        if !only_diffs || row.any_diff {
            rows.push(row);
        }
    }

    Report {
        folder1: folder1.to_string(),
        folder2: folder2.to_string(),
        rows,
        totals,
    }
}
