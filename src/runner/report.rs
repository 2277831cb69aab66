//! Summaries and orderings over run results.

#![allow(missing_docs)]

use std::cmp::Ordering;

use serde::Serialize;

use crate::cache::TestResultCache;
use crate::catalog::Catalog;
use crate::runner::executor::ResultRow;

/// Pass/fail counts over a (possibly partial) result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    /// Rows present so far, including an in-flight one.
    pub seen: usize,
    /// Tests in the corpus.
    pub total: usize,
}

impl RunSummary {
    /// Counts exclude in-flight rows.
    #[must_use]
    pub fn from_rows(rows: &[ResultRow], total: usize) -> Self {
        let passed = rows.iter().filter(|r| r.passed && !r.running).count();
        let failed = rows.iter().filter(|r| !r.passed && !r.running).count();
        Self {
            passed,
            failed,
            seen: rows.len(),
            total,
        }
    }

    #[must_use]
    pub fn pass_percent(&self) -> f64 {
        percent(self.passed, self.total)
    }

    /// One decimal, `"0.0"` for an empty corpus.
    #[must_use]
    pub fn pass_percent_label(&self) -> String {
        format!("{:.1}", self.pass_percent())
    }

    /// Whole-number progress through the corpus.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn progress_percent(&self) -> u64 {
        percent(self.seen, self.total).round() as u64
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// `12345` → `"12.34s"` (seconds and truncated centiseconds).
#[must_use]
pub fn format_elapsed(ms: u64) -> String {
    format!("{}.{:02}s", ms / 1000, (ms % 1000) / 10)
}

// ──────────────────── sorting ────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TestSortColumn {
    Ok,
    #[default]
    Id,
    Description,
}

/// Ordering of a finished result list; default is id ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestSort {
    pub column: TestSortColumn,
    pub direction: SortDirection,
}

impl TestSort {
    /// Clicking the active column ascending flips it; anything else sorts ascending.
    #[must_use]
    pub fn toggled(self, column: TestSortColumn) -> Self {
        let direction = if self.column == column && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self { column, direction }
    }
}

/// Stable sort; callers leave the list unsorted while a run is in flight.
pub fn sort_rows(rows: &mut [ResultRow], sort: TestSort) {
    rows.sort_by(|a, b| {
        let ordering = match sort.column {
            TestSortColumn::Ok => a.passed.cmp(&b.passed),
            TestSortColumn::Id => text_order(&a.test_id, &b.test_id),
            TestSortColumn::Description => text_order(&a.test_name, &b.test_name),
        };
        sort.direction.apply(ordering)
    });
}

/// Case-insensitive first, then exact, so the order is total.
fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ──────────────────── cross-parser comparison ────────────────────

/// One parser's latest stored run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserComparison {
    pub parser_id: String,
    pub parser_name: String,
    /// Parser version the record was produced with.
    pub version: String,
    pub suite_version: String,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub percent: f64,
    pub elapsed_ms: u64,
}

impl ParserComparison {
    #[must_use]
    pub fn percent_label(&self) -> String {
        format!("{:.1}", self.percent)
    }
}

/// Build a row per stored record; names come from the catalog when known.
#[must_use]
pub fn comparison_rows(
    records: &[(String, TestResultCache)],
    catalog: &Catalog,
) -> Vec<ParserComparison> {
    records
        .iter()
        .map(|(parser_id, cache)| {
            let passed = cache.passed();
            let total = cache.results.len();
            ParserComparison {
                parser_id: parser_id.clone(),
                parser_name: catalog.display_name(parser_id).to_string(),
                version: cache.parser_version.clone(),
                suite_version: cache.test_suite_version.clone(),
                passed,
                failed: total - passed,
                total,
                percent: percent(passed, total),
                elapsed_ms: cache.elapsed_time_ms,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum CompareSortColumn {
    #[cfg_attr(feature = "cli", value(name = "name"))]
    ParserName,
    Version,
    Passed,
    Failed,
    Total,
    #[default]
    Percent,
    Time,
}

/// Ordering of comparison rows; default is percent descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompareSort {
    pub column: CompareSortColumn,
    pub direction: SortDirection,
}

impl Default for CompareSort {
    fn default() -> Self {
        Self {
            column: CompareSortColumn::Percent,
            direction: SortDirection::Desc,
        }
    }
}

pub fn sort_comparisons(rows: &mut [ParserComparison], sort: CompareSort) {
    rows.sort_by(|a, b| {
        let ordering = match sort.column {
            CompareSortColumn::ParserName => text_order(&a.parser_name, &b.parser_name),
            CompareSortColumn::Version => text_order(&a.version, &b.version),
            CompareSortColumn::Passed => a.passed.cmp(&b.passed),
            CompareSortColumn::Failed => a.failed.cmp(&b.failed),
            CompareSortColumn::Total => a.total.cmp(&b.total),
            CompareSortColumn::Percent => a.percent.total_cmp(&b.percent),
            CompareSortColumn::Time => a.elapsed_ms.cmp(&b.elapsed_ms),
        };
        sort.direction.apply(ordering)
    });
}
