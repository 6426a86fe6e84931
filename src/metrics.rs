/// Derived-Metric Calculator
///
/// Adds row-level columns that are not in the source file: the growth
/// between two test windows, and the percentile quartile a student falls in
/// within the current selection. Both are computed from the view they are
/// given, so they change with the active filters.

use crate::error::{ExplorerError, Result};
use crate::schema::GrowthWindow;
use crate::view::DataView;
use log::debug;
use std::cmp::Ordering;

/// Name of the column added by [`compute_growth`]
pub const GROWTH_COLUMN: &str = "growth_metric";
/// Name of the column added by [`compute_quartiles`]
pub const QUARTILE_COLUMN: &str = "percentile_quartile";
pub const QUARTILE_LABELS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

const QUARTILE_COUNT: usize = 4;

/// Add `growth_metric = end - start` for the window's subject.
///
/// Rows missing either score get a missing growth value; nothing is
/// coerced to zero. Fails with `SchemaMismatch` if either score column
/// is absent.
pub fn compute_growth(view: DataView, window: &GrowthWindow) -> Result<DataView> {
    let start_name = window.start_column();
    let end_name = window.end_column();

    let growth: Vec<Option<f64>> = {
        let start = view.column(&start_name)?;
        let end = view.column(&end_name)?;
        (0..view.len())
            .map(|row| match (start.f64_at(row), end.f64_at(row)) {
                (Some(s), Some(e)) => Some(e - s),
                _ => None,
            })
            .collect()
    };

    debug!(
        "growth {} -> {}: {} of {} rows have both scores",
        start_name,
        end_name,
        growth.iter().filter(|g| g.is_some()).count(),
        growth.len()
    );

    view.with_numeric_column(GROWTH_COLUMN, growth)
}

/// Add `percentile_quartile` (Q1..Q4) by ranking the non-missing values of
/// `percentile_column` within this view.
///
/// Buckets are rank based: values are ordered (ties by row position) and
/// split into four runs whose sizes differ by at most one. Rows with a
/// missing percentile get a missing label. Fewer than four distinct values
/// make the split meaningless and fail with `InsufficientData`.
pub fn compute_quartiles(view: DataView, percentile_column: &str) -> Result<DataView> {
    let mut ranked: Vec<(usize, f64)> = {
        let column = view.column(percentile_column)?;
        (0..view.len())
            .filter_map(|row| column.f64_at(row).map(|v| (row, v)))
            .collect()
    };

    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

    let distinct = count_distinct_sorted(ranked.iter().map(|(_, v)| *v));
    if distinct < QUARTILE_COUNT {
        return Err(ExplorerError::InsufficientData {
            column: percentile_column.to_string(),
            distinct,
            required: QUARTILE_COUNT,
        });
    }

    let n = ranked.len();
    let mut labels: Vec<Option<String>> = vec![None; view.len()];
    for (rank, (row, _)) in ranked.iter().enumerate() {
        let bucket = rank * QUARTILE_COUNT / n;
        labels[*row] = Some(QUARTILE_LABELS[bucket].to_string());
    }

    view.with_label_column(QUARTILE_COLUMN, labels)
}

fn count_distinct_sorted(values: impl Iterator<Item = f64>) -> usize {
    let mut count = 0;
    let mut last: Option<f64> = None;
    for v in values {
        if last != Some(v) {
            count += 1;
            last = Some(v);
        }
    }
    count
}
