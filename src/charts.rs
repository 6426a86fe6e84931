/// Chart-ready tables
///
/// Each function here reduces a view (or a summary) to the exact rows a
/// chart needs. Rendering itself is left to the presentation layer.

use crate::error::{ExplorerError, Result};
use crate::summary::{GroupSummaryRow, SummaryMetric};
use crate::table::compare_keys;
use crate::view::DataView;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub x_column: String,
    pub y_column: String,
    pub points: Vec<ScatterPoint>,
}

/// Pair up two numeric columns, skipping rows where either is missing.
pub fn scatter_points(view: &DataView, x_column: &str, y_column: &str) -> Result<ScatterSeries> {
    let x = view.column(x_column)?;
    let y = view.column(y_column)?;

    let points = (0..view.len())
        .filter_map(|row| match (x.f64_at(row), y.f64_at(row)) {
            (Some(x), Some(y)) => Some(ScatterPoint { x, y }),
            _ => None,
        })
        .collect();

    Ok(ScatterSeries {
        x_column: x_column.to_string(),
        y_column: y_column.to_string(),
        points,
    })
}

/// Five-number summary of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlotStats {
    pub label: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxPlotStats {
    /// Summarize `values`; `None` when there is nothing to summarize.
    pub fn from_values(label: impl Into<String>, mut values: Vec<f64>) -> Option<BoxPlotStats> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let last = values.len() - 1;
        Some(BoxPlotStats {
            label: label.into(),
            count: values.len(),
            min: values[0],
            q1: quantile_sorted(&values, 0.25),
            median: quantile_sorted(&values, 0.5),
            q3: quantile_sorted(&values, 0.75),
            max: values[last],
        })
    }
}

/// Linear-interpolated quantile of already sorted, non-empty values.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// One box per distinct value of `group_column`, ordered by label.
///
/// Rows with a missing group label or a missing value are skipped. Groups
/// left with no values produce no box.
pub fn box_plot_by_group(view: &DataView, group_column: &str, value_column: &str) -> Result<Vec<BoxPlotStats>> {
    let group = view.column(group_column)?;
    let value = view.column(value_column)?;

    let mut buckets: HashMap<String, Vec<f64>> = HashMap::new();
    for row in 0..view.len() {
        if let (Some(label), Some(v)) = (group.key_at(row), value.f64_at(row)) {
            buckets.entry(label).or_default().push(v);
        }
    }

    let mut labels: Vec<String> = buckets.keys().cloned().collect();
    labels.sort_by(|a, b| compare_keys(a, b));

    Ok(labels
        .into_iter()
        .filter_map(|label| {
            let values = buckets.remove(&label)?;
            BoxPlotStats::from_values(label, values)
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    pub bins: Vec<HistogramBin>,
    /// Rows skipped because the value was missing
    pub missing: usize,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Count values of `column` into `bin_count` equal-width bins over [min, max].
///
/// Bins are half-open except the last, which also takes `max`. A column
/// whose values are all equal yields a single bin.
pub fn histogram(view: &DataView, column: &str, bin_count: usize) -> Result<Histogram> {
    if bin_count == 0 {
        return Err(ExplorerError::InvalidValue {
            column: column.to_string(),
            details: "histogram needs at least one bin".to_string(),
        });
    }

    let values = view.numeric_values(column)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let missing = values.len() - present.len();

    let (min, max) = match present.iter().copied().fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    }) {
        Some(range) => range,
        None => {
            return Err(ExplorerError::InsufficientData {
                column: column.to_string(),
                distinct: 0,
                required: 1,
            })
        }
    };

    if min == max {
        return Ok(Histogram {
            column: column.to_string(),
            bins: vec![HistogramBin {
                lower: min,
                upper: max,
                count: present.len(),
            }],
            missing,
        });
    }

    let width = (max - min) / bin_count as f64;
    let mut bins: Vec<HistogramBin> = (0..bin_count)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bin_count { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for v in present {
        let index = (((v - min) / width) as usize).min(bin_count - 1);
        bins[index].count += 1;
    }

    Ok(Histogram {
        column: column.to_string(),
        bins,
        missing,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub metric: SummaryMetric,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `cells[r][c]`; `None` where no group exists for the pair
    pub cells: Vec<Vec<Option<f64>>>,
}

impl Heatmap {
    pub fn cell(&self, row_label: &str, column_label: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row_label)?;
        let c = self.column_labels.iter().position(|l| l == column_label)?;
        self.cells[r][c]
    }
}

/// Pivot two-key summary rows into a matrix of `metric`.
///
/// The first key becomes the row axis and the second the column axis; both
/// axes are sorted with numeric-aware ordering.
pub fn heatmap(rows: &[GroupSummaryRow], metric: SummaryMetric) -> Result<Heatmap> {
    if let Some(bad) = rows.iter().find(|r| r.keys.len() != 2) {
        return Err(ExplorerError::InvalidValue {
            column: bad.label(),
            details: format!("heatmap needs two group keys, found {}", bad.keys.len()),
        });
    }

    let mut row_labels: Vec<String> = Vec::new();
    let mut column_labels: Vec<String> = Vec::new();
    for r in rows {
        if !row_labels.contains(&r.keys[0]) {
            row_labels.push(r.keys[0].clone());
        }
        if !column_labels.contains(&r.keys[1]) {
            column_labels.push(r.keys[1].clone());
        }
    }
    row_labels.sort_by(|a, b| compare_keys(a, b));
    column_labels.sort_by(|a, b| compare_keys(a, b));

    let mut cells = vec![vec![None; column_labels.len()]; row_labels.len()];
    for r in rows {
        let ri = row_labels.iter().position(|l| *l == r.keys[0]);
        let ci = column_labels.iter().position(|l| *l == r.keys[1]);
        if let (Some(ri), Some(ci)) = (ri, ci) {
            cells[ri][ci] = Some(r.metric(metric));
        }
    }

    Ok(Heatmap {
        metric,
        row_labels,
        column_labels,
        cells,
    })
}
