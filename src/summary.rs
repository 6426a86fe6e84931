/// Aggregation/Summary Builder
///
/// Groups a view by one or two categorical keys (teacher, grade, quartile)
/// and reports per-group goal attainment and growth against target.
///
/// Rows with a missing group key or a missing metric are dropped *before*
/// grouping, so a partial record never contributes to any statistic. Groups
/// smaller than the minimum size are discarded after grouping.

use crate::error::{ExplorerError, Result};
use crate::schema::Subject;
use crate::view::{ColumnRef, DataView};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    #[default]
    Descending,
}

/// The per-group statistic used to order summary rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMetric {
    Count,
    #[default]
    MetGoalRate,
    MeanGrowth,
    MeanTarget,
    GrowthAboveTarget,
}

/// Source columns for the three averaged metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumns {
    /// Boolean (or 0/1) "met goal" indicator
    pub indicator: String,
    pub growth: String,
    pub target: String,
}

impl MetricColumns {
    pub fn new(indicator: impl Into<String>, growth: impl Into<String>, target: impl Into<String>) -> Self {
        MetricColumns {
            indicator: indicator.into(),
            growth: growth.into(),
            target: target.into(),
        }
    }

    /// The subject's own goal, growth and fall-to-fall target columns.
    pub fn for_subject(subject: Subject) -> Self {
        MetricColumns::new(subject.goal_column(), subject.growth_column(), subject.target_column())
    }

    /// Use another growth column, e.g. a computed `growth_metric`.
    pub fn with_growth(mut self, growth: impl Into<String>) -> Self {
        self.growth = growth.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub group_keys: Vec<String>,
    pub min_group_size: usize,
    pub metrics: MetricColumns,
    pub sort_by: SummaryMetric,
    pub order: SortOrder,
}

impl SummaryRequest {
    /// Request with the default minimum group size (5), sorted by goal
    /// attainment, highest first.
    pub fn new<I, S>(group_keys: I, metrics: MetricColumns) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SummaryRequest {
            group_keys: group_keys.into_iter().map(Into::into).collect(),
            min_group_size: crate::config::DEFAULT_MIN_GROUP_SIZE,
            metrics,
            sort_by: SummaryMetric::default(),
            order: SortOrder::default(),
        }
    }

    pub fn with_min_group_size(mut self, min_group_size: usize) -> Self {
        self.min_group_size = min_group_size;
        self
    }

    pub fn sorted_by(mut self, metric: SummaryMetric, order: SortOrder) -> Self {
        self.sort_by = metric;
        self.order = order;
        self
    }
}

/// One output row per distinct group-key tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummaryRow {
    /// Group key values, in `group_keys` order
    pub keys: Vec<String>,
    pub count: usize,
    /// Mean of the goal indicator, a proportion in [0, 1]
    pub met_goal_rate: f64,
    pub mean_growth: f64,
    pub mean_target: f64,
    /// `mean_growth - mean_target`
    pub growth_above_target: f64,
}

impl GroupSummaryRow {
    pub fn metric(&self, metric: SummaryMetric) -> f64 {
        match metric {
            SummaryMetric::Count => self.count as f64,
            SummaryMetric::MetGoalRate => self.met_goal_rate,
            SummaryMetric::MeanGrowth => self.mean_growth,
            SummaryMetric::MeanTarget => self.mean_target,
            SummaryMetric::GrowthAboveTarget => self.growth_above_target,
        }
    }

    /// Keys joined for display, e.g. `"Smith / 5"`.
    pub fn label(&self) -> String {
        self.keys.join(" / ")
    }
}

#[derive(Default)]
struct GroupAccumulator {
    keys: Vec<String>,
    count: usize,
    indicator_sum: f64,
    growth_sum: f64,
    target_sum: f64,
}

impl GroupAccumulator {
    fn finish(self) -> GroupSummaryRow {
        let n = self.count as f64;
        let mean_growth = self.growth_sum / n;
        let mean_target = self.target_sum / n;
        GroupSummaryRow {
            keys: self.keys,
            count: self.count,
            met_goal_rate: self.indicator_sum / n,
            mean_growth,
            mean_target,
            growth_above_target: mean_growth - mean_target,
        }
    }
}

/// Group `view` by `request.group_keys` and compute per-group statistics.
///
/// Output order is by the requested metric; ties keep the order in which
/// groups first appear in the view. Fails with `EmptyGroupSet` when no
/// group reaches `min_group_size`, and with `SchemaMismatch` when a key or
/// metric column is absent.
pub fn summarize(view: &DataView, request: &SummaryRequest) -> Result<Vec<GroupSummaryRow>> {
    let keys: Vec<ColumnRef<'_>> = request
        .group_keys
        .iter()
        .map(|k| view.column(k))
        .collect::<Result<_>>()?;
    let indicator = view.column(&request.metrics.indicator)?;
    let growth = view.column(&request.metrics.growth)?;
    let target = view.column(&request.metrics.target)?;

    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<GroupAccumulator> = Vec::new();
    let mut dropped_rows = 0usize;

    for row in 0..view.len() {
        let key: Option<Vec<String>> = keys.iter().map(|k| k.key_at(row)).collect();
        let (Some(key), Some(ind), Some(gr), Some(tg)) =
            (key, indicator.f64_at(row), growth.f64_at(row), target.f64_at(row))
        else {
            dropped_rows += 1;
            continue;
        };

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(GroupAccumulator {
                keys: key,
                ..GroupAccumulator::default()
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.count += 1;
        group.indicator_sum += ind;
        group.growth_sum += gr;
        group.target_sum += tg;
    }

    let considered = groups.len();
    let mut rows: Vec<GroupSummaryRow> = groups
        .into_iter()
        .filter(|g| g.count >= request.min_group_size)
        .map(GroupAccumulator::finish)
        .collect();

    debug!(
        "summarize by {:?}: {} rows dropped as incomplete, {} of {} groups below size {}",
        request.group_keys,
        dropped_rows,
        considered - rows.len(),
        considered,
        request.min_group_size
    );

    if rows.is_empty() {
        return Err(ExplorerError::EmptyGroupSet {
            groups: considered,
            min_group_size: request.min_group_size,
        });
    }

    rows.sort_by(|a, b| {
        let ord = a
            .metric(request.sort_by)
            .partial_cmp(&b.metric(request.sort_by))
            .unwrap_or(Ordering::Equal);
        match request.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorerConfig;
    use crate::table::Table;
    use std::collections::HashSet;
    use std::sync::Arc;

    const HEADER: &str = "mat_teacher_1,grade_2015,met_math_growth,math_growth,ftf_2015_Fall_mathematics\n";

    fn view(body: &str) -> DataView {
        let csv = format!("{}{}", HEADER, body);
        let table = Table::from_csv_str("students", &csv, &ExplorerConfig::default()).unwrap();
        DataView::full(Arc::new(table))
    }

    fn rows(teacher: &str, grade: u32, n: usize, met: usize, growth: f64, target: f64) -> String {
        (0..n)
            .map(|i| format!("{},{},{},{},{}\n", teacher, grade, if i < met { "True" } else { "False" }, growth, target))
            .collect()
    }

    fn by_teacher() -> SummaryRequest {
        SummaryRequest::new(["mat_teacher_1"], MetricColumns::for_subject(Subject::Mathematics))
    }

    #[test]
    fn test_basic_summary() {
        let body = rows("Smith", 5, 6, 3, 10.0, 8.0) + &rows("Jones", 5, 5, 5, 4.0, 6.0);
        let summary = summarize(&view(&body), &by_teacher()).unwrap();

        assert_eq!(summary.len(), 2);
        let jones = &summary[0];
        assert_eq!(jones.keys, vec!["Jones"]);
        assert_eq!(jones.count, 5);
        assert_eq!(jones.met_goal_rate, 1.0);
        assert_eq!(jones.growth_above_target, -2.0);

        let smith = &summary[1];
        assert_eq!(smith.met_goal_rate, 0.5);
        assert_eq!(smith.mean_growth, 10.0);
        assert_eq!(smith.mean_target, 8.0);
        assert_eq!(smith.growth_above_target, 2.0);
    }

    #[test]
    fn test_small_group_excluded_even_if_all_met() {
        let body = rows("Small", 5, 4, 4, 20.0, 5.0) + &rows("Big", 5, 5, 1, 1.0, 5.0);
        let summary = summarize(&view(&body), &by_teacher()).unwrap();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].keys, vec!["Big"]);
    }

    #[test]
    fn test_empty_group_set() {
        let body = rows("Small", 5, 4, 4, 20.0, 5.0);
        let err = summarize(&view(&body), &by_teacher()).unwrap_err();
        assert!(matches!(err, ExplorerError::EmptyGroupSet { groups: 1, min_group_size: 5 }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_drop_then_group() {
        // Five complete rows plus two partial rows for the same teacher.
        // If partial rows were grouped first the count would be 7.
        let body = rows("Smith", 5, 5, 5, 10.0, 8.0) + "Smith,5,True,,8\nSmith,5,,10,8\n";
        let summary = summarize(&view(&body), &by_teacher()).unwrap();
        assert_eq!(summary[0].count, 5);

        // Four complete rows plus a partial one never reaches the minimum
        let body = rows("Smith", 5, 4, 4, 10.0, 8.0) + "Smith,5,True,,8\n";
        assert!(summarize(&view(&body), &by_teacher()).is_err());
    }

    #[test]
    fn test_missing_sentinel_keys_are_dropped() {
        let body = rows("", 5, 6, 6, 10.0, 8.0) + &rows("Smith", 5, 5, 0, 1.0, 8.0);
        let summary = summarize(&view(&body), &by_teacher()).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].keys, vec!["Smith"]);
    }

    #[test]
    fn test_two_keys_and_sort_ascending() {
        let body = rows("Smith", 5, 5, 1, 3.0, 5.0)
            + &rows("Smith", 6, 5, 2, 9.0, 5.0)
            + &rows("Jones", 5, 5, 3, 1.0, 5.0);
        let request = SummaryRequest::new(
            ["mat_teacher_1", "grade_2015"],
            MetricColumns::for_subject(Subject::Mathematics),
        )
        .sorted_by(SummaryMetric::GrowthAboveTarget, SortOrder::Ascending);

        let summary = summarize(&view(&body), &request).unwrap();
        let labels: Vec<String> = summary.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Jones / 5", "Smith / 5", "Smith / 6"]);
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let body = rows("C", 5, 5, 5, 1.0, 1.0) + &rows("A", 5, 5, 5, 1.0, 1.0) + &rows("B", 5, 5, 5, 1.0, 1.0);
        let summary = summarize(&view(&body), &by_teacher()).unwrap();
        let labels: Vec<String> = summary.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_resummarize_is_idempotent() {
        let body = rows("Smith", 5, 6, 3, 10.0, 8.0)
            + &rows("Tiny", 5, 2, 2, 3.0, 1.0)
            + &rows("Jones", 5, 5, 5, 4.0, 6.0);
        let view = view(&body);
        let first = summarize(&view, &by_teacher()).unwrap();

        let kept: HashSet<String> = first.iter().map(|r| r.keys[0].clone()).collect();
        let teacher = view.column("mat_teacher_1").unwrap();
        let reduced = view.retain_where(|row| teacher.key_at(row).is_some_and(|k| kept.contains(&k)));

        let second = summarize(&reduced, &by_teacher()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_computed_growth_column() {
        let view = view(&rows("Smith", 5, 5, 5, 10.0, 8.0))
            .with_numeric_column("growth_metric", vec![Some(2.0); 5])
            .unwrap();
        let request = SummaryRequest::new(
            ["mat_teacher_1"],
            MetricColumns::for_subject(Subject::Mathematics).with_growth("growth_metric"),
        );
        let summary = summarize(&view, &request).unwrap();
        assert_eq!(summary[0].mean_growth, 2.0);
        assert_eq!(summary[0].growth_above_target, -6.0);
    }

    #[test]
    fn test_missing_metric_column() {
        let request = SummaryRequest::new(["mat_teacher_1"], MetricColumns::for_subject(Subject::Reading));
        assert!(matches!(
            summarize(&view(&rows("Smith", 5, 5, 5, 1.0, 1.0)), &request),
            Err(ExplorerError::SchemaMismatch { .. })
        ));
    }
}
