/// Filter → derived metrics → summary, run once per interaction.
///
/// `recompute` holds no state between calls: every selection change runs
/// the whole chain again against the shared, immutable dataset.

use crate::charts::{self, BoxPlotStats, Heatmap, Histogram, ScatterSeries, DEFAULT_HISTOGRAM_BINS};
use crate::config::ExplorerConfig;
use crate::error::Result;
use crate::filter::{filter, FilterPredicateSet};
use crate::metrics::{compute_growth, compute_quartiles, GROWTH_COLUMN, QUARTILE_COLUMN};
use crate::schema::{rit_columns, GrowthWindow, Subject, ATTENDANCE_COLUMN, GRADE_COLUMN};
use crate::summary::{summarize, GroupSummaryRow, MetricColumns, SortOrder, SummaryMetric, SummaryRequest};
use crate::table::{Schema, Table};
use crate::view::DataView;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shown instead of a chart when the filters leave no rows.
pub const NO_MATCHING_ROWS: &str = "No data matches your filter selection.";

fn default_bins() -> usize {
    DEFAULT_HISTOGRAM_BINS
}

/// What the presentation layer wants drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    /// RIT score against attendance or tardiness
    Scatter { x_column: String, y_column: String },
    /// Growth over `window`, boxed by percentile quartile
    GrowthByQuartile {
        window: GrowthWindow,
        percentile_column: String,
    },
    Histogram {
        column: String,
        #[serde(default = "default_bins")]
        bins: usize,
    },
    /// Per-teacher goal attainment and growth against target. When a window
    /// is given, growth is measured across it instead of the stored column.
    TeacherSummary {
        subject: Subject,
        #[serde(default)]
        window: Option<GrowthWindow>,
        #[serde(default)]
        sort_by: SummaryMetric,
        #[serde(default)]
        order: SortOrder,
    },
    /// Teacher × grade matrix of one summary metric
    TeacherGradeHeatmap {
        subject: Subject,
        #[serde(default)]
        metric: SummaryMetric,
    },
}

impl Query {
    /// Attendance against the first RIT column, if the dataset has one.
    pub fn default_for(schema: &Schema) -> Option<Query> {
        let y = rit_columns(schema).into_iter().next()?;
        Some(Query::Scatter {
            x_column: ATTENDANCE_COLUMN.to_string(),
            y_column: y.name(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Scatter { .. } => "scatter",
            Query::GrowthByQuartile { .. } => "growth_by_quartile",
            Query::Histogram { .. } => "histogram",
            Query::TeacherSummary { .. } => "teacher_summary",
            Query::TeacherGradeHeatmap { .. } => "teacher_grade_heatmap",
        }
    }

    /// Source columns the query reads.
    pub fn required_columns(&self) -> Vec<String> {
        match self {
            Query::Scatter { x_column, y_column } => vec![x_column.clone(), y_column.clone()],
            Query::GrowthByQuartile {
                window,
                percentile_column,
            } => vec![window.start_column(), window.end_column(), percentile_column.clone()],
            Query::Histogram { column, .. } => vec![column.clone()],
            Query::TeacherSummary { subject, window, .. } => {
                let mut columns = vec![
                    subject.teacher_column().to_string(),
                    subject.goal_column().to_string(),
                    subject.target_column().to_string(),
                ];
                match window {
                    Some(w) => columns.extend([w.start_column(), w.end_column()]),
                    None => columns.push(subject.growth_column().to_string()),
                }
                columns
            }
            Query::TeacherGradeHeatmap { subject, .. } => vec![
                subject.teacher_column().to_string(),
                GRADE_COLUMN.to_string(),
                subject.goal_column().to_string(),
                subject.growth_column().to_string(),
                subject.target_column().to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartData {
    Scatter(ScatterSeries),
    BoxPlot { boxes: Vec<BoxPlotStats> },
    Histogram(Histogram),
    Heatmap(Heatmap),
    Bar { rows: Vec<GroupSummaryRow> },
    /// Nothing to draw; `reason` is shown to the user instead
    Placeholder { reason: String },
}

impl ChartData {
    pub fn placeholder(reason: impl Into<String>) -> Self {
        ChartData::Placeholder { reason: reason.into() }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChartData::Placeholder { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub filtered_rows: usize,
    /// True when no filter was active
    pub unconstrained: bool,
    pub chart: ChartData,
}

impl PipelineOutput {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Run one full recomputation for the current selection.
///
/// Missing columns are fatal and returned as `SchemaMismatch`. An empty
/// selection, too few distinct percentiles, or no group reaching the
/// minimum size all come back as `ChartData::Placeholder`.
pub fn recompute(
    table: &Arc<Table>,
    predicates: &FilterPredicateSet,
    query: &Query,
    config: &ExplorerConfig,
) -> Result<PipelineOutput> {
    let required = query.required_columns();
    let required: Vec<&str> = required.iter().map(String::as_str).collect();
    table.schema().require(&required)?;

    let filtered = filter(table, predicates)?;
    let filtered_rows = filtered.len();
    let unconstrained = filtered.is_unconstrained();
    debug!("recompute {}: {} rows selected", query.kind(), filtered_rows);

    let chart = if filtered.is_empty() {
        ChartData::placeholder(NO_MATCHING_ROWS)
    } else {
        match build_chart(filtered.into_view(), query, config) {
            Ok(chart) => chart,
            Err(err) if err.is_recoverable() => {
                warn!("{} has nothing to draw: {}", query.kind(), err);
                ChartData::placeholder(err.to_string())
            }
            Err(err) => return Err(err),
        }
    };

    Ok(PipelineOutput {
        filtered_rows,
        unconstrained,
        chart,
    })
}

fn build_chart(view: DataView, query: &Query, config: &ExplorerConfig) -> Result<ChartData> {
    match query {
        Query::Scatter { x_column, y_column } => {
            Ok(ChartData::Scatter(charts::scatter_points(&view, x_column, y_column)?))
        }
        Query::GrowthByQuartile {
            window,
            percentile_column,
        } => {
            let view = compute_growth(view, window)?;
            let view = compute_quartiles(view, percentile_column)?;
            let boxes = charts::box_plot_by_group(&view, QUARTILE_COLUMN, GROWTH_COLUMN)?;
            Ok(ChartData::BoxPlot { boxes })
        }
        Query::Histogram { column, bins } => Ok(ChartData::Histogram(charts::histogram(&view, column, *bins)?)),
        Query::TeacherSummary {
            subject,
            window,
            sort_by,
            order,
        } => {
            let mut metrics = MetricColumns::for_subject(*subject);
            let view = match window {
                Some(window) => {
                    metrics = metrics.with_growth(GROWTH_COLUMN);
                    compute_growth(view, window)?
                }
                None => view,
            };
            let request = SummaryRequest::new([subject.teacher_column()], metrics)
                .with_min_group_size(config.min_group_size)
                .sorted_by(*sort_by, *order);
            Ok(ChartData::Bar {
                rows: summarize(&view, &request)?,
            })
        }
        Query::TeacherGradeHeatmap { subject, metric } => {
            let request = SummaryRequest::new(
                [subject.teacher_column(), GRADE_COLUMN],
                MetricColumns::for_subject(*subject),
            )
            .with_min_group_size(config.min_group_size);
            let rows = summarize(&view, &request)?;
            Ok(ChartData::Heatmap(charts::heatmap(&rows, *metric)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExplorerError;
    use crate::filter::TeacherChangeMode;

    const HEADER: &str = "grade_2015,school_2015,mat_teacher_1,ela_teacher_1,attendance_rate,tardy_rate,\
rit_2015_Fall_mathematics,rit_2016_Fall_mathematics,percentile_2016,met_math_growth,math_growth,\
ftf_2015_Fall_mathematics,is_teacher_change_mat,is_teacher_change_ela\n";

    // Smith teaches rows 0-5, Jones rows 6-10, Lee row 11.
    fn fixture() -> Arc<Table> {
        let teachers = [
            "Smith", "Smith", "Smith", "Smith", "Smith", "Smith", "Jones", "Jones", "Jones", "Jones", "Jones", "Lee",
        ];
        let mut csv = String::from(HEADER);
        for (i, teacher) in teachers.iter().enumerate() {
            csv.push_str(&format!(
                "{},{},{},E{},{:.2},{:.2},{},{},{},{},{},{},{},{}\n",
                if i % 2 == 0 { 9 } else { 10 },
                if i < 6 { "A" } else { "B" },
                teacher,
                i % 3,
                0.80 + i as f64 * 0.01,
                0.01 * i as f64,
                190 + i,
                195 + 2 * i,
                10 + 7 * i,
                i % 3 != 0,
                5 + i,
                6,
                i == 0,
                i == 1,
            ));
        }
        Arc::new(Table::from_csv_str("students", &csv, &ExplorerConfig::default()).unwrap())
    }

    fn teacher_summary() -> Query {
        Query::TeacherSummary {
            subject: Subject::Mathematics,
            window: None,
            sort_by: SummaryMetric::MetGoalRate,
            order: SortOrder::Descending,
        }
    }

    #[test]
    fn test_unconstrained_scatter() {
        let table = fixture();
        let query = Query::default_for(table.schema()).unwrap();
        let output = recompute(&table, &FilterPredicateSet::new(), &query, &ExplorerConfig::default()).unwrap();

        assert!(output.unconstrained);
        assert_eq!(output.filtered_rows, 12);
        match output.chart {
            ChartData::Scatter(series) => {
                assert_eq!(series.y_column, "rit_2015_Fall_mathematics");
                assert_eq!(series.points.len(), 12);
            }
            other => panic!("expected scatter, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_selection_is_placeholder() {
        let table = fixture();
        let predicates = FilterPredicateSet::new().with_values("school_2015", ["Z"]);
        let output = recompute(&table, &predicates, &teacher_summary(), &ExplorerConfig::default()).unwrap();

        assert!(!output.unconstrained);
        assert_eq!(output.filtered_rows, 0);
        assert_eq!(output.chart, ChartData::placeholder(NO_MATCHING_ROWS));
    }

    #[test]
    fn test_teacher_summary_bar() {
        let table = fixture();
        let output = recompute(&table, &FilterPredicateSet::new(), &teacher_summary(), &ExplorerConfig::default())
            .unwrap();

        let ChartData::Bar { rows } = output.chart else {
            panic!("expected bar chart");
        };
        // Lee has a single student and is dropped
        let teachers: Vec<&str> = rows.iter().map(|r| r.keys[0].as_str()).collect();
        assert_eq!(teachers, vec!["Smith", "Jones"]);
        assert_eq!(rows[0].count, 6);
        assert!((rows[0].met_goal_rate - 4.0 / 6.0).abs() < 1e-9);
        assert!((rows[1].met_goal_rate - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_teacher_summary_over_window() {
        let table = fixture();
        let query = Query::TeacherSummary {
            subject: Subject::Mathematics,
            window: Some(GrowthWindow::fall_to_fall(2015, 2016, "mathematics")),
            sort_by: SummaryMetric::MeanGrowth,
            order: SortOrder::Ascending,
        };
        let output = recompute(&table, &FilterPredicateSet::new(), &query, &ExplorerConfig::default()).unwrap();

        let ChartData::Bar { rows } = output.chart else {
            panic!("expected bar chart");
        };
        // Growth over the window is 5 + i: Smith averages 7.5, Jones 13
        assert_eq!(rows[0].keys, vec!["Smith"]);
        assert!((rows[0].mean_growth - 7.5).abs() < 1e-9);
        assert!((rows[1].mean_growth - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_groups_become_placeholder() {
        let table = fixture();
        let query = Query::TeacherGradeHeatmap {
            subject: Subject::Mathematics,
            metric: SummaryMetric::MetGoalRate,
        };
        let output = recompute(&table, &FilterPredicateSet::new(), &query, &ExplorerConfig::default()).unwrap();
        assert!(output.chart.is_placeholder());

        let config = ExplorerConfig {
            min_group_size: 2,
            ..ExplorerConfig::default()
        };
        let output = recompute(&table, &FilterPredicateSet::new(), &query, &config).unwrap();
        let ChartData::Heatmap(map) = output.chart else {
            panic!("expected heatmap");
        };
        assert_eq!(map.row_labels, vec!["Jones", "Smith"]);
        assert_eq!(map.column_labels, vec!["9", "10"]);
        // Smith grade 9 is rows 0, 2, 4; only rows 2 and 4 met the goal
        let smith_9 = map.cell("Smith", "9").unwrap();
        assert!((smith_9 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_by_quartile() {
        let table = fixture();
        let query = Query::GrowthByQuartile {
            window: GrowthWindow::fall_to_fall(2015, 2016, "mathematics"),
            percentile_column: "percentile_2016".to_string(),
        };
        let output = recompute(&table, &FilterPredicateSet::new(), &query, &ExplorerConfig::default()).unwrap();

        let ChartData::BoxPlot { boxes } = output.chart else {
            panic!("expected box plot");
        };
        let labels: Vec<&str> = boxes.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Q1", "Q2", "Q3", "Q4"]);
        assert!(boxes.iter().all(|b| b.count == 3));
        // Lowest percentiles are the first three rows: growth 5, 6, 7
        assert_eq!(boxes[0].median, 6.0);
    }

    #[test]
    fn test_insufficient_quartiles_become_placeholder() {
        let table = fixture();
        let predicates = FilterPredicateSet::new().with_values("mat_teacher_1", ["Lee"]);
        let query = Query::GrowthByQuartile {
            window: GrowthWindow::fall_to_fall(2015, 2016, "mathematics"),
            percentile_column: "percentile_2016".to_string(),
        };
        let output = recompute(&table, &predicates, &query, &ExplorerConfig::default()).unwrap();

        assert_eq!(output.filtered_rows, 1);
        assert!(output.chart.is_placeholder());
    }

    #[test]
    fn test_teacher_change_mode_reaches_chart() {
        let table = fixture();
        let predicates = FilterPredicateSet::new().with_teacher_change(TeacherChangeMode::ChangedEither);
        let query = Query::Histogram {
            column: "tardy_rate".to_string(),
            bins: 4,
        };
        let output = recompute(&table, &predicates, &query, &ExplorerConfig::default()).unwrap();

        assert_eq!(output.filtered_rows, 2);
        let ChartData::Histogram(hist) = output.chart else {
            panic!("expected histogram");
        };
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let table = fixture();
        let query = Query::Scatter {
            x_column: "attendance_rate".to_string(),
            y_column: "rit_2099_Fall_mathematics".to_string(),
        };
        let predicates = FilterPredicateSet::new().with_values("school_2015", ["Z"]);
        let err = recompute(&table, &predicates, &query, &ExplorerConfig::default()).unwrap_err();

        assert!(matches!(err, ExplorerError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_query_from_json() {
        let query: Query =
            serde_json::from_str(r#"{"kind":"teacher_summary","subject":"mathematics"}"#).unwrap();
        assert_eq!(query, teacher_summary());

        let query: Query = serde_json::from_str(r#"{"kind":"histogram","column":"tardy_rate"}"#).unwrap();
        assert_eq!(
            query,
            Query::Histogram {
                column: "tardy_rate".to_string(),
                bins: DEFAULT_HISTOGRAM_BINS
            }
        );
    }

    #[test]
    fn test_output_json_shape() {
        let output = PipelineOutput {
            filtered_rows: 0,
            unconstrained: false,
            chart: ChartData::placeholder(NO_MATCHING_ROWS),
        };
        let value: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(value["chart"]["chart"], "placeholder");
        assert_eq!(value["chart"]["reason"], NO_MATCHING_ROWS);
    }
}
