/// MapScope - MAP RIT Student Assessment Explorer
///
/// The data core behind an assessment dashboard: load the student table once,
/// filter it by the current sidebar selection, derive growth and percentile
/// quartiles, and reduce the result to chart-ready rows and group summaries.

pub mod charts;
pub mod column;
pub mod config;
pub mod error;
pub mod filter;
pub mod interner;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod summary;
pub mod table;
pub mod view;

pub use charts::{BoxPlotStats, Heatmap, Histogram, HistogramBin, ScatterPoint, ScatterSeries};
pub use column::{Column, ColumnType, ColumnValue};
pub use config::ExplorerConfig;
pub use error::{ErrorKind, ExplorerError, Result};
pub use filter::{filter, FilterPredicateSet, FilteredView, TeacherChangeMode};
pub use interner::{InternerStats, StringId, StringInterner};
pub use loader::{DatasetLoader, SourceStamp};
pub use metrics::{compute_growth, compute_quartiles, GROWTH_COLUMN, QUARTILE_COLUMN};
pub use pipeline::{recompute, ChartData, PipelineOutput, Query};
pub use schema::{GrowthWindow, RitColumn, Subject};
pub use summary::{summarize, GroupSummaryRow, MetricColumns, SortOrder, SummaryMetric, SummaryRequest};
pub use table::{Schema, Table};
pub use view::{ColumnRef, DataView};

// Python bindings - only when python feature is enabled
#[cfg(feature = "python")]
mod python_bindings;
#[cfg(feature = "python")]
pub use python_bindings::*;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    const HEADER: &str = "grade_2015,school_2015,mat_teacher_1,ela_teacher_1,attendance_rate,\
rit_2015_Fall_mathematics,rit_2016_Fall_mathematics,percentile_2016,met_math_growth,math_growth,\
ftf_2015_Fall_mathematics,is_teacher_change_mat,is_teacher_change_ela\n";

    /// 20 students, 10 per school. Grades are written as floats the way a
    /// spreadsheet export would (`5.0`), and two rows lack a math teacher.
    fn school_csv() -> String {
        let mut csv = String::from(HEADER);
        for i in 0..20 {
            let school = if i < 10 { "A" } else { "B" };
            let teacher = match i {
                3 | 13 => "",
                i if i % 2 == 0 => "Smith",
                _ => "Jones",
            };
            csv.push_str(&format!(
                "{}.0,{},{},Brown,0.9,{},{},{},{},{},5,{},false\n",
                5 + i % 2,
                school,
                teacher,
                195 + i,
                200 + 2 * i,
                i * 5,
                if i % 4 == 0 { "True" } else { "False" },
                5 + i,
                i == 7,
            ));
        }
        csv
    }

    fn load(csv: &str) -> (tempfile::NamedTempFile, DatasetLoader) {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(csv.as_bytes()).unwrap();
        file.flush().unwrap();
        let loader = DatasetLoader::new(ExplorerConfig::default().with_data_path(file.path()));
        (file, loader)
    }

    #[test]
    fn test_complete_workflow() {
        let (_file, loader) = load(&school_csv());
        let table = loader.load().unwrap();
        assert_eq!(table.len(), 20);

        // Identifier columns are strings with integral floats normalized
        assert_eq!(table.schema().get_column_type("grade_2015"), Some(ColumnType::String));
        assert_eq!(table.distinct_values("grade_2015").unwrap(), vec!["5", "6"]);
        // Missing teachers never show up as a filter option
        assert_eq!(table.distinct_values("mat_teacher_1").unwrap(), vec!["Jones", "Smith"]);

        let predicates = FilterPredicateSet::new().with_values("school_2015", ["A"]);
        let filtered = filter(&table, &predicates).unwrap();
        assert_eq!(filtered.len(), 10);

        let window = GrowthWindow::fall_to_fall(2015, 2016, "mathematics");
        let view = compute_growth(filtered.into_view(), &window).unwrap();
        let view = compute_quartiles(view, "percentile_2016").unwrap();
        assert!(view.has_column(GROWTH_COLUMN));
        assert!(view.has_column(QUARTILE_COLUMN));

        // Row 0 of school A: 200 - 195
        assert_eq!(view.get_value(0, GROWTH_COLUMN).unwrap().as_f64(), Some(5.0));

        let request = SummaryRequest::new(["mat_teacher_1"], MetricColumns::for_subject(Subject::Mathematics))
            .sorted_by(SummaryMetric::Count, SortOrder::Descending);
        let rows = summarize(&view, &request).unwrap();

        // School A: Smith has rows 0,2,4,6,8; Jones has 1,5,7,9 (row 3 has no teacher)
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keys, vec!["Smith"]);
        assert_eq!(rows[0].count, 5);
    }

    #[test]
    fn test_school_filter_scenario() {
        let table = Table::from_csv_str("students", &school_csv(), &ExplorerConfig::default()).unwrap();
        let table = Arc::new(table);

        let predicates = FilterPredicateSet::new().with_values("school_2015", ["A"]);
        let filtered = filter(&table, &predicates).unwrap();

        assert_eq!(filtered.len(), 10);
        for row in 0..filtered.len() {
            assert_eq!(
                filtered.view().get_value(row, "school_2015").unwrap().as_string(),
                Some("A")
            );
        }
    }

    #[test]
    fn test_empty_predicates_keep_everything() {
        let table = Arc::new(Table::from_csv_str("students", &school_csv(), &ExplorerConfig::default()).unwrap());

        let predicates = FilterPredicateSet::new()
            .with_values("school_2015", Vec::<String>::new())
            .with_values("grade_2015", Vec::<String>::new());
        let filtered = filter(&table, &predicates).unwrap();

        assert!(filtered.is_unconstrained());
        assert_eq!(filtered.len(), table.len());
        for row in 0..table.len() {
            assert_eq!(filtered.view().get_row(row).unwrap(), table.get_row(row).unwrap());
        }
    }

    #[test]
    fn test_numeric_identifier_filter_values() {
        let table = Arc::new(Table::from_csv_str("students", &school_csv(), &ExplorerConfig::default()).unwrap());

        // "5.0" in the file is offered and matched as "5"
        let predicates = FilterPredicateSet::new().with_values("grade_2015", ["5"]);
        assert_eq!(filter(&table, &predicates).unwrap().len(), 10);
    }

    #[test]
    fn test_teacher_change_through_pipeline() {
        let table = Arc::new(Table::from_csv_str("students", &school_csv(), &ExplorerConfig::default()).unwrap());
        let predicates = FilterPredicateSet::new().with_teacher_change(TeacherChangeMode::ChangedMath);
        let query = Query::Scatter {
            x_column: "attendance_rate".to_string(),
            y_column: "rit_2016_Fall_mathematics".to_string(),
        };

        let output = recompute(&table, &predicates, &query, &ExplorerConfig::default()).unwrap();
        assert_eq!(output.filtered_rows, 1);
        assert!(!output.unconstrained);
    }

    #[test]
    fn test_loader_cache_shared_by_pipeline_runs() {
        let (_file, loader) = load(&school_csv());
        let query = Query::TeacherSummary {
            subject: Subject::Mathematics,
            window: None,
            sort_by: SummaryMetric::MeanGrowth,
            order: SortOrder::Descending,
        };

        let first = loader.load().unwrap();
        let a = recompute(&first, &FilterPredicateSet::new(), &query, loader.config()).unwrap();
        let second = loader.load().unwrap();
        let b = recompute(&second, &FilterPredicateSet::new(), &query, loader.config()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fatal_and_recoverable_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DatasetLoader::new(ExplorerConfig::default().with_data_path(dir.path().join("none.csv")));
        let err = missing.load().unwrap_err();
        assert!(!err.is_recoverable());

        let table = Arc::new(Table::from_csv_str("students", &school_csv(), &ExplorerConfig::default()).unwrap());
        let predicates = FilterPredicateSet::new().with_values("mat_teacher_1", ["Jones"]);
        let query = Query::TeacherSummary {
            subject: Subject::Mathematics,
            window: None,
            sort_by: SummaryMetric::MetGoalRate,
            order: SortOrder::Descending,
        };
        let config = ExplorerConfig {
            min_group_size: 50,
            ..ExplorerConfig::default()
        };
        let output = recompute(&table, &predicates, &query, &config).unwrap();
        assert!(output.chart.is_placeholder());
    }
}
