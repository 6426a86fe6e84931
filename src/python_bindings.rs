/// Python bindings for MapScope using PyO3
///
/// The Streamlit dashboard drives the pipeline through this module: it opens
/// an `Explorer`, loads the cached `Dataset`, builds a `FilterSelection` from
/// the sidebar widgets and asks for chart-ready JSON.

use pyo3::exceptions::{PyFileNotFoundError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;

use crate::column::ColumnValue as RustColumnValue;
use crate::config::ExplorerConfig;
use crate::error::{ErrorKind, ExplorerError};
use crate::filter::{filter as rust_filter, FilterPredicateSet, TeacherChangeMode};
use crate::loader::DatasetLoader;
use crate::metrics::{compute_growth, compute_quartiles};
use crate::pipeline::{recompute as rust_recompute, Query};
use crate::schema::{self, GrowthWindow, Subject};
use crate::summary::{summarize as rust_summarize, MetricColumns, SortOrder, SummaryMetric, SummaryRequest};
use crate::table::Table as RustTable;

// ============================================================================
// Error and value conversion
// ============================================================================

pyo3::create_exception!(
    mapscope,
    InsufficientDataError,
    PyValueError,
    "Too little data left after filtering to compute the result; show a placeholder."
);

fn to_py_err(err: ExplorerError) -> PyErr {
    match err.kind() {
        ErrorKind::NotFound => PyFileNotFoundError::new_err(err.to_string()),
        ErrorKind::Schema => PyKeyError::new_err(err.to_string()),
        ErrorKind::Recoverable => InsufficientDataError::new_err(err.to_string()),
        ErrorKind::Invalid => PyValueError::new_err(err.to_string()),
    }
}

fn column_value_to_py(py: Python<'_>, value: &RustColumnValue) -> PyObject {
    match value {
        RustColumnValue::Int64(v) => v.into_py(py),
        RustColumnValue::Float64(v) => v.into_py(py),
        RustColumnValue::Bool(v) => v.into_py(py),
        RustColumnValue::String(v) => v.into_py(py),
        RustColumnValue::Null => py.None(),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> PyResult<T> {
    serde_json::from_str(text).map_err(|e| PyValueError::new_err(format!("Invalid {}: {}", what, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

// ============================================================================
// Explorer (loader + configuration)
// ============================================================================

/// Session entry point; owns the configuration and the dataset cache.
#[pyclass(name = "Explorer")]
pub struct PyExplorer {
    loader: DatasetLoader,
}

#[pymethods]
impl PyExplorer {
    /// Create an explorer.
    ///
    /// Args:
    ///     data_path: CSV file to explore. Defaults to MAPSCOPE_DATA, then
    ///         student_table_enriched.csv
    ///     config_path: Optional JSON configuration file
    #[new]
    #[pyo3(signature = (data_path=None, config_path=None))]
    fn new(data_path: Option<String>, config_path: Option<String>) -> PyResult<Self> {
        let mut config = match config_path {
            Some(path) => ExplorerConfig::from_json_file(path).map_err(to_py_err)?,
            None => ExplorerConfig::from_env(),
        };
        if let Some(path) = data_path {
            config = config.with_data_path(path);
        }
        config.validate().map_err(to_py_err)?;
        Ok(PyExplorer {
            loader: DatasetLoader::new(config),
        })
    }

    fn __repr__(&self) -> String {
        format!("Explorer(data_path='{}')", self.loader.config().data_path.display())
    }

    /// Load the dataset. Repeated calls return the cached table while the
    /// file is unchanged.
    fn load(&self) -> PyResult<PyDataset> {
        let table = self.loader.load().map_err(to_py_err)?;
        Ok(PyDataset { inner: table })
    }

    /// Drop the cached dataset.
    fn invalidate(&self) {
        self.loader.invalidate();
    }

    #[getter]
    fn min_group_size(&self) -> usize {
        self.loader.config().min_group_size
    }

    /// Run the pipeline for one query and return chart-ready JSON.
    ///
    /// Args:
    ///     selection: Current FilterSelection
    ///     query_json: e.g. '{"kind": "teacher_summary", "subject": "mathematics"}'
    fn recompute(&self, selection: &PyFilterSelection, query_json: &str) -> PyResult<String> {
        let table = self.loader.load().map_err(to_py_err)?;
        let query: Query = parse_json(query_json, "query")?;
        let output = rust_recompute(&table, &selection.inner, &query, self.loader.config()).map_err(to_py_err)?;
        output.to_json().map_err(to_py_err)
    }
}

// ============================================================================
// Dataset
// ============================================================================

#[pyclass(name = "Dataset")]
#[derive(Clone)]
pub struct PyDataset {
    inner: Arc<RustTable>,
}

#[pymethods]
impl PyDataset {
    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Dataset(name='{}', rows={}, columns={})",
            self.inner.name(),
            self.inner.len(),
            self.inner.schema().len()
        )
    }

    fn column_names(&self) -> Vec<String> {
        self.inner
            .schema()
            .get_column_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Sorted filter options for a categorical column, missing values excluded.
    fn distinct_values(&self, column: &str) -> PyResult<Vec<String>> {
        self.inner.distinct_values(column).map_err(to_py_err)
    }

    fn rit_columns(&self) -> Vec<String> {
        schema::rit_columns(self.inner.schema())
            .iter()
            .map(|c| c.name())
            .collect()
    }

    fn percentile_columns(&self) -> Vec<String> {
        schema::percentile_columns(self.inner.schema())
    }

    fn term_prefixes(&self) -> Vec<String> {
        schema::term_prefixes(self.inner.schema())
    }

    fn subjects(&self) -> Vec<String> {
        schema::subjects(self.inner.schema())
    }

    /// Get a row as a dictionary
    fn get_row(&self, py: Python<'_>, row: usize) -> PyResult<PyObject> {
        let values = self.inner.get_row(row).map_err(to_py_err)?;
        let dict = PyDict::new_bound(py);
        for (name, value) in values {
            dict.set_item(name, column_value_to_py(py, &value))?;
        }
        Ok(dict.into_any().unbind())
    }

    /// Rows matching `selection`, as a JSON array of row objects.
    fn filter_json(&self, selection: &PyFilterSelection) -> PyResult<String> {
        let filtered = rust_filter(&self.inner, &selection.inner).map_err(to_py_err)?;
        filtered.view().to_json().map_err(to_py_err)
    }

    /// Filtered rows with growth (and optionally quartiles) added, as JSON.
    ///
    /// Args:
    ///     selection: Current FilterSelection
    ///     subject: Subject suffix, e.g. "mathematics"
    ///     window_start: Column prefix of the earlier term, e.g. "rit_2015_Fall_"
    ///     window_end: Column prefix of the later term
    ///     percentile_column: When given, also bins this column into Q1..Q4;
    ///         raises InsufficientDataError below four distinct percentiles
    #[pyo3(signature = (selection, subject, window_start, window_end, percentile_column=None))]
    fn growth_json(
        &self,
        selection: &PyFilterSelection,
        subject: &str,
        window_start: &str,
        window_end: &str,
        percentile_column: Option<&str>,
    ) -> PyResult<String> {
        let window = GrowthWindow::new(window_start, window_end, subject);
        let filtered = rust_filter(&self.inner, &selection.inner).map_err(to_py_err)?;
        let mut view = compute_growth(filtered.into_view(), &window).map_err(to_py_err)?;
        if let Some(column) = percentile_column {
            view = compute_quartiles(view, column).map_err(to_py_err)?;
        }
        view.to_json().map_err(to_py_err)
    }

    /// Group summary of the filtered rows, as JSON.
    ///
    /// Raises InsufficientDataError when no group reaches `min_group_size`.
    ///
    /// Args:
    ///     selection: Current FilterSelection
    ///     group_keys: One or two categorical columns, e.g. ["mat_teacher_1"]
    ///     subject: "mathematics" or "reading"; picks goal/growth/target columns
    ///     min_group_size: Groups smaller than this are dropped
    ///     sort_by: "count", "met_goal_rate", "mean_growth", "mean_target"
    ///         or "growth_above_target"
    ///     ascending: Sort direction
    #[pyo3(signature = (selection, group_keys, subject, min_group_size=5, sort_by="met_goal_rate", ascending=false))]
    fn summarize_json(
        &self,
        selection: &PyFilterSelection,
        group_keys: Vec<String>,
        subject: &str,
        min_group_size: usize,
        sort_by: &str,
        ascending: bool,
    ) -> PyResult<String> {
        let subject: Subject = subject.parse().map_err(to_py_err)?;
        let metric: SummaryMetric = parse_json(&format!("\"{}\"", sort_by), "sort metric")?;
        let order = if ascending { SortOrder::Ascending } else { SortOrder::Descending };

        let request = SummaryRequest::new(group_keys, MetricColumns::for_subject(subject))
            .with_min_group_size(min_group_size)
            .sorted_by(metric, order);
        let filtered = rust_filter(&self.inner, &selection.inner).map_err(to_py_err)?;
        let rows = rust_summarize(filtered.view(), &request).map_err(to_py_err)?;
        to_json(&rows)
    }
}

// ============================================================================
// Filter selection
// ============================================================================

/// Sidebar state: accepted values per attribute plus the teacher-change mode.
#[pyclass(name = "FilterSelection")]
#[derive(Clone, Default)]
pub struct PyFilterSelection {
    inner: FilterPredicateSet,
}

#[pymethods]
impl PyFilterSelection {
    #[new]
    fn new() -> Self {
        PyFilterSelection::default()
    }

    fn __repr__(&self) -> String {
        format!(
            "FilterSelection(attributes={:?}, teacher_change='{}')",
            self.inner.constrained_attributes(),
            self.inner.teacher_change().label()
        )
    }

    /// Accept only `values` for `attribute`. An empty list removes the constraint.
    fn set_values(&mut self, attribute: String, values: Vec<String>) {
        self.inner.set_values(attribute, values);
    }

    /// Set the teacher-change mode by its display label, e.g. "Changed Either".
    fn set_teacher_change(&mut self, label: &str) -> PyResult<()> {
        let mode = TeacherChangeMode::from_label(label)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown teacher change mode: {}", label)))?;
        self.inner = std::mem::take(&mut self.inner).with_teacher_change(mode);
        Ok(())
    }

    /// Labels accepted by `set_teacher_change`, in display order.
    #[staticmethod]
    fn teacher_change_modes() -> Vec<&'static str> {
        TeacherChangeMode::ALL.iter().map(|m| m.label()).collect()
    }

    fn is_unconstrained(&self) -> bool {
        self.inner.is_unconstrained()
    }
}

#[pymodule]
fn mapscope(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyExplorer>()?;
    m.add_class::<PyDataset>()?;
    m.add_class::<PyFilterSelection>()?;
    m.add("InsufficientDataError", m.py().get_type_bound::<InsufficientDataError>())?;
    Ok(())
}
