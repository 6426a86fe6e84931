/// Data views
///
/// A `DataView` is a read-only selection of rows from a shared `Table`, plus
/// any derived columns computed for that selection. Filtering produces a new
/// view over the same table; deriving a column produces a new view carrying
/// one more column. The underlying table is never touched.

use crate::column::{Column, ColumnValue};
use crate::error::{ExplorerError, Result};
use crate::table::Table;
use std::collections::HashMap;
use std::sync::Arc;

/// Values of a column computed for a view, indexed by view position.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedValues {
    Numeric(Vec<Option<f64>>),
    Label(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    name: String,
    values: DerivedValues,
}

impl DerivedColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &DerivedValues {
        &self.values
    }

    fn retain(&self, keep: &[usize]) -> DerivedColumn {
        let values = match &self.values {
            DerivedValues::Numeric(v) => DerivedValues::Numeric(keep.iter().map(|&i| v[i]).collect()),
            DerivedValues::Label(v) => DerivedValues::Label(keep.iter().map(|&i| v[i].clone()).collect()),
        };
        DerivedColumn {
            name: self.name.clone(),
            values,
        }
    }
}

#[derive(Clone)]
pub struct DataView {
    table: Arc<Table>,
    /// view position -> table row index, in table order
    rows: Vec<usize>,
    derived: Vec<DerivedColumn>,
}

impl DataView {
    /// A view over every row of the table.
    pub fn full(table: Arc<Table>) -> Self {
        let rows = (0..table.len()).collect();
        DataView {
            table,
            rows,
            derived: Vec::new(),
        }
    }

    pub(crate) fn from_rows(table: Arc<Table>, rows: Vec<usize>) -> Self {
        DataView {
            table,
            rows,
            derived: Vec::new(),
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Table row index behind a view position
    pub fn parent_index(&self, view_row: usize) -> Option<usize> {
        self.rows.get(view_row).copied()
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn derived_columns(&self) -> &[DerivedColumn] {
        &self.derived
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.derived.iter().any(|d| d.name == name) || self.table.schema().contains(name)
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .table
            .schema()
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(self.derived.iter().map(|d| d.name.clone()));
        names
    }

    /// Resolve a column once for repeated per-row reads. Derived columns
    /// shadow table columns of the same name.
    pub fn column(&self, name: &str) -> Result<ColumnRef<'_>> {
        if let Some(derived) = self.derived.iter().find(|d| d.name == name) {
            return Ok(ColumnRef {
                view: self,
                source: Source::Derived(derived),
            });
        }
        let column = self.table.column(name)?;
        Ok(ColumnRef {
            view: self,
            source: Source::Table(column),
        })
    }

    pub fn get_value(&self, row: usize, column: &str) -> Result<ColumnValue> {
        if row >= self.rows.len() {
            return Err(ExplorerError::Malformed(format!(
                "row {} out of range [0, {})",
                row,
                self.len()
            )));
        }
        Ok(self.column(column)?.value_at(row))
    }

    pub fn get_row(&self, row: usize) -> Result<HashMap<String, ColumnValue>> {
        let parent = self.parent_index(row).ok_or_else(|| {
            ExplorerError::Malformed(format!("row {} out of range [0, {})", row, self.len()))
        })?;
        let mut result = self.table.get_row(parent)?;
        for derived in &self.derived {
            result.insert(derived.name.clone(), derived_value(derived, row));
        }
        Ok(result)
    }

    /// Numeric values of a column in view order (`None` = missing).
    pub fn numeric_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let col = self.column(column)?;
        Ok((0..self.len()).map(|row| col.f64_at(row)).collect())
    }

    /// New view with a numeric column added (or replaced, if the name exists).
    pub fn with_numeric_column(self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.with_derived(name.into(), DerivedValues::Numeric(values))
    }

    /// New view with a label column added (or replaced, if the name exists).
    pub fn with_label_column(self, name: impl Into<String>, values: Vec<Option<String>>) -> Result<Self> {
        self.with_derived(name.into(), DerivedValues::Label(values))
    }

    fn with_derived(mut self, name: String, values: DerivedValues) -> Result<Self> {
        let len = match &values {
            DerivedValues::Numeric(v) => v.len(),
            DerivedValues::Label(v) => v.len(),
        };
        if len != self.rows.len() {
            return Err(ExplorerError::InvalidValue {
                column: name,
                details: format!("expected {} values, got {}", self.rows.len(), len),
            });
        }
        self.derived.retain(|d| d.name != name);
        self.derived.push(DerivedColumn { name, values });
        Ok(self)
    }

    /// New view keeping only the positions for which `keep` returns true.
    /// Derived columns follow their rows.
    pub fn retain_where<F>(&self, mut keep: F) -> DataView
    where
        F: FnMut(usize) -> bool,
    {
        let kept: Vec<usize> = (0..self.rows.len()).filter(|&i| keep(i)).collect();
        DataView {
            table: Arc::clone(&self.table),
            rows: kept.iter().map(|&i| self.rows[i]).collect(),
            derived: self.derived.iter().map(|d| d.retain(&kept)).collect(),
        }
    }

    /// Export the view as a JSON array of row objects.
    pub fn to_json(&self) -> Result<String> {
        let names = self.column_names();
        let columns: Vec<ColumnRef<'_>> = names
            .iter()
            .map(|n| self.column(n))
            .collect::<Result<_>>()?;

        let rows: Vec<serde_json::Map<String, serde_json::Value>> = (0..self.len())
            .map(|row| {
                names
                    .iter()
                    .zip(&columns)
                    .map(|(name, col)| -> Result<(String, serde_json::Value)> {
                        Ok((name.clone(), serde_json::to_value(col.value_at(row))?))
                    })
                    .collect::<Result<_>>()
            })
            .collect::<Result<_>>()?;

        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

impl std::fmt::Debug for DataView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let derived: Vec<&str> = self.derived.iter().map(|d| d.name.as_str()).collect();
        write!(
            f,
            "DataView {{ table: '{}', rows: {}, derived: {:?} }}",
            self.table.name(),
            self.rows.len(),
            derived
        )
    }
}

fn derived_value(derived: &DerivedColumn, row: usize) -> ColumnValue {
    match &derived.values {
        DerivedValues::Numeric(v) => v
            .get(row)
            .copied()
            .flatten()
            .map_or(ColumnValue::Null, ColumnValue::Float64),
        DerivedValues::Label(v) => v
            .get(row)
            .cloned()
            .flatten()
            .map_or(ColumnValue::Null, ColumnValue::String),
    }
}

enum Source<'a> {
    Table(&'a Column),
    Derived(&'a DerivedColumn),
}

/// A column resolved against a view; reads take view positions.
pub struct ColumnRef<'a> {
    view: &'a DataView,
    source: Source<'a>,
}

impl<'a> ColumnRef<'a> {
    pub fn value_at(&self, row: usize) -> ColumnValue {
        match &self.source {
            Source::Table(col) => match self.view.rows.get(row) {
                Some(&parent) => col.get(parent, self.view.table.interner()),
                None => ColumnValue::Null,
            },
            Source::Derived(d) => derived_value(d, row),
        }
    }

    #[inline]
    pub fn f64_at(&self, row: usize) -> Option<f64> {
        match &self.source {
            Source::Table(col) => self.view.rows.get(row).and_then(|&p| col.get_f64(p)),
            Source::Derived(d) => match &d.values {
                DerivedValues::Numeric(v) => v.get(row).copied().flatten(),
                DerivedValues::Label(_) => None,
            },
        }
    }

    #[inline]
    pub fn bool_at(&self, row: usize) -> Option<bool> {
        match &self.source {
            Source::Table(col) => self.view.rows.get(row).and_then(|&p| col.get_bool(p)),
            Source::Derived(_) => self.f64_at(row).map(|f| f != 0.0),
        }
    }

    /// Canonical key text; the missing sentinel reads as `None`.
    pub fn key_at(&self, row: usize) -> Option<String> {
        match &self.source {
            Source::Table(col) => self
                .view
                .rows
                .get(row)
                .and_then(|&p| self.view.table.key_at(col, p)),
            Source::Derived(d) => derived_value(d, row).to_key_string(),
        }
    }
}
