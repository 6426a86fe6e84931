/// Column storage for the student dataset
///
/// A Column is a typed, nullable, random-access array indexed by row.
/// Each Column has a type specifying the type of every value stored.
///
/// # String Interning
///
/// String columns store `StringId`s from the table-wide `StringInterner`
/// rather than owned strings. Resolving an ID back to text goes through the
/// interner, which is why string reads take it as a parameter.

use crate::error::{ExplorerError, Result};
use crate::interner::{StringId, StringInterner};
use serde::Serialize;
use std::fmt::Debug;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    String,
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(String),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Numeric view of the value. Booleans read as 0/1 so goal indicators
    /// can be averaged into proportions.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int64(v) => Some(*v as f64),
            ColumnValue::Float64(v) if !v.is_nan() => Some(*v),
            ColumnValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical text form used when matching filter selections and grouping.
    /// Integral floats drop their fractional part so `5.0` and `5` agree.
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            ColumnValue::Int64(v) => Some(v.to_string()),
            ColumnValue::Float64(v) if v.is_nan() => None,
            ColumnValue::Float64(v) => Some(format_number(*v)),
            ColumnValue::Bool(b) => Some(b.to_string()),
            ColumnValue::String(s) => Some(s.clone()),
            ColumnValue::Null => None,
        }
    }
}

/// Render a float without a trailing `.0` when it holds an integer.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    String(Vec<Option<StringId>>),
}

/// A named, typed column. Missing cells are stored as `None`.
#[derive(Clone)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: String, column_type: ColumnType) -> Self {
        Self::with_capacity(name, column_type, 0)
    }

    pub fn with_capacity(name: String, column_type: ColumnType, capacity: usize) -> Self {
        let data = match column_type {
            ColumnType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            ColumnType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            ColumnType::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            ColumnType::String => ColumnData::String(Vec::with_capacity(capacity)),
        };
        Column { name, data }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        match self.data {
            ColumnData::Int64(_) => ColumnType::Int64,
            ColumnData::Float64(_) => ColumnType::Float64,
            ColumnData::Bool(_) => ColumnType::Bool,
            ColumnData::String(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value, interning strings. The value type must match the column type.
    pub fn push(&mut self, value: ColumnValue, interner: &mut StringInterner) -> Result<()> {
        match (&mut self.data, value) {
            (ColumnData::Int64(v), ColumnValue::Null) => v.push(None),
            (ColumnData::Float64(v), ColumnValue::Null) => v.push(None),
            (ColumnData::Bool(v), ColumnValue::Null) => v.push(None),
            (ColumnData::String(v), ColumnValue::Null) => v.push(None),
            (ColumnData::Int64(v), ColumnValue::Int64(n)) => v.push(Some(n)),
            (ColumnData::Float64(v), ColumnValue::Float64(f)) => {
                v.push(if f.is_nan() { None } else { Some(f) })
            }
            (ColumnData::Float64(v), ColumnValue::Int64(n)) => v.push(Some(n as f64)),
            (ColumnData::Bool(v), ColumnValue::Bool(b)) => v.push(Some(b)),
            (ColumnData::String(v), ColumnValue::String(s)) => v.push(Some(interner.intern(&s))),
            (_, other) => {
                return Err(ExplorerError::InvalidValue {
                    column: self.name.clone(),
                    details: format!("expected {:?}, got {:?}", self.column_type(), other),
                })
            }
        }
        Ok(())
    }

    /// Read a cell. Out-of-range rows read as `Null`.
    pub fn get(&self, index: usize, interner: &StringInterner) -> ColumnValue {
        match &self.data {
            ColumnData::Int64(v) => v.get(index).copied().flatten().map_or(ColumnValue::Null, ColumnValue::Int64),
            ColumnData::Float64(v) => v.get(index).copied().flatten().map_or(ColumnValue::Null, ColumnValue::Float64),
            ColumnData::Bool(v) => v.get(index).copied().flatten().map_or(ColumnValue::Null, ColumnValue::Bool),
            ColumnData::String(v) => v
                .get(index)
                .copied()
                .flatten()
                .and_then(|id| interner.resolve(id))
                .map_or(ColumnValue::Null, |s| ColumnValue::String(s.to_string())),
        }
    }

    /// Fast numeric access without building a `ColumnValue`.
    /// Booleans read as 0/1; strings and missing cells read as `None`.
    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Int64(v) => v.get(index).copied().flatten().map(|n| n as f64),
            ColumnData::Float64(v) => v.get(index).copied().flatten(),
            ColumnData::Bool(v) => v
                .get(index)
                .copied()
                .flatten()
                .map(|b| if b { 1.0 } else { 0.0 }),
            ColumnData::String(_) => None,
        }
    }

    #[inline]
    pub fn get_bool(&self, index: usize) -> Option<bool> {
        match &self.data {
            ColumnData::Bool(v) => v.get(index).copied().flatten(),
            ColumnData::Int64(v) => v.get(index).copied().flatten().map(|n| n != 0),
            ColumnData::Float64(v) => v.get(index).copied().flatten().map(|f| f != 0.0),
            ColumnData::String(_) => None,
        }
    }

    /// Interned ID of a string cell, `None` for missing or non-string columns.
    #[inline]
    pub fn string_id(&self, index: usize) -> Option<StringId> {
        match &self.data {
            ColumnData::String(v) => v.get(index).copied().flatten(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null_at(&self, index: usize) -> bool {
        match &self.data {
            ColumnData::Int64(v) => !matches!(v.get(index), Some(Some(_))),
            ColumnData::Float64(v) => !matches!(v.get(index), Some(Some(_))),
            ColumnData::Bool(v) => !matches!(v.get(index), Some(Some(_))),
            ColumnData::String(v) => !matches!(v.get(index), Some(Some(_))),
        }
    }

    /// Canonical key text of a cell, see [`ColumnValue::to_key_string`].
    pub fn key_string(&self, index: usize, interner: &StringInterner) -> Option<String> {
        self.get(index, interner).to_key_string()
    }
}

impl Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Column {{ name: '{}', type: {:?}, len: {} }}",
            self.name,
            self.column_type(),
            self.len()
        )
    }
}
