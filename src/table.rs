/// Student dataset table
///
/// A Table is the immutable, in-memory form of the assessment file: one row
/// per student-term observation, one typed column per attribute. It is built
/// once from delimited text and then only read.
///
/// # Examples
///
/// ```
/// use mapscope::{ExplorerConfig, Table};
///
/// let csv = "school_2015,mat_teacher_1,rit_2015_Fall_mathematics\n\
///            A,Smith,195\n\
///            B,,201\n";
/// let table = Table::from_csv_str("students", csv, &ExplorerConfig::default()).unwrap();
///
/// assert_eq!(table.len(), 2);
/// // Identifier columns keep a sentinel instead of a missing value
/// assert_eq!(table.get_value(1, "mat_teacher_1").unwrap().as_string(), Some("nan"));
/// ```

use crate::column::{format_number, Column, ColumnType, ColumnValue};
use crate::config::ExplorerConfig;
use crate::error::{ExplorerError, Result};
use crate::interner::{InternerStats, StringInterner};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;

/// Cell texts read as missing values, in addition to the empty string.
const MISSING_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "-nan", "null", "NULL", "None", "#N/A"];

/// Column names and types of a table, in file order.
///
/// ```
/// use mapscope::{Schema, ColumnType};
///
/// let schema = Schema::new(vec![
///     ("school_2015".to_string(), ColumnType::String),
///     ("attendance_rate".to_string(), ColumnType::Float64),
/// ]);
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.get_column_index("attendance_rate"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new(columns: Vec<(String, ColumnType)>) -> Self {
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get_column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    pub fn get_column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_column_index(name).is_some()
    }

    /// Fails with `SchemaMismatch` naming the first absent column.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| !self.contains(n)) {
            Some(missing) => Err(ExplorerError::schema_mismatch(*missing)),
            None => Ok(()),
        }
    }
}

pub struct Table {
    name: String,
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
    /// Shared by every string column
    interner: StringInterner,
    missing_sentinel: String,
}

impl Table {
    /// Parse a table from delimited text with a header row.
    ///
    /// Column types are inferred over every data row:
    /// - all cells integers → INT64
    /// - all cells numbers → FLOAT64
    /// - all cells "true"/"false" (any case) → BOOL
    /// - anything else → STRING
    ///
    /// Empty and NaN-like cells are missing and do not take part in inference,
    /// as are the cells a short row leaves out. Identifier columns named in
    /// `config` are always strings; their missing cells hold
    /// `config.missing_sentinel`.
    pub fn from_csv_reader<R: Read>(name: &str, reader: R, config: &ExplorerConfig) -> Result<Table> {
        if !config.delimiter.is_ascii() {
            return Err(ExplorerError::Config(format!(
                "delimiter '{}' must be a single ASCII character",
                config.delimiter
            )));
        }
        // Short rows are padded with missing cells below
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let column_names: Vec<String> = csv_reader.headers()?.iter().map(|h| h.to_string()).collect();
        if column_names.iter().all(|h| h.is_empty()) {
            return Err(ExplorerError::Malformed("header row is empty".to_string()));
        }

        let mut records = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            records.push(record);
        }

        let types: Vec<ColumnType> = column_names
            .iter()
            .enumerate()
            .map(|(i, col_name)| {
                if config.is_identifier(col_name) {
                    ColumnType::String
                } else {
                    infer_column_type(records.iter().filter_map(|r| r.get(i)))
                }
            })
            .collect();

        let schema = Schema::new(column_names.iter().cloned().zip(types.iter().copied()).collect());
        let mut interner = StringInterner::new();
        let mut columns: Vec<Column> = schema
            .columns
            .iter()
            .map(|(col_name, ty)| Column::with_capacity(col_name.clone(), *ty, records.len()))
            .collect();

        for record in &records {
            for (i, column) in columns.iter_mut().enumerate() {
                let raw = record.get(i).unwrap_or("");
                let value = if config.is_identifier(column.name()) {
                    normalize_identifier(raw, &config.missing_sentinel)
                } else {
                    parse_cell(raw, types[i], column.name())?
                };
                column.push(value, &mut interner)?;
            }
        }

        Ok(Table {
            name: name.to_string(),
            schema,
            columns,
            row_count: records.len(),
            interner,
            missing_sentinel: config.missing_sentinel.clone(),
        })
    }

    pub fn from_csv_str(name: &str, csv: &str, config: &ExplorerConfig) -> Result<Table> {
        Self::from_csv_reader(name, csv.as_bytes(), config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn interner_stats(&self) -> InternerStats {
        self.interner.stats()
    }

    pub fn missing_sentinel(&self) -> &str {
        &self.missing_sentinel
    }

    /// Look up a column, failing with `SchemaMismatch` if the dataset lacks it.
    /// This is where missing columns are detected: at first use, not at load.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.schema
            .get_column_index(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| ExplorerError::schema_mismatch(name))
    }

    pub fn get_value(&self, row: usize, column: &str) -> Result<ColumnValue> {
        if row >= self.row_count {
            return Err(ExplorerError::Malformed(format!(
                "row {} out of range [0, {})",
                row, self.row_count
            )));
        }
        Ok(self.column(column)?.get(row, &self.interner))
    }

    pub fn get_row(&self, row: usize) -> Result<HashMap<String, ColumnValue>> {
        if row >= self.row_count {
            return Err(ExplorerError::Malformed(format!(
                "row {} out of range [0, {})",
                row, self.row_count
            )));
        }
        Ok(self
            .columns
            .iter()
            .map(|col| (col.name().to_string(), col.get(row, &self.interner)))
            .collect())
    }

    /// Canonical key of a cell, treating the missing sentinel as absent.
    pub fn key_at(&self, column: &Column, row: usize) -> Option<String> {
        column
            .key_string(row, &self.interner)
            .filter(|k| *k != self.missing_sentinel)
    }

    /// Sorted distinct non-missing values of a column, for filter option lists.
    /// Numeric values sort numerically and ahead of text.
    pub fn distinct_values(&self, column: &str) -> Result<Vec<String>> {
        let col = self.column(column)?;
        let distinct: BTreeSet<String> = (0..self.row_count)
            .filter_map(|row| self.key_at(col, row))
            .collect();
        let mut values: Vec<String> = distinct.into_iter().collect();
        values.sort_by(|a, b| compare_keys(a, b));
        Ok(values)
    }
}

/// Order category keys numerically when both parse as numbers.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn is_missing_token(cell: &str) -> bool {
    cell.is_empty() || MISSING_TOKENS.contains(&cell)
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut seen = false;

    for cell in cells.filter(|c| !is_missing_token(c)) {
        seen = true;
        if all_int && cell.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && cell.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && !(cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false")) {
            all_bool = false;
        }
        if !all_int && !all_float && !all_bool {
            return ColumnType::String;
        }
    }

    if !seen {
        ColumnType::String
    } else if all_int {
        ColumnType::Int64
    } else if all_float {
        ColumnType::Float64
    } else if all_bool {
        ColumnType::Bool
    } else {
        ColumnType::String
    }
}

fn parse_cell(cell: &str, col_type: ColumnType, column: &str) -> Result<ColumnValue> {
    if is_missing_token(cell) {
        return Ok(ColumnValue::Null);
    }

    let invalid = |ty: &str| ExplorerError::InvalidValue {
        column: column.to_string(),
        details: format!("cannot parse '{}' as {}", cell, ty),
    };

    match col_type {
        ColumnType::Int64 => cell.parse::<i64>().map(ColumnValue::Int64).map_err(|_| invalid("INT64")),
        ColumnType::Float64 => cell.parse::<f64>().map(ColumnValue::Float64).map_err(|_| invalid("FLOAT64")),
        ColumnType::Bool => {
            if cell.eq_ignore_ascii_case("true") {
                Ok(ColumnValue::Bool(true))
            } else if cell.eq_ignore_ascii_case("false") {
                Ok(ColumnValue::Bool(false))
            } else {
                Err(invalid("BOOL"))
            }
        }
        ColumnType::String => Ok(ColumnValue::String(cell.to_string())),
    }
}

/// Identifier cells become strings; integral numbers lose their `.0`
/// and missing cells become the sentinel.
fn normalize_identifier(cell: &str, sentinel: &str) -> ColumnValue {
    if is_missing_token(cell) {
        return ColumnValue::String(sentinel.to_string());
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => ColumnValue::String(format_number(n)),
        _ => ColumnValue::String(cell.to_string()),
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Table {{ name: '{}', columns: {}, rows: {} }}",
            self.name,
            self.schema.len(),
            self.row_count
        )
    }
}
