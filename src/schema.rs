/// Column naming conventions of the assessment dataset.
///
/// Test scores live in one column per year, term and subject
/// (`rit_2016_Fall_mathematics`); percentile ranks in `percentile_*`
/// columns; and each subject has fixed indicator, growth, target and
/// teacher columns.

use crate::error::{ExplorerError, Result};
use crate::table::Schema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const RIT_PREFIX: &str = "rit_";
pub const PERCENTILE_PREFIX: &str = "percentile_";

pub const GRADE_COLUMN: &str = "grade_2015";
pub const ATTENDANCE_COLUMN: &str = "attendance_rate";

/// Subjects with a full set of goal/growth/target/teacher columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Mathematics,
    Reading,
}

impl Subject {
    /// Subject suffix used in RIT score columns
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mathematics",
            Subject::Reading => "reading",
        }
    }

    /// Boolean "met growth goal" indicator
    pub fn goal_column(&self) -> &'static str {
        match self {
            Subject::Mathematics => "met_math_growth",
            Subject::Reading => "met_reading_growth",
        }
    }

    pub fn growth_column(&self) -> &'static str {
        match self {
            Subject::Mathematics => "math_growth",
            Subject::Reading => "reading_growth",
        }
    }

    /// Fall-to-fall growth target
    pub fn target_column(&self) -> &'static str {
        match self {
            Subject::Mathematics => "ftf_2015_Fall_mathematics",
            Subject::Reading => "ftf_2015_Fall_reading",
        }
    }

    pub fn teacher_column(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mat_teacher_1",
            Subject::Reading => "ela_teacher_1",
        }
    }

    pub fn teacher_change_column(&self) -> &'static str {
        match self {
            Subject::Mathematics => "is_teacher_change_mat",
            Subject::Reading => "is_teacher_change_ela",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mathematics" | "math" | "mat" => Ok(Subject::Mathematics),
            "reading" | "ela" => Ok(Subject::Reading),
            other => Err(ExplorerError::InvalidValue {
                column: "subject".to_string(),
                details: format!("unknown subject '{}'", other),
            }),
        }
    }
}

/// A parsed `rit_<year>_<term>_<subject>` column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RitColumn {
    pub year: i32,
    pub term: String,
    pub subject: String,
}

impl RitColumn {
    pub fn parse(name: &str) -> Option<RitColumn> {
        let rest = name.strip_prefix(RIT_PREFIX)?;
        let mut parts = rest.splitn(3, '_');
        let year = parts.next()?.parse::<i32>().ok()?;
        let term = parts.next().filter(|t| !t.is_empty())?;
        let subject = parts.next().filter(|s| !s.is_empty())?;
        Some(RitColumn {
            year,
            term: term.to_string(),
            subject: subject.to_string(),
        })
    }

    /// Column-name prefix identifying this column's test window, e.g. `rit_2016_Fall_`
    pub fn prefix(&self) -> String {
        format!("{}{}_{}_", RIT_PREFIX, self.year, self.term)
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.prefix(), self.subject)
    }
}

/// Calendar position of a testing term within its year.
fn term_rank(term: &str) -> u8 {
    match term.to_ascii_lowercase().as_str() {
        "winter" => 0,
        "spring" => 1,
        "summer" => 2,
        "fall" => 3,
        _ => 4,
    }
}

fn chronological(a: &RitColumn, b: &RitColumn) -> Ordering {
    a.year
        .cmp(&b.year)
        .then(term_rank(&a.term).cmp(&term_rank(&b.term)))
        .then_with(|| a.term.cmp(&b.term))
        .then_with(|| a.subject.cmp(&b.subject))
}

/// Every RIT score column in the schema, in chronological order.
pub fn rit_columns(schema: &Schema) -> Vec<RitColumn> {
    let mut columns: Vec<RitColumn> = schema
        .get_column_names()
        .into_iter()
        .filter_map(RitColumn::parse)
        .collect();
    columns.sort_by(chronological);
    columns
}

/// Distinct test-window prefixes (`rit_<year>_<term>_`), in chronological order.
pub fn term_prefixes(schema: &Schema) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for column in rit_columns(schema) {
        let prefix = column.prefix();
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }
    prefixes
}

/// Distinct subjects that appear in RIT score columns, sorted by name.
pub fn subjects(schema: &Schema) -> Vec<String> {
    let mut subjects: Vec<String> = rit_columns(schema).into_iter().map(|c| c.subject).collect();
    subjects.sort();
    subjects.dedup();
    subjects
}

pub fn percentile_columns(schema: &Schema) -> Vec<String> {
    schema
        .get_column_names()
        .into_iter()
        .filter(|name| name.starts_with(PERCENTILE_PREFIX) && name.len() > PERCENTILE_PREFIX.len())
        .map(|name| name.to_string())
        .collect()
}

/// The pair of test windows a growth value is measured across.
///
/// Growth is always `end - start`, so a positive value is improvement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthWindow {
    pub start_prefix: String,
    pub end_prefix: String,
    pub subject: String,
}

impl GrowthWindow {
    pub fn new(start_prefix: impl Into<String>, end_prefix: impl Into<String>, subject: impl Into<String>) -> Self {
        GrowthWindow {
            start_prefix: start_prefix.into(),
            end_prefix: end_prefix.into(),
            subject: subject.into(),
        }
    }

    /// Window between two terms, e.g. `fall_to_fall(2015, 2016, "mathematics")`.
    pub fn fall_to_fall(start_year: i32, end_year: i32, subject: impl Into<String>) -> Self {
        GrowthWindow::new(
            format!("{}{}_Fall_", RIT_PREFIX, start_year),
            format!("{}{}_Fall_", RIT_PREFIX, end_year),
            subject,
        )
    }

    pub fn start_column(&self) -> String {
        format!("{}{}", self.start_prefix, self.subject)
    }

    pub fn end_column(&self) -> String {
        format!("{}{}", self.end_prefix, self.subject)
    }

    /// Same window measured the other way round.
    pub fn reversed(&self) -> GrowthWindow {
        GrowthWindow {
            start_prefix: self.end_prefix.clone(),
            end_prefix: self.start_prefix.clone(),
            subject: self.subject.clone(),
        }
    }

    pub fn validate(&self, schema: &Schema) -> Result<()> {
        let start = self.start_column();
        let end = self.end_column();
        schema.require(&[start.as_str(), end.as_str()])
    }
}
