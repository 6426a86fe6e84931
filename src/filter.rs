/// Filter Engine
///
/// Turns the user's sidebar selections into a row selection over the
/// dataset. Each attribute maps to a set of accepted values; an empty set
/// means "no constraint" for that attribute, never "accept nothing".
/// Attributes combine with AND. The teacher-change selector is a separate
/// predicate over the two change indicators.

use crate::column::{Column, ColumnType};
use crate::error::{ExplorerError, Result};
use crate::interner::StringId;
use crate::schema::Subject;
use crate::table::Table;
use crate::view::DataView;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Selection over the "changed math teacher" / "changed ELA teacher" flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherChangeMode {
    #[default]
    NoConstraint,
    ChangedMath,
    ChangedEla,
    ChangedEither,
}

impl TeacherChangeMode {
    pub const ALL: [TeacherChangeMode; 4] = [
        TeacherChangeMode::NoConstraint,
        TeacherChangeMode::ChangedMath,
        TeacherChangeMode::ChangedEla,
        TeacherChangeMode::ChangedEither,
    ];

    /// Label shown in the selector
    pub fn label(&self) -> &'static str {
        match self {
            TeacherChangeMode::NoConstraint => "All Students",
            TeacherChangeMode::ChangedMath => "Changed Math Teacher",
            TeacherChangeMode::ChangedEla => "Changed ELA Teacher",
            TeacherChangeMode::ChangedEither => "Changed Either",
        }
    }

    pub fn from_label(label: &str) -> Option<TeacherChangeMode> {
        Self::ALL.into_iter().find(|mode| mode.label().eq_ignore_ascii_case(label))
    }

    fn accepts(&self, changed_math: bool, changed_ela: bool) -> bool {
        match self {
            TeacherChangeMode::NoConstraint => true,
            TeacherChangeMode::ChangedMath => changed_math,
            TeacherChangeMode::ChangedEla => changed_ela,
            TeacherChangeMode::ChangedEither => changed_math || changed_ela,
        }
    }
}

/// Accepted values per attribute, plus the teacher-change selection.
///
/// ```
/// use mapscope::{FilterPredicateSet, TeacherChangeMode};
///
/// let predicates = FilterPredicateSet::new()
///     .with_values("school_2015", ["A"])
///     .with_values("grade_2015", Vec::<String>::new())
///     .with_teacher_change(TeacherChangeMode::ChangedEither);
///
/// assert!(!predicates.is_unconstrained());
/// assert_eq!(predicates.constrained_attributes(), vec!["school_2015"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPredicateSet {
    accepted: BTreeMap<String, BTreeSet<String>>,
    teacher_change: TeacherChangeMode,
}

impl FilterPredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted set for `attribute`. An empty iterator clears
    /// the constraint.
    pub fn with_values<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_values(attribute, values);
        self
    }

    pub fn set_values<I, S>(&mut self, attribute: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted
            .insert(attribute.into(), values.into_iter().map(Into::into).collect());
    }

    pub fn with_teacher_change(mut self, mode: TeacherChangeMode) -> Self {
        self.teacher_change = mode;
        self
    }

    pub fn teacher_change(&self) -> TeacherChangeMode {
        self.teacher_change
    }

    pub fn accepted(&self, attribute: &str) -> Option<&BTreeSet<String>> {
        self.accepted.get(attribute)
    }

    /// Attributes with a non-empty accepted set, in name order.
    pub fn constrained_attributes(&self) -> Vec<&str> {
        self.accepted
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(attr, _)| attr.as_str())
            .collect()
    }

    /// True when applying these predicates cannot remove any row.
    pub fn is_unconstrained(&self) -> bool {
        self.teacher_change == TeacherChangeMode::NoConstraint && self.constrained_attributes().is_empty()
    }
}

/// Result of a filter: the selected rows and whether any constraint applied.
#[derive(Clone)]
pub struct FilteredView {
    view: DataView,
    unconstrained: bool,
}

impl FilteredView {
    pub fn view(&self) -> &DataView {
        &self.view
    }

    pub fn into_view(self) -> DataView {
        self.view
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// An empty selection produced by real constraints.
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// No predicate was active; the view is the whole dataset.
    pub fn is_unconstrained(&self) -> bool {
        self.unconstrained
    }
}

enum Matcher<'a> {
    /// String column: compare interned IDs
    Ids { column: &'a Column, ids: HashSet<StringId> },
    /// Any other column: compare canonical key text
    Keys { column: &'a Column, keys: &'a BTreeSet<String> },
}

impl Matcher<'_> {
    fn matches(&self, table: &Table, row: usize) -> bool {
        match self {
            Matcher::Ids { column, ids } => column.string_id(row).is_some_and(|id| ids.contains(&id)),
            Matcher::Keys { column, keys } => table.key_at(column, row).is_some_and(|k| keys.contains(&k)),
        }
    }
}

/// Apply `predicates` to the whole dataset. The table is never modified.
///
/// Fails with `SchemaMismatch` if a constrained attribute, or a
/// teacher-change indicator the selected mode needs, is not in the dataset.
pub fn filter(table: &Arc<Table>, predicates: &FilterPredicateSet) -> Result<FilteredView> {
    let mut matchers = Vec::new();
    for attribute in predicates.constrained_attributes() {
        let column = table.column(attribute)?;
        let accepted = predicates
            .accepted(attribute)
            .ok_or_else(|| ExplorerError::schema_mismatch(attribute))?;
        let matcher = match column.column_type() {
            ColumnType::String => Matcher::Ids {
                column,
                ids: accepted
                    .iter()
                    .filter_map(|value| table.interner().lookup(value))
                    .collect(),
            },
            _ => Matcher::Keys { column, keys: accepted },
        };
        matchers.push(matcher);
    }

    let mode = predicates.teacher_change();
    let change_columns = if mode == TeacherChangeMode::NoConstraint {
        None
    } else {
        Some((
            table.column(Subject::Mathematics.teacher_change_column())?,
            table.column(Subject::Reading.teacher_change_column())?,
        ))
    };

    let rows: Vec<usize> = (0..table.len())
        .filter(|&row| matchers.iter().all(|m| m.matches(table, row)))
        .filter(|&row| match change_columns {
            None => true,
            Some((math, ela)) => mode.accepts(
                math.get_bool(row).unwrap_or(false),
                ela.get_bool(row).unwrap_or(false),
            ),
        })
        .collect();

    debug!(
        "filter kept {} of {} rows ({} attribute constraints, teacher change: {:?})",
        rows.len(),
        table.len(),
        matchers.len(),
        mode
    );

    Ok(FilteredView {
        view: DataView::from_rows(Arc::clone(table), rows),
        unconstrained: predicates.is_unconstrained(),
    })
}
