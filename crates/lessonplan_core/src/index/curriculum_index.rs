//! Cascading curriculum filter and lesson resolution.
//!
//! # Responsibility
//! - Build a read-only index over the authoritative curriculum table.
//! - Produce per-stage candidates restricted by every prior choice.
//! - Resolve a complete selection to exactly one curriculum record.
//!
//! # Invariants
//! - Candidates are sorted (numeric-aware) and duplicate-free.
//! - Every candidate extends the given prefix to at least one record.
//! - Duplicate keys resolve to the first row in source order. No merge.
//! - The index is never mutated after construction.

use crate::model::curriculum::{CurriculumRecord, HierarchyField, LessonKey, Selection};
use crate::source::columns::{ColumnMap, CURRICULUM_COLUMNS};
use crate::source::{SourceError, Table, TableSource};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

static LEGACY_GRADE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(小|中|高)\s*([0-9０-９]+)\s*(?:年生|年)?$").expect("valid legacy grade regex")
});

const KEY_COLUMNS_WITH_LEVEL: [&str; 5] = ["school_level", "grade", "unit", "subunit", "lesson"];
const KEY_COLUMNS_LEGACY: [&str; 4] = ["grade", "unit", "subunit", "lesson"];

pub type IndexResult<T> = Result<T, IndexError>;

/// Errors from curriculum loading, selection and resolution.
#[derive(Debug)]
pub enum IndexError {
    Source(SourceError),
    /// A required key column is absent from the dataset header.
    MissingColumn(&'static str),
    /// A stage has no candidates for the current prefix.
    EmptySelection { field: HierarchyField },
    /// A chosen value is not among the stage candidates.
    UnknownCandidate {
        field: HierarchyField,
        value: String,
    },
    /// A choice was made for a stage whose parent is still open.
    StageNotReady {
        field: HierarchyField,
        expected: HierarchyField,
    },
    /// The selection does not yet name all five levels.
    IncompleteSelection { next: HierarchyField },
    /// No record carries the requested key.
    NoMatch(LessonKey),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::MissingColumn(column) => {
                write!(f, "curriculum dataset is missing required column `{column}`")
            }
            Self::EmptySelection { field } => {
                write!(f, "no candidates available for stage `{field}`")
            }
            Self::UnknownCandidate { field, value } => {
                write!(f, "`{value}` is not a candidate for stage `{field}`")
            }
            Self::StageNotReady { field, expected } => write!(
                f,
                "stage `{field}` cannot be chosen before stage `{expected}`"
            ),
            Self::IncompleteSelection { next } => {
                write!(f, "selection is incomplete; next stage is `{next}`")
            }
            Self::NoMatch(key) => write!(f, "no curriculum record for {key}"),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for IndexError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

/// One evaluated selection stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub field: HierarchyField,
    pub options: Vec<String>,
    pub chosen: Option<String>,
}

/// Read-only curriculum index.
#[derive(Debug, Clone, Default)]
pub struct CurriculumIndex {
    records: Vec<CurriculumRecord>,
}

impl CurriculumIndex {
    /// Creates an index over records in source order.
    pub fn new(records: Vec<CurriculumRecord>) -> Self {
        Self { records }
    }

    /// Loads and indexes the table exposed by `source`.
    ///
    /// # Side effects
    /// - Emits `curriculum_load` logging events with duration and row count.
    pub fn load(source: &dyn TableSource) -> IndexResult<Self> {
        let started_at = Instant::now();
        info!("event=curriculum_load module=index status=start");
        let result = source
            .load_table()
            .map_err(IndexError::from)
            .and_then(|table| Self::from_table(&table));
        match &result {
            Ok(index) => info!(
                "event=curriculum_load module=index status=ok duration_ms={} records={}",
                started_at.elapsed().as_millis(),
                index.len()
            ),
            Err(err) => error!(
                "event=curriculum_load module=index status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Builds the index from a decoded table.
    ///
    /// Without a school-level column, combined grade labels such as `小5`
    /// are split into school level and grade.
    ///
    /// # Errors
    /// - `MissingColumn` when a key column cannot be resolved.
    pub fn from_table(table: &Table) -> IndexResult<Self> {
        let columns = ColumnMap::for_table(table, CURRICULUM_COLUMNS);
        let has_level = columns.has("school_level");
        let required: &[&'static str] = if has_level {
            &KEY_COLUMNS_WITH_LEVEL
        } else {
            &KEY_COLUMNS_LEGACY
        };
        if let Some(missing) = columns.first_missing(required) {
            // Report the level column when grade labels cannot stand in for it.
            return Err(IndexError::MissingColumn(if has_level || missing != "grade" {
                missing
            } else {
                "school_level"
            }));
        }

        let mut records = Vec::with_capacity(table.len());
        let mut skipped = 0usize;
        for row in &table.rows {
            let raw_grade = columns.cell(row, "grade");
            let (school_level, grade) = if has_level {
                (columns.cell(row, "school_level").to_string(), raw_grade.to_string())
            } else {
                split_legacy_grade(raw_grade)
            };
            let key = LessonKey::new(
                school_level,
                grade,
                columns.cell(row, "unit"),
                columns.cell(row, "subunit"),
                columns.cell(row, "lesson"),
            );
            if HierarchyField::ALL
                .iter()
                .all(|field| key.value(*field).is_empty())
            {
                skipped += 1;
                continue;
            }

            records.push(CurriculumRecord {
                key,
                objective: columns.cell(row, "objective").to_string(),
                prerequisites: columns.cell(row, "prerequisites").to_string(),
                knowledge_skill: columns.cell(row, "knowledge_skill").to_string(),
                thinking_expression: columns.cell(row, "thinking_expression").to_string(),
                attitude: columns.cell(row, "attitude").to_string(),
                next_lesson: columns.cell(row, "next_lesson").to_string(),
            });
        }

        if skipped > 0 {
            warn!(
                "event=curriculum_rows_skipped module=index status=ok skipped={}",
                skipped
            );
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in source order.
    pub fn records(&self) -> &[CurriculumRecord] {
        &self.records
    }

    /// Distinct values of `field` over records matching `prior`.
    ///
    /// Returns an empty list only when the dataset is empty or the prefix
    /// filters every record out.
    pub fn candidates(&self, field: HierarchyField, prior: &Selection) -> Vec<String> {
        let distinct = self
            .records
            .iter()
            .filter(|record| prior.matches(record))
            .map(|record| record.value(field))
            .collect::<BTreeSet<_>>();
        let mut values = distinct
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        values.sort_by(|left, right| compare_candidates(left, right));
        values
    }

    /// Re-evaluates every stage for `selection`.
    ///
    /// Stops after the first stage without a chosen value.
    ///
    /// # Errors
    /// - `EmptySelection` when an evaluated stage has no options.
    /// - `UnknownCandidate` when a chosen value is not among its options.
    pub fn cascade(&self, selection: &Selection) -> IndexResult<Vec<Stage>> {
        let mut stages = Vec::with_capacity(HierarchyField::ALL.len());
        for field in HierarchyField::ALL {
            let prefix = selection.prefix_before(field);
            let options = self.candidates(field, &prefix);
            if options.is_empty() {
                return Err(IndexError::EmptySelection { field });
            }
            let chosen = selection.get(field).map(str::to_string);
            if let Some(value) = chosen.as_deref() {
                if !options.iter().any(|option| option == value) {
                    return Err(IndexError::UnknownCandidate {
                        field,
                        value: value.to_string(),
                    });
                }
            }
            let done = chosen.is_none();
            stages.push(Stage {
                field,
                options,
                chosen,
            });
            if done {
                break;
            }
        }
        Ok(stages)
    }

    /// Chooses `value` at `field`, dropping every later choice.
    ///
    /// # Errors
    /// - `StageNotReady` when a parent stage is still open.
    /// - `EmptySelection` / `UnknownCandidate` when `value` is not offered.
    pub fn select(
        &self,
        selection: &Selection,
        field: HierarchyField,
        value: &str,
    ) -> IndexResult<Selection> {
        if field.position() > selection.depth() {
            let expected = selection.next_field().unwrap_or(HierarchyField::Lesson);
            return Err(IndexError::StageNotReady { field, expected });
        }

        let mut next = selection.prefix_before(field);
        let options = self.candidates(field, &next);
        if options.is_empty() {
            return Err(IndexError::EmptySelection { field });
        }
        if !options.iter().any(|option| option == value) {
            return Err(IndexError::UnknownCandidate {
                field,
                value: value.to_string(),
            });
        }
        next.push(value.to_string());
        Ok(next)
    }

    /// Resolves a complete key to its curriculum record.
    ///
    /// When several rows share the key, the first in source order wins.
    pub fn resolve(&self, key: &LessonKey) -> IndexResult<&CurriculumRecord> {
        self.records
            .iter()
            .find(|record| &record.key == key)
            .ok_or_else(|| IndexError::NoMatch(key.clone()))
    }

    /// Resolves a selection, requiring all five levels.
    pub fn resolve_selection(&self, selection: &Selection) -> IndexResult<&CurriculumRecord> {
        match selection.lesson_key() {
            Some(key) => self.resolve(&key),
            None => Err(IndexError::IncompleteSelection {
                next: selection.next_field().unwrap_or(HierarchyField::Lesson),
            }),
        }
    }
}

/// Splits combined grade labels (`小5`, `中 2年`) into level and grade.
///
/// Unrecognized labels keep an empty school level and the raw grade.
pub fn split_legacy_grade(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let Some(caps) = LEGACY_GRADE_RE.captures(trimmed) else {
        return (String::new(), trimmed.to_string());
    };
    let level = match &caps[1] {
        "小" => "小学校",
        "中" => "中学校",
        _ => "高等学校",
    };
    (level.to_string(), to_ascii_digits(&caps[2]))
}

fn to_ascii_digits(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '０'..='９' => char::from_u32(ch as u32 - '０' as u32 + '0' as u32).unwrap_or(ch),
            other => other,
        })
        .collect()
}

/// Numeric-aware ordering: two integers compare by value, else by text.
fn compare_candidates(left: &str, right: &str) -> Ordering {
    match (plain_integer(left), plain_integer(right)) {
        (Some(a), Some(b)) => a.cmp(&b).then_with(|| left.cmp(right)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

/// Unsigned decimal digits only; signs and whitespace make a label text.
fn plain_integer(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
