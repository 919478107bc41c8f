//! Curriculum domain model.
//!
//! # Responsibility
//! - Define the read-only curriculum record and its five-level key.
//! - Define the cascading selection prefix used to drill down the hierarchy.
//!
//! # Invariants
//! - Hierarchy order is fixed: school level, grade, unit, subunit, lesson.
//! - A `Selection` is always a contiguous prefix of that order.
//! - A `LessonKey` exists only when all five levels are chosen.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One level of the curriculum hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyField {
    SchoolLevel,
    Grade,
    Unit,
    Subunit,
    Lesson,
}

impl HierarchyField {
    /// All levels in drill-down order.
    pub const ALL: [HierarchyField; 5] = [
        HierarchyField::SchoolLevel,
        HierarchyField::Grade,
        HierarchyField::Unit,
        HierarchyField::Subunit,
        HierarchyField::Lesson,
    ];

    /// Zero-based position in drill-down order.
    pub fn position(self) -> usize {
        match self {
            Self::SchoolLevel => 0,
            Self::Grade => 1,
            Self::Unit => 2,
            Self::Subunit => 3,
            Self::Lesson => 4,
        }
    }

    /// Stable snake_case column id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchoolLevel => "school_level",
            Self::Grade => "grade",
            Self::Unit => "unit",
            Self::Subunit => "subunit",
            Self::Lesson => "lesson",
        }
    }

    /// Display label used by the selection prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::SchoolLevel => "校種",
            Self::Grade => "学年",
            Self::Unit => "単元",
            Self::Subunit => "小単元",
            Self::Lesson => "学習内容",
        }
    }
}

impl Display for HierarchyField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved five-level lesson key.
///
/// Used both to resolve a curriculum record and as the join key into the
/// practice note store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LessonKey {
    pub school_level: String,
    pub grade: String,
    pub unit: String,
    pub subunit: String,
    pub lesson: String,
}

impl LessonKey {
    pub fn new(
        school_level: impl Into<String>,
        grade: impl Into<String>,
        unit: impl Into<String>,
        subunit: impl Into<String>,
        lesson: impl Into<String>,
    ) -> Self {
        Self {
            school_level: school_level.into(),
            grade: grade.into(),
            unit: unit.into(),
            subunit: subunit.into(),
            lesson: lesson.into(),
        }
    }

    /// Returns the key component for one hierarchy level.
    pub fn value(&self, field: HierarchyField) -> &str {
        match field {
            HierarchyField::SchoolLevel => &self.school_level,
            HierarchyField::Grade => &self.grade,
            HierarchyField::Unit => &self.unit,
            HierarchyField::Subunit => &self.subunit,
            HierarchyField::Lesson => &self.lesson,
        }
    }
}

impl Display for LessonKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} / {} / {} / {}",
            self.school_level, self.grade, self.unit, self.subunit, self.lesson
        )
    }
}

/// One row of the authoritative curriculum dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumRecord {
    pub key: LessonKey,
    /// ねらい
    pub objective: String,
    /// 既習内容
    pub prerequisites: String,
    /// 知識・技能
    pub knowledge_skill: String,
    /// 思考力・判断力・表現力
    pub thinking_expression: String,
    /// 学びに向かう力
    pub attitude: String,
    /// 次回の学習内容
    pub next_lesson: String,
}

impl CurriculumRecord {
    /// Creates a record with empty descriptive fields.
    pub fn with_key(key: LessonKey) -> Self {
        Self {
            key,
            objective: String::new(),
            prerequisites: String::new(),
            knowledge_skill: String::new(),
            thinking_expression: String::new(),
            attitude: String::new(),
            next_lesson: String::new(),
        }
    }

    pub fn value(&self, field: HierarchyField) -> &str {
        self.key.value(field)
    }

    /// Labeled descriptive fields in display order.
    pub fn details(&self) -> [(&'static str, &str); 6] {
        [
            ("ねらい", self.objective.as_str()),
            ("既習内容", self.prerequisites.as_str()),
            ("知識・技能", self.knowledge_skill.as_str()),
            ("思考力・判断力・表現力", self.thinking_expression.as_str()),
            ("学びに向かう力", self.attitude.as_str()),
            ("次回の学習内容", self.next_lesson.as_str()),
        ]
    }
}

/// Ordered prefix of hierarchy choices.
///
/// Choosing a value at an earlier level drops every later choice, so
/// dependent stages are always re-evaluated from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    values: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the complete selection for a resolved key.
    pub fn from_key(key: &LessonKey) -> Self {
        Self {
            values: HierarchyField::ALL
                .iter()
                .map(|field| key.value(*field).to_string())
                .collect(),
        }
    }

    /// Number of chosen levels.
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == HierarchyField::ALL.len()
    }

    /// Next level waiting for a choice, `None` when complete.
    pub fn next_field(&self) -> Option<HierarchyField> {
        HierarchyField::ALL.get(self.values.len()).copied()
    }

    pub fn get(&self, field: HierarchyField) -> Option<&str> {
        self.values.get(field.position()).map(String::as_str)
    }

    /// Chosen `(field, value)` pairs in hierarchy order.
    pub fn pairs(&self) -> impl Iterator<Item = (HierarchyField, &str)> {
        HierarchyField::ALL
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// Returns the prefix strictly above `field`.
    pub fn prefix_before(&self, field: HierarchyField) -> Selection {
        Selection {
            values: self
                .values
                .iter()
                .take(field.position())
                .cloned()
                .collect(),
        }
    }

    /// Appends a choice for the next level.
    ///
    /// Callers validate the value against candidates first; see
    /// `CurriculumIndex::select`.
    pub(crate) fn push(&mut self, value: String) {
        if !self.is_complete() {
            self.values.push(value);
        }
    }

    /// Whether `record` agrees with every chosen level.
    pub fn matches(&self, record: &CurriculumRecord) -> bool {
        self.pairs()
            .all(|(field, value)| record.value(field) == value)
    }

    /// Returns the lesson key once all five levels are chosen.
    pub fn lesson_key(&self) -> Option<LessonKey> {
        if !self.is_complete() {
            return None;
        }
        Some(LessonKey::new(
            self.values[0].clone(),
            self.values[1].clone(),
            self.values[2].clone(),
            self.values[3].clone(),
            self.values[4].clone(),
        ))
    }
}
