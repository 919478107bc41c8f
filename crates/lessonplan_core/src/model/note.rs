//! Practice note domain model.
//!
//! # Responsibility
//! - Define the teacher-authored note record attached to a lesson.
//! - Own the row layout shared by every note write path.
//!
//! # Invariants
//! - Notes are append-only; there is no update or delete shape.
//! - New notes always carry the full `LessonKey` (`NoteScope::FullKey`).
//! - `to_row()` column order equals `NOTE_ROW_COLUMNS`.
//! - `created_at` has whole-second resolution, matching every store.

use crate::model::curriculum::LessonKey;
use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one appended note row.
pub type NoteId = Uuid;

/// Wall-clock timestamp layout written to note stores.
pub const NOTE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column ids of a serialized note row, in write order.
pub const NOTE_ROW_COLUMNS: [&str; 15] = [
    "note_id",
    "school_level",
    "grade",
    "unit",
    "subunit",
    "lesson",
    "criteria_knowledge",
    "criteria_thinking",
    "criteria_attitude",
    "difficulties",
    "techniques",
    "tools",
    "handoff",
    "memo",
    "created_at",
];

/// How much of the lesson key a stored note row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteScope {
    /// Row carries all five key levels and matches one exact lesson.
    FullKey,
    /// Legacy row with lesson text only; matches any lesson with that text.
    LessonOnly,
}

/// One free-text field of the note form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    CriteriaKnowledge,
    CriteriaThinking,
    CriteriaAttitude,
    Difficulties,
    Techniques,
    Tools,
    Handoff,
    Memo,
}

impl NoteField {
    /// Form order.
    pub const ALL: [NoteField; 8] = [
        NoteField::CriteriaKnowledge,
        NoteField::CriteriaThinking,
        NoteField::CriteriaAttitude,
        NoteField::Difficulties,
        NoteField::Techniques,
        NoteField::Tools,
        NoteField::Handoff,
        NoteField::Memo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriteriaKnowledge => "criteria_knowledge",
            Self::CriteriaThinking => "criteria_thinking",
            Self::CriteriaAttitude => "criteria_attitude",
            Self::Difficulties => "difficulties",
            Self::Techniques => "techniques",
            Self::Tools => "tools",
            Self::Handoff => "handoff",
            Self::Memo => "memo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CriteriaKnowledge => "評価規準（知識・技能）",
            Self::CriteriaThinking => "評価規準（思考・判断・表現）",
            Self::CriteriaAttitude => "評価規準（主体的に学習に取り組む態度）",
            Self::Difficulties => "児童のつまずき",
            Self::Techniques => "指導の工夫",
            Self::Tools => "使用した教具",
            Self::Handoff => "引き継ぎ事項",
            Self::Memo => "メモ",
        }
    }
}

/// The eight free-text fields submitted together by the note form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    pub criteria_knowledge: String,
    pub criteria_thinking: String,
    pub criteria_attitude: String,
    pub difficulties: String,
    pub techniques: String,
    pub tools: String,
    pub handoff: String,
    pub memo: String,
}

impl NoteFields {
    pub fn get(&self, field: NoteField) -> &str {
        match field {
            NoteField::CriteriaKnowledge => &self.criteria_knowledge,
            NoteField::CriteriaThinking => &self.criteria_thinking,
            NoteField::CriteriaAttitude => &self.criteria_attitude,
            NoteField::Difficulties => &self.difficulties,
            NoteField::Techniques => &self.techniques,
            NoteField::Tools => &self.tools,
            NoteField::Handoff => &self.handoff,
            NoteField::Memo => &self.memo,
        }
    }

    pub fn set(&mut self, field: NoteField, value: impl Into<String>) {
        let slot = match field {
            NoteField::CriteriaKnowledge => &mut self.criteria_knowledge,
            NoteField::CriteriaThinking => &mut self.criteria_thinking,
            NoteField::CriteriaAttitude => &mut self.criteria_attitude,
            NoteField::Difficulties => &mut self.difficulties,
            NoteField::Techniques => &mut self.techniques,
            NoteField::Tools => &mut self.tools,
            NoteField::Handoff => &mut self.handoff,
            NoteField::Memo => &mut self.memo,
        };
        *slot = value.into();
    }

    /// True when every field is empty after trim.
    pub fn is_blank(&self) -> bool {
        NoteField::ALL
            .iter()
            .all(|field| self.get(*field).trim().is_empty())
    }

    /// Copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        let mut out = Self::default();
        for field in NoteField::ALL {
            out.set(field, self.get(field).trim());
        }
        out
    }

    /// Total character count, used for metadata-only logging.
    pub fn char_count(&self) -> usize {
        NoteField::ALL
            .iter()
            .map(|field| self.get(*field).chars().count())
            .sum()
    }
}

/// One row of the practice note dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: NoteId,
    pub lesson: LessonKey,
    pub scope: NoteScope,
    pub fields: NoteFields,
    pub created_at: NaiveDateTime,
}

impl NoteRecord {
    /// Creates a full-key note with a generated id.
    ///
    /// Sub-second precision is dropped from `created_at`.
    pub fn new(lesson: LessonKey, fields: NoteFields, created_at: NaiveDateTime) -> Self {
        Self {
            note_id: Uuid::new_v4(),
            lesson,
            scope: NoteScope::FullKey,
            fields,
            created_at: created_at.with_nanosecond(0).unwrap_or(created_at),
        }
    }

    /// Whether this note belongs to `key` under its scope.
    pub fn matches(&self, key: &LessonKey) -> bool {
        match self.scope {
            NoteScope::FullKey => &self.lesson == key,
            NoteScope::LessonOnly => self.lesson.lesson == key.lesson,
        }
    }

    /// Serializes into the shared write layout (`NOTE_ROW_COLUMNS`).
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(NOTE_ROW_COLUMNS.len());
        row.push(self.note_id.to_string());
        row.push(self.lesson.school_level.clone());
        row.push(self.lesson.grade.clone());
        row.push(self.lesson.unit.clone());
        row.push(self.lesson.subunit.clone());
        row.push(self.lesson.lesson.clone());
        for field in NoteField::ALL {
            row.push(self.fields.get(field).to_string());
        }
        row.push(format_timestamp(&self.created_at));
        row
    }
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(NOTE_TIMESTAMP_FORMAT).to_string()
}

/// Parses stored timestamps.
///
/// Accepts the write layout, the slash-separated layout spreadsheets tend to
/// produce, and RFC 3339.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(trimmed, NOTE_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y/%m/%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|value| value.naive_local())
        })
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp, NoteField, NoteFields, NoteRecord, NoteScope, NOTE_ROW_COLUMNS};
    use crate::model::curriculum::LessonKey;
    use chrono::Timelike;

    fn moon_key() -> LessonKey {
        LessonKey::new("小学校", "5", "月と星", "月の満ち欠け", "月の形の変化を観察する")
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        let mut fields = NoteFields::default();
        fields.set(NoteField::Memo, "  \n ");
        assert!(fields.is_blank());
        fields.set(NoteField::Tools, "月齢カレンダー");
        assert!(!fields.is_blank());
    }

    #[test]
    fn row_layout_matches_column_ids() {
        let created_at = parse_timestamp("2026-04-10 09:30:00").expect("timestamp");
        let mut fields = NoteFields::default();
        fields.set(NoteField::Handoff, "次回は半月から");
        let note = NoteRecord::new(moon_key(), fields, created_at);

        let row = note.to_row();
        assert_eq!(row.len(), NOTE_ROW_COLUMNS.len());
        assert_eq!(row[5], "月の形の変化を観察する");
        assert_eq!(row[12], "次回は半月から");
        assert_eq!(row[14], "2026-04-10 09:30:00");
    }

    #[test]
    fn lesson_only_scope_matches_by_lesson_text() {
        let created_at = parse_timestamp("2026/04/10 09:30:00").expect("slash timestamp");
        let mut legacy = NoteRecord::new(
            LessonKey::new("", "", "", "", "月の形の変化を観察する"),
            NoteFields::default(),
            created_at,
        );
        legacy.scope = NoteScope::LessonOnly;
        assert!(legacy.matches(&moon_key()));

        legacy.scope = NoteScope::FullKey;
        assert!(!legacy.matches(&moon_key()));
    }

    #[test]
    fn new_note_truncates_to_whole_seconds() {
        let submitted =
            parse_timestamp("2026-06-01T13:45:00.600").expect("fractional timestamp");
        let note = NoteRecord::new(moon_key(), NoteFields::default(), submitted);
        assert_eq!(note.created_at.nanosecond(), 0);
        assert_eq!(
            parse_timestamp(&note.to_row()[14]),
            Some(note.created_at)
        );
    }

    #[test]
    fn note_serializes_with_created_at_text() {
        let created_at = parse_timestamp("2026-04-10 09:30:00").expect("timestamp");
        let note = NoteRecord::new(moon_key(), NoteFields::default(), created_at);
        let value = serde_json::to_value(&note).expect("serialize note");
        assert_eq!(value["created_at"], "2026-04-10T09:30:00");
        assert_eq!(value["scope"], "full_key");
    }

    #[test]
    fn parse_timestamp_accepts_rfc3339_and_rejects_garbage() {
        assert!(parse_timestamp("2026-04-10T09:30:00+09:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
