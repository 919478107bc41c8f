//! Practice note repository contracts and implementations.
//!
//! # Responsibility
//! - Define the narrow write capability (`NoteSink`) every store exposes.
//! - Load the whole note dataset as a snapshot in source order.
//! - Provide SQLite-backed and table-backed (CSV read + row sink write) stores.
//! - Lay table-bound notes out by the target header (`project_note_row`).
//!
//! # Invariants
//! - `append` writes one whole row or nothing.
//! - `load_notes` preserves source order so first-match lookup is stable.
//! - Table-backed appends follow the table's own header order, so the row
//!   reads back through the same column aliases.
//! - Repositories never update or delete existing rows.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::curriculum::LessonKey;
use crate::model::note::{
    format_timestamp, parse_timestamp, NoteFields, NoteId, NoteRecord, NoteScope,
    NOTE_ROW_COLUMNS,
};
use crate::source::columns::{ColumnMap, NOTE_COLUMNS};
use crate::source::{SourceError, TableSource};
use chrono::NaiveDateTime;
use log::warn;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    note_id,
    school_level,
    grade,
    unit,
    subunit,
    lesson,
    criteria_knowledge,
    criteria_thinking,
    criteria_attitude,
    difficulties,
    techniques,
    tools,
    handoff,
    memo,
    created_at
FROM lesson_notes";

const FULL_KEY_COLUMNS: [&str; 5] = ["school_level", "grade", "unit", "subunit", "lesson"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors while loading the note dataset.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Source(SourceError),
    MissingColumn(&'static str),
    /// Table required by the store is absent.
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Source(err) => write!(f, "{err}"),
            Self::MissingColumn(column) => {
                write!(f, "note dataset is missing required column `{column}`")
            }
            Self::MissingRequiredTable(table) => {
                write!(f, "note store is missing required table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SourceError> for RepoError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

/// Failure of a single-row append.
#[derive(Debug)]
pub enum WriteError {
    /// Store could not be reached (DNS, connect, timeout).
    Transport(String),
    /// Credentials are missing or were refused.
    Unauthorized(String),
    /// Store answered but refused the row.
    Rejected { status: u16, body: String },
    /// Target table header could not be read before the write.
    Source(SourceError),
    /// Target table header has no column the row can be keyed by.
    Layout(String),
    /// Local storage failure.
    Storage(DbError),
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "note store unreachable: {message}"),
            Self::Unauthorized(message) => write!(f, "note store authorization failed: {message}"),
            Self::Rejected { status, body } => {
                write!(f, "note store rejected the row (status {status}): {body}")
            }
            Self::Source(err) => write!(f, "note table header unavailable: {err}"),
            Self::Layout(message) => write!(f, "note table layout unsupported: {message}"),
            Self::Storage(err) => write!(f, "note store write failed: {err}"),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for WriteError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

impl From<rusqlite::Error> for WriteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// Narrow append-only write capability.
pub trait NoteSink {
    /// Human-readable target for logs and error messages.
    fn describe(&self) -> String;
    /// Appends one row atomically. No retry.
    fn append(&self, note: &NoteRecord) -> Result<(), WriteError>;
}

/// Appends one already laid-out row to a remote table.
pub trait RowSink {
    /// Human-readable target for logs and error messages.
    fn describe(&self) -> String;
    /// Appends `row` as-is. No retry.
    fn append_row(&self, row: &[String]) -> Result<(), WriteError>;
}

/// Full note store: snapshot reads plus the append capability.
pub trait NoteRepository: NoteSink {
    /// Loads every note row in source order.
    fn load_notes(&self) -> RepoResult<Vec<NoteRecord>>;
}

impl<T: NoteSink + ?Sized> NoteSink for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn append(&self, note: &NoteRecord) -> Result<(), WriteError> {
        (**self).append(note)
    }
}

impl<T: NoteRepository + ?Sized> NoteRepository for Box<T> {
    fn load_notes(&self) -> RepoResult<Vec<NoteRecord>> {
        (**self).load_notes()
    }
}

/// SQLite-backed local note store.
pub struct SqliteNoteRepository {
    conn: Connection,
    label: String,
}

impl SqliteNoteRepository {
    /// Wraps a migrated connection after checking the schema.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_note_connection_ready(&conn)?;
        Ok(Self {
            conn,
            label: "sqlite".to_string(),
        })
    }

    /// Opens (and migrates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        let mut repo = Self::try_new(open_db(path)?)?;
        repo.label = format!("sqlite:{}", path.display());
        Ok(repo)
    }

    /// Opens an empty in-memory store.
    pub fn in_memory() -> RepoResult<Self> {
        let mut repo = Self::try_new(open_db_in_memory()?)?;
        repo.label = "sqlite:memory".to_string();
        Ok(repo)
    }

    /// Row count, including rows not yet visible to a loaded snapshot.
    pub fn count(&self) -> RepoResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lesson_notes;", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl NoteSink for SqliteNoteRepository {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn append(&self, note: &NoteRecord) -> Result<(), WriteError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO lesson_notes (
                note_id,
                school_level,
                grade,
                unit,
                subunit,
                lesson,
                criteria_knowledge,
                criteria_thinking,
                criteria_attitude,
                difficulties,
                techniques,
                tools,
                handoff,
                memo,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                note.note_id.to_string(),
                note.lesson.school_level,
                note.lesson.grade,
                note.lesson.unit,
                note.lesson.subunit,
                note.lesson.lesson,
                note.fields.criteria_knowledge,
                note.fields.criteria_thinking,
                note.fields.criteria_attitude,
                note.fields.difficulties,
                note.fields.techniques,
                note.fields.tools,
                note.fields.handoff,
                note.fields.memo,
                format_timestamp(&note.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn load_notes(&self) -> RepoResult<Vec<NoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY seq ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }
}

/// Note store that reads a table export and writes through a row sink.
///
/// Used for spreadsheet-hosted notes: the sheet is read as CSV and appended
/// through its values API.
pub struct TableNoteRepository<W: RowSink> {
    source: Box<dyn TableSource>,
    sink: W,
}

impl<W: RowSink> TableNoteRepository<W> {
    pub fn new(source: Box<dyn TableSource>, sink: W) -> Self {
        Self { source, sink }
    }
}

impl<W: RowSink> NoteSink for TableNoteRepository<W> {
    fn describe(&self) -> String {
        format!("{} <- {}", self.source.describe(), self.sink.describe())
    }

    fn append(&self, note: &NoteRecord) -> Result<(), WriteError> {
        let table = self.source.load_table()?;
        let row = project_note_row(&table.headers, note)?;
        self.sink.append_row(&row)
    }
}

impl<W: RowSink> NoteRepository for TableNoteRepository<W> {
    fn load_notes(&self) -> RepoResult<Vec<NoteRecord>> {
        let table = self.source.load_table()?;
        let columns = ColumnMap::for_table(&table, NOTE_COLUMNS);
        if !columns.has("lesson") {
            return Err(RepoError::MissingColumn("lesson"));
        }
        let full_key_table = columns.first_missing(&FULL_KEY_COLUMNS).is_none();

        let mut notes = Vec::with_capacity(table.len());
        let mut undated = 0usize;
        for row in &table.rows {
            let lesson = LessonKey::new(
                columns.cell(row, "school_level"),
                columns.cell(row, "grade"),
                columns.cell(row, "unit"),
                columns.cell(row, "subunit"),
                columns.cell(row, "lesson"),
            );
            if lesson.lesson.is_empty() {
                continue;
            }
            let scope = if full_key_table && !lesson.school_level.is_empty() {
                NoteScope::FullKey
            } else {
                NoteScope::LessonOnly
            };
            let created_at = match parse_timestamp(columns.cell(row, "created_at")) {
                Some(value) => value,
                None => {
                    undated += 1;
                    NaiveDateTime::default()
                }
            };
            // Rows typed directly into the sheet have no id; they get a
            // session-local one.
            let note_id = Uuid::parse_str(columns.cell(row, "note_id"))
                .unwrap_or_else(|_| Uuid::new_v4());

            notes.push(NoteRecord {
                note_id,
                lesson,
                scope,
                fields: NoteFields {
                    criteria_knowledge: columns.cell(row, "criteria_knowledge").to_string(),
                    criteria_thinking: columns.cell(row, "criteria_thinking").to_string(),
                    criteria_attitude: columns.cell(row, "criteria_attitude").to_string(),
                    difficulties: columns.cell(row, "difficulties").to_string(),
                    techniques: columns.cell(row, "techniques").to_string(),
                    tools: columns.cell(row, "tools").to_string(),
                    handoff: columns.cell(row, "handoff").to_string(),
                    memo: columns.cell(row, "memo").to_string(),
                },
                created_at,
            });
        }

        if undated > 0 {
            warn!(
                "event=notes_undated_rows module=repo status=ok undated={}",
                undated
            );
        }
        Ok(notes)
    }
}

/// Lays `note` out in the order of `headers`.
///
/// Columns the header lacks are dropped; header columns with no note field
/// stay empty.
pub fn project_note_row(headers: &[String], note: &NoteRecord) -> Result<Vec<String>, WriteError> {
    let columns = ColumnMap::resolve(headers, NOTE_COLUMNS);
    if !columns.has("lesson") {
        return Err(WriteError::Layout(
            "note table has no lesson column".to_string(),
        ));
    }
    let mut row = vec![String::new(); headers.len()];
    for (id, value) in NOTE_ROW_COLUMNS.iter().zip(note.to_row()) {
        if let Some(position) = columns.position(id) {
            row[position] = value;
        }
    }
    Ok(row)
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<NoteRecord> {
    let id_text: String = row.get("note_id")?;
    let note_id = parse_note_id(&id_text)?;
    let created_text: String = row.get("created_at")?;
    let created_at = parse_timestamp(&created_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{created_text}` in lesson_notes.created_at"
        ))
    })?;

    Ok(NoteRecord {
        note_id,
        lesson: LessonKey {
            school_level: row.get("school_level")?,
            grade: row.get("grade")?,
            unit: row.get("unit")?,
            subunit: row.get("subunit")?,
            lesson: row.get("lesson")?,
        },
        scope: NoteScope::FullKey,
        fields: NoteFields {
            criteria_knowledge: row.get("criteria_knowledge")?,
            criteria_thinking: row.get("criteria_thinking")?,
            criteria_attitude: row.get("criteria_attitude")?,
            difficulties: row.get("difficulties")?,
            techniques: row.get("techniques")?,
            tools: row.get("tools")?,
            handoff: row.get("handoff")?,
            memo: row.get("memo")?,
        },
        created_at,
    })
}

fn parse_note_id(value: &str) -> RepoResult<NoteId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in lesson_notes.note_id"))
    })
}

fn ensure_note_connection_ready(conn: &Connection) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'lesson_notes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable("lesson_notes"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{project_note_row, WriteError};
    use crate::model::curriculum::LessonKey;
    use crate::model::note::{parse_timestamp, NoteFields, NoteRecord};

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn sample_note() -> NoteRecord {
        let fields = NoteFields {
            tools: "月齢カレンダー".to_string(),
            memo: "雲が多い".to_string(),
            ..NoteFields::default()
        };
        NoteRecord::new(
            LessonKey::new("小学校", "5", "月と星", "月の満ち欠け", "月の形の変化を観察する"),
            fields,
            parse_timestamp("2026-06-01 13:45:00").expect("timestamp"),
        )
    }

    #[test]
    fn projection_follows_japanese_header_order() {
        let row = project_note_row(
            &headers(&["記録日時", "メモ", "備考", "学習内容", "使用した教具"]),
            &sample_note(),
        )
        .unwrap();
        assert_eq!(
            row,
            vec![
                "2026-06-01 13:45:00".to_string(),
                "雲が多い".to_string(),
                String::new(),
                "月の形の変化を観察する".to_string(),
                "月齢カレンダー".to_string(),
            ]
        );
    }

    #[test]
    fn projection_requires_a_lesson_column() {
        let err = project_note_row(&headers(&["memo", "created_at"]), &sample_note()).unwrap_err();
        assert!(matches!(err, WriteError::Layout(_)));
    }
}
