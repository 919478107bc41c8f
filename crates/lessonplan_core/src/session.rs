//! Caller-owned lesson session.
//!
//! # Responsibility
//! - Hold one curriculum index and one note snapshot for a user session.
//! - Join a resolved lesson key to its practice note.
//! - Expose explicit reload operations for both datasets.
//!
//! # Invariants
//! - Datasets are loaded once at open and change only on explicit reload.
//! - A failed reload keeps the previous data in place.
//! - A failed note append leaves curriculum state untouched.

use crate::config::{AppConfig, NotesBackend};
use crate::index::curriculum_index::{CurriculumIndex, IndexError};
use crate::model::curriculum::{CurriculumRecord, LessonKey, Selection};
use crate::model::note::{NoteFields, NoteRecord};
use crate::repo::note_repo::{
    NoteRepository, RepoError, SqliteNoteRepository, TableNoteRepository, WriteError,
};
use crate::repo::sheet_sink::{SheetAppendSink, TokenSource};
use crate::service::note_service::{NoteService, NoteServiceError};
use crate::source::{SourceError, SourceLocation, TableSource};
use chrono::NaiveDateTime;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Boxed note store used by sessions built from configuration.
pub type DynNoteRepository = Box<dyn NoteRepository>;

#[derive(Debug)]
pub enum SessionError {
    Source(SourceError),
    Curriculum(IndexError),
    Notes(NoteServiceError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::Curriculum(err) => write!(f, "{err}"),
            Self::Notes(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Curriculum(err) => Some(err),
            Self::Notes(err) => Some(err),
        }
    }
}

impl From<SourceError> for SessionError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

impl From<IndexError> for SessionError {
    fn from(value: IndexError) -> Self {
        Self::Curriculum(value)
    }
}

impl From<NoteServiceError> for SessionError {
    fn from(value: NoteServiceError) -> Self {
        Self::Notes(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Notes(NoteServiceError::Load(value))
    }
}

impl From<WriteError> for SessionError {
    fn from(value: WriteError) -> Self {
        Self::Notes(NoteServiceError::Persistence(value))
    }
}

/// Official record plus the authoritative teacher note for one lesson.
#[derive(Debug, Clone, Copy)]
pub struct LessonView<'a> {
    pub record: &'a CurriculumRecord,
    /// `None` means no notes yet; not an error.
    pub note: Option<&'a NoteRecord>,
    /// Rows for this key hidden behind `note` by first-match lookup.
    pub shadowed_notes: usize,
}

/// Session-scoped state for one teacher.
pub struct LessonSession<R: NoteRepository = DynNoteRepository> {
    curriculum_source: Box<dyn TableSource>,
    index: CurriculumIndex,
    notes: NoteService<R>,
}

impl<R: NoteRepository> LessonSession<R> {
    /// Loads both datasets.
    pub fn open(curriculum_source: Box<dyn TableSource>, notes: R) -> Result<Self, SessionError> {
        let index = CurriculumIndex::load(curriculum_source.as_ref())?;
        let notes = NoteService::open(notes)?;
        info!(
            "event=session_open module=session status=ok records={} notes={}",
            index.len(),
            notes.snapshot_len()
        );
        Ok(Self {
            curriculum_source,
            index,
            notes,
        })
    }

    pub fn index(&self) -> &CurriculumIndex {
        &self.index
    }

    pub fn notes(&self) -> &NoteService<R> {
        &self.notes
    }

    /// Resolves a complete selection and joins its note.
    pub fn view(&self, selection: &Selection) -> Result<LessonView<'_>, SessionError> {
        let record = self.index.resolve_selection(selection)?;
        let note = self.notes.lookup(&record.key);
        let shadowed_notes = self.notes.match_count(&record.key).saturating_sub(1);
        Ok(LessonView {
            record,
            note,
            shadowed_notes,
        })
    }

    /// Appends a note for a key the curriculum actually contains.
    pub fn submit_note(
        &self,
        key: &LessonKey,
        fields: &NoteFields,
        created_at: NaiveDateTime,
    ) -> Result<NoteRecord, SessionError> {
        self.index.resolve(key)?;
        Ok(self.notes.append(key, fields, created_at)?)
    }

    /// Re-reads the curriculum dataset, keeping the old index on failure.
    pub fn reload_curriculum(&mut self) -> Result<usize, SessionError> {
        let index = CurriculumIndex::load(self.curriculum_source.as_ref())?;
        self.index = index;
        Ok(self.index.len())
    }

    /// Re-reads the note dataset, keeping the old snapshot on failure.
    pub fn reload_notes(&mut self) -> Result<usize, SessionError> {
        Ok(self.notes.reload()?)
    }
}

impl LessonSession<DynNoteRepository> {
    /// Builds sources and stores described by `config` and opens a session.
    pub fn from_config(config: &AppConfig) -> Result<Self, SessionError> {
        let curriculum_source = SourceLocation::parse(&config.curriculum.source)?.open()?;
        let notes: DynNoteRepository = match config.notes.backend {
            NotesBackend::Sqlite => Box::new(SqliteNoteRepository::open(&config.notes.db_path)?),
            NotesBackend::Sheet => {
                let source = SourceLocation::parse(config.notes.source.as_deref().unwrap_or(""))?
                    .open()?;
                let sink = SheetAppendSink::new(
                    config.notes.append_endpoint.clone().unwrap_or_default(),
                    TokenSource::Env(config.notes.token_env.clone()),
                )?;
                Box::new(TableNoteRepository::new(source, sink))
            }
        };
        Self::open(curriculum_source, notes)
    }
}
