//! Core domain logic for the lesson planning tool.
//! Curriculum drill-down and practice note storage live here; the terminal
//! surface only renders what this crate resolves.

pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod source;

pub use config::{
    config_path_from_env, load_config, AppConfig, ConfigError, NotesBackend, CONFIG_ENV,
};
pub use index::curriculum_index::{CurriculumIndex, IndexError, IndexResult, Stage};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::curriculum::{CurriculumRecord, HierarchyField, LessonKey, Selection};
pub use model::note::{NoteField, NoteFields, NoteId, NoteRecord, NoteScope};
pub use repo::note_repo::{
    NoteRepository, NoteSink, RepoError, RepoResult, RowSink, SqliteNoteRepository,
    TableNoteRepository, WriteError,
};
pub use repo::sheet_sink::{SheetAppendSink, TokenSource};
pub use service::note_service::{NoteService, NoteServiceError};
pub use session::{DynNoteRepository, LessonSession, LessonView, SessionError};
pub use source::{
    CsvFileSource, HttpCsvSource, SourceError, SourceLocation, StaticTableSource, Table,
    TableSource,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
