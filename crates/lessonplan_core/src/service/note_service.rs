//! Practice note use-case service.
//!
//! # Responsibility
//! - Hold the session snapshot of the note dataset.
//! - Look up the authoritative note for a lesson key.
//! - Append new notes through the repository's write capability.
//!
//! # Invariants
//! - `lookup` returns the first matching row in source order. No merge.
//! - `append` never touches the snapshot; appended rows become visible only
//!   after `reload`.
//! - A submission with every field blank is rejected before any write.

use crate::model::curriculum::LessonKey;
use crate::model::note::{NoteFields, NoteRecord};
use crate::repo::note_repo::{NoteRepository, RepoError, WriteError};
use chrono::NaiveDateTime;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Every form field is blank.
    EmptyNote,
    /// Snapshot could not be loaded.
    Load(RepoError),
    /// Append failed; nothing was written.
    Persistence(WriteError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNote => write!(f, "note has no content; fill in at least one field"),
            Self::Load(err) => write!(f, "failed to load notes: {err}"),
            Self::Persistence(err) => write!(f, "failed to save note: {err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyNote => None,
            Self::Load(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        Self::Load(value)
    }
}

impl From<WriteError> for NoteServiceError {
    fn from(value: WriteError) -> Self {
        Self::Persistence(value)
    }
}

/// Note service facade over one repository.
pub struct NoteService<R: NoteRepository> {
    repo: R,
    snapshot: Vec<NoteRecord>,
}

impl<R: NoteRepository> NoteService<R> {
    /// Creates the service and loads the initial snapshot.
    pub fn open(repo: R) -> Result<Self, NoteServiceError> {
        let mut service = Self {
            repo,
            snapshot: Vec::new(),
        };
        service.reload()?;
        Ok(service)
    }

    /// Replaces the snapshot with a fresh read of the store.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn reload(&mut self) -> Result<usize, NoteServiceError> {
        let started_at = Instant::now();
        match self.repo.load_notes() {
            Ok(notes) => {
                self.snapshot = notes;
                info!(
                    "event=notes_load module=service status=ok duration_ms={} notes={}",
                    started_at.elapsed().as_millis(),
                    self.snapshot.len()
                );
                Ok(self.snapshot.len())
            }
            Err(err) => {
                error!(
                    "event=notes_load module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Returns the first note matching `key`, if any.
    pub fn lookup(&self, key: &LessonKey) -> Option<&NoteRecord> {
        self.snapshot.iter().find(|note| note.matches(key))
    }

    /// Counts every snapshot row matching `key`, including shadowed ones.
    pub fn match_count(&self, key: &LessonKey) -> usize {
        self.snapshot.iter().filter(|note| note.matches(key)).count()
    }

    /// Appends one note for `key` stamped with `created_at`.
    ///
    /// # Errors
    /// - `EmptyNote` when every field is blank.
    /// - `Persistence` when the store refuses or cannot be reached. There is
    ///   no retry; the caller keeps `fields` for resubmission.
    pub fn append(
        &self,
        key: &LessonKey,
        fields: &NoteFields,
        created_at: NaiveDateTime,
    ) -> Result<NoteRecord, NoteServiceError> {
        if fields.is_blank() {
            return Err(NoteServiceError::EmptyNote);
        }

        let started_at = Instant::now();
        let note = NoteRecord::new(key.clone(), fields.trimmed(), created_at);
        match self.repo.append(&note) {
            Ok(()) => {
                info!(
                    "event=note_append module=service status=ok duration_ms={} note_id={} chars={}",
                    started_at.elapsed().as_millis(),
                    note.note_id,
                    note.fields.char_count()
                );
                Ok(note)
            }
            Err(err) => {
                error!(
                    "event=note_append module=service status=error duration_ms={} target={} error={}",
                    started_at.elapsed().as_millis(),
                    self.repo.describe(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Rows in the current snapshot.
    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}
