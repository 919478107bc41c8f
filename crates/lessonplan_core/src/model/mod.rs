//! Domain model for curriculum lookup and practice notes.
//!
//! # Responsibility
//! - Define the read-only curriculum record and its hierarchical key.
//! - Define the append-only practice note record.
//!
//! # Invariants
//! - `LessonKey` is the only join key between the two datasets.

pub mod curriculum;
pub mod note;
