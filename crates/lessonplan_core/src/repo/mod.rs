//! Practice note persistence.
//!
//! # Responsibility
//! - Define the append-only write capability and snapshot read contract.
//! - Isolate SQLite, CSV and HTTP details from the note service.
//!
//! # Invariants
//! - Every store appends whole rows only; none updates or deletes.
//! - Write failures surface as `WriteError` with the underlying cause.

pub mod note_repo;
pub mod sheet_sink;
