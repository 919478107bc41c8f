//! Read-only curriculum index.
//!
//! # Responsibility
//! - Own the cascading school level → grade → unit → subunit → lesson filter.
//! - Resolve complete selections to one authoritative curriculum record.
//!
//! # Invariants
//! - The index is a pure projection over data loaded once per session.

pub mod curriculum_index;
