//! Domain model for georeferenced accessibility tags.
//!
//! # Responsibility
//! - Define canonical data structures used by validation, merge, storage and
//!   route-obstacle logic.
//! - Keep one tag shape for user, OSM and model feeds.
//!
//! # Invariants
//! - Every tag is identified by a stable `TagId`.
//! - Source-specific metadata lives inside `TagSource`, never beside it.

pub mod tag;
