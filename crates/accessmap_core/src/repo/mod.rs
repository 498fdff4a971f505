//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the whole-collection persistence contract the store builds on.
//! - Isolate SQLite and file-format details from store orchestration.
//!
//! # Invariants
//! - Repositories do not validate; the store validates before writing.
//! - Medium failures surface as `RepoError`, never as silent success.

pub mod json_file;
pub mod memory;
pub mod tag_repo;
