//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, merge and repository calls into the tag-store
//!   API used by UI and import collaborators.
//! - Keep callers decoupled from the storage medium.

pub mod summary;
pub mod tag_store;
