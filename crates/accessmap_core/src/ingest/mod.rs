//! Feed ingestion: turn external feature sources into tag drafts.
//!
//! Fetching is out of scope here; callers hand in already-decoded payloads
//! and pass the resulting drafts to `TagStore::save_tag` or
//! `TagStore::replace_feed`.

pub mod detection;
pub mod osm;
