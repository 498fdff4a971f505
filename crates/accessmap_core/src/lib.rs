//! Core domain logic for AccessMap.
//! Spatial accessibility tags, their validation and merging, and route
//! obstacle warnings. This crate is the single source of truth for tag
//! invariants; the FFI and CLI crates only adapt it.

pub mod config;
pub mod db;
pub mod dedup;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod route;
pub mod service;
pub mod validation;

pub use config::{ConfigError, CoreConfig, DEFAULT_NAMESPACE};
pub use dedup::{deduplicate_tags, merge_duplicate_tags};
pub use geo::{distance, distance_between, distance_to_segment, LatLng};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::tag::{SourceKind, Tag, TagDraft, TagId, TagPatch, TagSource, TagType};
pub use repo::json_file::JsonFileTagRepository;
pub use repo::memory::{InMemoryTagRepository, UnavailableTagRepository};
pub use repo::tag_repo::{
    NamespaceSummary, RepoError, RepoResult, SqliteTagRepository, TagRepository,
};
pub use route::{detect_obstacles, HazardTypes, ObstacleDetector, ObstacleHit};
pub use service::summary::{TagStatistics, TagsBySource};
pub use service::tag_store::{
    FeedReplacement, SaveOptions, SaveOutcome, StoreError, StoreResult, TagStore,
};
pub use validation::{
    find_duplicates, is_duplicate, validate_tag, TagValidator, ValidationError,
    ValidationOptions, ValidationReport, ValidationWarning,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
