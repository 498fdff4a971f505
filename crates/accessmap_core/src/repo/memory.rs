//! Non-durable tag repositories.
//!
//! `InMemoryTagRepository` substitutes for a real medium in tests and
//! short-lived tools. `UnavailableTagRepository` is the degraded fallback
//! used when no medium can be opened: it fails every call so callers can
//! tell they are running without storage.

use crate::model::tag::Tag;
use crate::repo::tag_repo::{RepoError, RepoResult, TagRepository};

/// Vec-backed repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTagRepository {
    tags: Vec<Tag>,
}

impl InMemoryTagRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a pre-populated collection.
    pub fn with_tags(tags: Vec<Tag>) -> Self {
        Self { tags }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl TagRepository for InMemoryTagRepository {
    fn load_tags(&self) -> RepoResult<Vec<Tag>> {
        Ok(self.tags.clone())
    }

    fn replace_tags(&mut self, tags: &[Tag]) -> RepoResult<()> {
        self.tags = tags.to_vec();
        Ok(())
    }
}

/// Repository that never succeeds.
#[derive(Debug, Clone)]
pub struct UnavailableTagRepository {
    reason: String,
}

impl UnavailableTagRepository {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl TagRepository for UnavailableTagRepository {
    fn load_tags(&self) -> RepoResult<Vec<Tag>> {
        Err(RepoError::Unavailable(self.reason.clone()))
    }

    fn replace_tags(&mut self, _tags: &[Tag]) -> RepoResult<()> {
        Err(RepoError::Unavailable(self.reason.clone()))
    }
}
