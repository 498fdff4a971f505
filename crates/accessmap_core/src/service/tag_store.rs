//! Tag store facade.
//!
//! # Responsibility
//! - Provide create/read/update/delete/clear/deduplicate entry points over
//!   any `TagRepository`.
//! - Run validation and duplicate checks before every create.
//!
//! # Invariants
//! - Every write is one read-full/modify/write-full cycle executed while
//!   holding the store lock, so concurrent writers never lose updates.
//! - A rejected save never reaches the repository.
//! - Medium failures on `save_tag` come back as `success=false` with a
//!   `Storage` validation error; other operations return `StoreError::Repo`.
//! - `NotFound` is distinct from validation failure.

use crate::dedup::deduplicate_tags;
use crate::geo::{is_valid_lat, is_valid_lon, LatLng};
use crate::model::tag::{SourceKind, Tag, TagDraft, TagId, TagPatch};
use crate::repo::tag_repo::{RepoError, TagRepository};
use crate::service::summary::{tags_within_radius, TagStatistics, TagsBySource};
use crate::validation::{TagValidator, ValidationError, ValidationOptions, ValidationReport};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for every operation except `save_tag`.
#[derive(Debug)]
pub enum StoreError {
    /// No tag with this id exists.
    NotFound(TagId),
    /// The resulting record failed validation; nothing was written.
    Validation(ValidationReport),
    InvalidArgument(String),
    Repo(RepoError),
    /// A writer panicked while holding the store lock.
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "tag not found: {id}"),
            Self::Validation(report) => write!(f, "tag validation failed: {report}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "tag store lock poisoned by an earlier panic"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Per-call switches for `save_tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Skip the type-set check and the duplicate search. The candidate still
    /// needs an id and in-range coordinates to be representable.
    pub skip_validation: bool,
    /// Persist even when duplicates were found.
    pub allow_duplicates: bool,
    pub check_duplicates: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            skip_validation: false,
            allow_duplicates: false,
            check_duplicates: true,
        }
    }
}

impl SaveOptions {
    /// Default options with `allow_duplicates` set.
    pub fn allowing_duplicates() -> Self {
        Self {
            allow_duplicates: true,
            ..Self::default()
        }
    }
}

/// Result envelope of `save_tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub success: bool,
    pub validation: ValidationReport,
    /// The stored record; `Some` iff `success`.
    pub saved_tag: Option<Tag>,
}

impl SaveOutcome {
    fn rejected(validation: ValidationReport) -> Self {
        Self {
            success: false,
            validation,
            saved_tag: None,
        }
    }

    fn saved(validation: ValidationReport, tag: Tag) -> Self {
        Self {
            success: true,
            validation,
            saved_tag: Some(tag),
        }
    }
}

/// Counts reported by `replace_feed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReplacement {
    pub removed: usize,
    pub inserted: usize,
}

/// Validate-then-write facade over one repository.
///
/// Share across threads with `Arc<TagStore<R>>` when `R: Send`.
pub struct TagStore<R: TagRepository> {
    repo: Mutex<R>,
    options: ValidationOptions,
}

impl<R: TagRepository> TagStore<R> {
    /// Creates a store that accepts only the standard tag types and uses the
    /// default 2m duplicate threshold.
    pub fn new(repo: R) -> Self {
        Self::with_options(repo, ValidationOptions::standard())
    }

    pub fn with_options(repo: R, options: ValidationOptions) -> Self {
        Self {
            repo: Mutex::new(repo),
            options,
        }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Consumes the store and returns the repository.
    pub fn into_inner(self) -> StoreResult<R> {
        self.repo.into_inner().map_err(|_| StoreError::Poisoned)
    }

    /// Validates `candidate` and appends it to the collection.
    ///
    /// # Contract
    /// - Invalid candidates are not written (`success=false`, errors set).
    /// - Candidates with duplicates are not written unless
    ///   `allow_duplicates`; the duplicates are listed in the report.
    /// - A candidate whose id is already stored is rejected.
    /// - Never returns an error: medium failures are reported as a
    ///   `ValidationError::Storage` entry.
    pub fn save_tag(&self, candidate: &TagDraft, options: &SaveOptions) -> SaveOutcome {
        let mut repo = match self.lock() {
            Ok(repo) => repo,
            Err(err) => {
                return SaveOutcome::rejected(ValidationReport::failure(ValidationError::Storage(
                    err.to_string(),
                )));
            }
        };

        let existing = match repo.load_tags() {
            Ok(tags) => tags,
            Err(err) => {
                warn!("event=tag_save module=store status=error error_code=load_failed error={err}");
                return SaveOutcome::rejected(ValidationReport::failure(ValidationError::Storage(
                    err.to_string(),
                )));
            }
        };

        let validator = TagValidator::new(self.save_validation_options(options));
        let (mut report, tag) = validator.resolve(candidate, &existing);
        let Some(tag) = tag else {
            warn!(
                "event=tag_save module=store status=rejected reason=invalid error_count={}",
                report.errors.len()
            );
            return SaveOutcome::rejected(report);
        };

        if existing.iter().any(|stored| stored.id == tag.id) {
            warn!(
                "event=tag_save module=store status=rejected reason=id_conflict tag_id={}",
                tag.id
            );
            report.errors.push(ValidationError::IdConflict(tag.id));
            return SaveOutcome::rejected(report);
        }

        if report.has_duplicates() && !options.allow_duplicates {
            info!(
                "event=tag_save module=store status=rejected reason=duplicates duplicate_count={}",
                report.duplicates.len()
            );
            return SaveOutcome::rejected(report);
        }

        let mut next = existing;
        next.push(tag.clone());
        if let Err(err) = repo.replace_tags(&next) {
            error!("event=tag_save module=store status=error error_code=write_failed error={err}");
            report.errors.push(ValidationError::Storage(err.to_string()));
            return SaveOutcome::rejected(report);
        }

        info!(
            "event=tag_save module=store status=ok tag_id={} type={} source={} duplicate_count={}",
            tag.id,
            tag.kind,
            tag.source_kind(),
            report.duplicates.len()
        );
        SaveOutcome::saved(report, tag)
    }

    /// Returns the full collection in stored order.
    pub fn get_tags(&self) -> StoreResult<Vec<Tag>> {
        let repo = self.lock()?;
        Ok(repo.load_tags()?)
    }

    pub fn get_tag(&self, id: &str) -> StoreResult<Option<Tag>> {
        Ok(self.get_tags()?.into_iter().find(|tag| tag.id == id))
    }

    /// Merges `patch` into the stored tag and persists it.
    ///
    /// Coordinates are re-checked; the type set is re-checked only when the
    /// patch changes the type.
    pub fn update_tag(&self, id: &str, patch: &TagPatch) -> StoreResult<Tag> {
        let mut repo = self.lock()?;
        let mut tags = repo.load_tags()?;
        let index = tags
            .iter()
            .position(|tag| tag.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = tags[index].clone();
        patch.apply_to(&mut updated);

        let options = ValidationOptions {
            allowed_types: patch
                .kind
                .as_ref()
                .and(self.options.allowed_types.clone()),
            check_duplicates: false,
            ..self.options.clone()
        };
        let report = TagValidator::new(options).validate(&TagDraft::from(&updated), &[]);
        if !report.is_valid() {
            warn!(
                "event=tag_update module=store status=rejected tag_id={id} error_count={}",
                report.errors.len()
            );
            return Err(StoreError::Validation(report));
        }

        tags[index] = updated.clone();
        repo.replace_tags(&tags)?;

        info!("event=tag_update module=store status=ok tag_id={id}");
        Ok(updated)
    }

    /// Removes one tag.
    ///
    /// An unknown id is `NotFound`, never a silent no-op.
    pub fn delete_tag(&self, id: &str) -> StoreResult<()> {
        let mut repo = self.lock()?;
        let mut tags = repo.load_tags()?;
        let index = tags
            .iter()
            .position(|tag| tag.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        tags.remove(index);
        repo.replace_tags(&tags)?;

        info!("event=tag_delete module=store status=ok tag_id={id}");
        Ok(())
    }

    pub fn clear_tags(&self) -> StoreResult<()> {
        let mut repo = self.lock()?;
        repo.replace_tags(&[])?;
        info!("event=tag_clear module=store status=ok");
        Ok(())
    }

    /// Collapses duplicate clusters across the whole collection.
    ///
    /// Returns how many tags were removed. Nothing is written when nothing
    /// changes.
    pub fn deduplicate_tags(&self, threshold_m: f64) -> StoreResult<usize> {
        if !threshold_m.is_finite() || threshold_m < 0.0 {
            return Err(StoreError::InvalidArgument(format!(
                "dedupe threshold must be a finite, non-negative distance, got {threshold_m}"
            )));
        }

        let mut repo = self.lock()?;
        let tags = repo.load_tags()?;
        let reduced = deduplicate_tags(&tags, threshold_m);
        let removed = tags.len() - reduced.len();
        if removed > 0 {
            repo.replace_tags(&reduced)?;
        }

        info!(
            "event=tag_dedupe module=store status=ok before={} removed={removed}",
            tags.len()
        );
        Ok(removed)
    }

    /// Replaces every tag of one feed with a freshly fetched set.
    ///
    /// # Contract
    /// - Only `osm` and `model` feeds can be replaced.
    /// - Every incoming tag must belong to `source`, be structurally valid
    ///   and carry an id unique across the resulting collection.
    /// - Out-of-range confidence values are dropped, as in `save_tag`.
    /// - Tags of other sources keep their position; new feed tags are
    ///   appended in input order.
    pub fn replace_feed(&self, source: SourceKind, tags: Vec<Tag>) -> StoreResult<FeedReplacement> {
        if !source.is_feed() {
            return Err(StoreError::InvalidArgument(
                "user tags are not owned by a feed and cannot be replaced wholesale".to_string(),
            ));
        }
        if let Some(foreign) = tags.iter().find(|tag| tag.source_kind() != source) {
            return Err(StoreError::InvalidArgument(format!(
                "tag `{}` has source `{}`, expected `{source}`",
                foreign.id,
                foreign.source_kind()
            )));
        }

        let validator = TagValidator::new(ValidationOptions {
            check_duplicates: false,
            ..self.options.clone()
        });
        let mut resolved = Vec::with_capacity(tags.len());
        for tag in &tags {
            match validator.resolve(&TagDraft::from(tag), &[]) {
                (_, Some(tag)) => resolved.push(tag),
                (report, None) => return Err(StoreError::Validation(report)),
            }
        }

        let mut repo = self.lock()?;
        let existing = repo.load_tags()?;
        let mut next: Vec<Tag> = existing
            .iter()
            .filter(|tag| tag.source_kind() != source)
            .cloned()
            .collect();
        let removed = existing.len() - next.len();

        let mut seen: HashSet<&str> = next.iter().map(|tag| tag.id.as_str()).collect();
        for tag in &resolved {
            if !seen.insert(tag.id.as_str()) {
                return Err(StoreError::Validation(ValidationReport::failure(
                    ValidationError::IdConflict(tag.id.clone()),
                )));
            }
        }

        let inserted = resolved.len();
        next.extend(resolved);
        repo.replace_tags(&next)?;

        info!("event=feed_replace module=store status=ok source={source} removed={removed} inserted={inserted}");
        Ok(FeedReplacement { removed, inserted })
    }

    pub fn statistics(&self) -> StoreResult<TagStatistics> {
        Ok(TagStatistics::from_tags(&self.get_tags()?))
    }

    pub fn tags_by_source(&self) -> StoreResult<TagsBySource> {
        Ok(TagsBySource::from_tags(&self.get_tags()?))
    }

    /// Tags within `radius_m` meters of `center`, in stored order.
    pub fn tags_near(&self, center: LatLng, radius_m: f64) -> StoreResult<Vec<Tag>> {
        if !is_valid_lat(center.lat) || !is_valid_lon(center.lon) {
            return Err(StoreError::InvalidArgument(format!(
                "center ({}, {}) is outside valid coordinate ranges",
                center.lat, center.lon
            )));
        }
        Ok(tags_within_radius(&self.get_tags()?, center, radius_m))
    }

    fn save_validation_options(&self, options: &SaveOptions) -> ValidationOptions {
        if options.skip_validation {
            return ValidationOptions {
                allowed_types: None,
                check_duplicates: false,
                ..self.options.clone()
            };
        }
        ValidationOptions {
            check_duplicates: self.options.check_duplicates && options.check_duplicates,
            ..self.options.clone()
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, R>> {
        self.repo.lock().map_err(|_| StoreError::Poisoned)
    }
}
