//! Candidate tag validation and duplicate detection.
//!
//! # Responsibility
//! - Check a `TagDraft` structurally (type, coordinates, id) and
//!   semantically (source, confidence, feed metadata).
//! - Find stored tags that the candidate duplicates.
//!
//! # Invariants
//! - Every applicable rule is evaluated; errors are collected, never
//!   short-circuited.
//! - Duplicates and semantic problems are warnings. Only errors make a
//!   candidate invalid.
//! - Two tags are duplicates iff they share a type and lie within the
//!   spatial threshold (inclusive).

use crate::geo::{distance_between, is_valid_lat, is_valid_lon};
use crate::model::tag::{SourceKind, Tag, TagDraft, TagId, TagSource, TagType};
use chrono::Utc;
use std::fmt::{Display, Formatter};

/// Default duplicate cutoff in meters.
pub const DEFAULT_SPATIAL_THRESHOLD_M: f64 = 2.0;

/// Knobs for one validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
    /// Closed type set. `None` accepts any non-blank type.
    pub allowed_types: Option<Vec<TagType>>,
    /// Duplicate-distance cutoff in meters.
    pub spatial_threshold_m: f64,
    /// Whether to search `existing` for duplicates.
    pub check_duplicates: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allowed_types: None,
            spatial_threshold_m: DEFAULT_SPATIAL_THRESHOLD_M,
            check_duplicates: true,
        }
    }
}

impl ValidationOptions {
    /// Options restricted to the standard five tag types.
    pub fn standard() -> Self {
        Self {
            allowed_types: Some(TagType::standard()),
            ..Self::default()
        }
    }
}

/// Fatal validation problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingType,
    UnsupportedType(String),
    MissingCoordinate(&'static str),
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
    MissingId,
    /// Another stored tag already uses this id.
    IdConflict(TagId),
    /// Persistence medium failed; reported through the same channel as
    /// validation so callers check one place.
    Storage(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingType => write!(f, "type is required"),
            Self::UnsupportedType(value) => write!(f, "type `{value}` is not an allowed type"),
            Self::MissingCoordinate(field) => write!(f, "{field} is required"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "lat {value} is outside the valid range [-90, 90]")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "lon {value} is outside the valid range [-180, 180]")
            }
            Self::MissingId => write!(f, "id is required"),
            Self::IdConflict(id) => write!(f, "a tag with id `{id}` already exists"),
            Self::Storage(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

/// Non-fatal validation finding.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Source was present but not `user|osm|model`; treated as `user`.
    UnknownSource(String),
    /// Confidence outside `[0, 1]`; dropped.
    ConfidenceOutOfRange(f64),
    /// Confidence given for a non-model source; dropped.
    ConfidenceIgnored(SourceKind),
    /// OSM id given for a non-OSM source; dropped.
    OsmIdIgnored(SourceKind),
    DuplicatesFound(usize),
}

impl Display for ValidationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSource(value) => {
                write!(f, "unknown source `{value}`; expected user|osm|model")
            }
            Self::ConfidenceOutOfRange(value) => {
                write!(f, "confidence {value} is outside [0, 1] and was ignored")
            }
            Self::ConfidenceIgnored(source) => {
                write!(f, "confidence is only kept for model tags, not `{source}`")
            }
            Self::OsmIdIgnored(source) => {
                write!(f, "osmId is only kept for osm tags, not `{source}`")
            }
            Self::DuplicatesFound(count) => write!(f, "found {count} duplicate tag(s) nearby"),
        }
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// Stored tags the candidate duplicates, in storage order.
    pub duplicates: Vec<Tag>,
}

impl ValidationReport {
    pub(crate) fn failure(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    /// `true` when no errors were collected. Duplicates never affect this.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "valid");
        }
        write!(f, "{}", self.error_messages().join("; "))
    }
}

/// Validator bound to one set of options.
#[derive(Debug, Clone, Default)]
pub struct TagValidator {
    options: ValidationOptions,
}

impl TagValidator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validates `candidate` against `existing`.
    pub fn validate(&self, candidate: &TagDraft, existing: &[Tag]) -> ValidationReport {
        self.resolve(candidate, existing).0
    }

    /// Validates `candidate` and builds the canonical tag.
    ///
    /// The returned tag is `Some` iff the report is valid. Dropped fields
    /// (unknown source, misplaced confidence/osmId) are reflected in the tag
    /// and announced as warnings.
    pub fn resolve(&self, candidate: &TagDraft, existing: &[Tag]) -> (ValidationReport, Option<Tag>) {
        let mut report = ValidationReport::default();

        let kind = match candidate.kind.as_deref().and_then(TagType::parse) {
            Some(kind) => {
                if let Some(allowed) = &self.options.allowed_types {
                    if !allowed.contains(&kind) {
                        report
                            .errors
                            .push(ValidationError::UnsupportedType(kind.to_string()));
                    }
                }
                Some(kind)
            }
            None => {
                report.errors.push(ValidationError::MissingType);
                None
            }
        };

        let lat = match candidate.lat {
            Some(value) if is_valid_lat(value) => Some(value),
            Some(value) => {
                report.errors.push(ValidationError::LatitudeOutOfRange(value));
                None
            }
            None => {
                report.errors.push(ValidationError::MissingCoordinate("lat"));
                None
            }
        };

        let lon = match candidate.lon {
            Some(value) if is_valid_lon(value) => Some(value),
            Some(value) => {
                report.errors.push(ValidationError::LongitudeOutOfRange(value));
                None
            }
            None => {
                report.errors.push(ValidationError::MissingCoordinate("lon"));
                None
            }
        };

        let id = non_blank(candidate.id.as_deref());
        if id.is_none() {
            report.errors.push(ValidationError::MissingId);
        }

        let source = resolve_source(candidate, &mut report.warnings);

        let (Some(kind), Some(lat), Some(lon), Some(id)) = (kind, lat, lon, id) else {
            return (report, None);
        };
        if !report.errors.is_empty() {
            return (report, None);
        }

        let readonly = candidate
            .readonly
            .unwrap_or_else(|| source.kind().is_feed());
        let tag = Tag {
            id,
            kind,
            lat,
            lon,
            source,
            address: non_blank(candidate.address.as_deref()),
            notes: non_blank(candidate.notes.as_deref()),
            timestamp: candidate.timestamp.unwrap_or_else(Utc::now),
            readonly,
        };

        if self.options.check_duplicates {
            let duplicates = find_duplicates(&tag, existing, self.options.spatial_threshold_m);
            if !duplicates.is_empty() {
                report
                    .warnings
                    .push(ValidationWarning::DuplicatesFound(duplicates.len()));
                report.duplicates = duplicates;
            }
        }

        (report, Some(tag))
    }
}

/// Validates `candidate` against `existing` with the given options.
pub fn validate_tag(
    candidate: &TagDraft,
    existing: &[Tag],
    options: &ValidationOptions,
) -> ValidationReport {
    TagValidator::new(options.clone()).validate(candidate, existing)
}

/// Duplicate predicate: same type and within `threshold_m` meters.
pub fn is_duplicate(a: &Tag, b: &Tag, threshold_m: f64) -> bool {
    a.kind == b.kind && distance_between(a.position(), b.position()) <= threshold_m
}

/// Returns every tag in `existing` that `candidate` duplicates, in order.
pub fn find_duplicates(candidate: &Tag, existing: &[Tag], threshold_m: f64) -> Vec<Tag> {
    existing
        .iter()
        .filter(|tag| is_duplicate(candidate, tag, threshold_m))
        .cloned()
        .collect()
}

fn resolve_source(candidate: &TagDraft, warnings: &mut Vec<ValidationWarning>) -> TagSource {
    let kind = match candidate.source.as_deref() {
        None => SourceKind::User,
        Some(raw) => SourceKind::parse(raw).unwrap_or_else(|| {
            warnings.push(ValidationWarning::UnknownSource(raw.to_string()));
            SourceKind::User
        }),
    };

    let confidence = match candidate.confidence {
        Some(value) if !(0.0..=1.0).contains(&value) => {
            warnings.push(ValidationWarning::ConfidenceOutOfRange(value));
            None
        }
        other => other,
    };
    if confidence.is_some() && kind != SourceKind::Model {
        warnings.push(ValidationWarning::ConfidenceIgnored(kind));
    }

    let osm_id = non_blank(candidate.osm_id.as_deref());
    if osm_id.is_some() && kind != SourceKind::Osm {
        warnings.push(ValidationWarning::OsmIdIgnored(kind));
    }

    match kind {
        SourceKind::User => TagSource::User,
        SourceKind::Osm => TagSource::Osm { osm_id },
        SourceKind::Model => TagSource::Model { confidence },
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{non_blank, resolve_source, ValidationWarning};
    use crate::model::tag::{SourceKind, TagDraft, TagSource};

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  a ")), Some("a".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn resolve_source_defaults_unknown_to_user_with_warning() {
        let draft = TagDraft {
            source: Some("satellite".to_string()),
            ..TagDraft::default()
        };
        let mut warnings = Vec::new();
        assert_eq!(resolve_source(&draft, &mut warnings), TagSource::User);
        assert_eq!(
            warnings,
            vec![ValidationWarning::UnknownSource("satellite".to_string())]
        );
    }

    #[test]
    fn resolve_source_drops_nan_confidence() {
        let draft = TagDraft {
            source: Some("model".to_string()),
            confidence: Some(f64::NAN),
            ..TagDraft::default()
        };
        let mut warnings = Vec::new();
        let source = resolve_source(&draft, &mut warnings);
        assert_eq!(source, TagSource::Model { confidence: None });
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            ValidationWarning::ConfidenceOutOfRange(_)
        ));
    }

    #[test]
    fn resolve_source_drops_confidence_on_user_tags() {
        let draft = TagDraft {
            confidence: Some(0.4),
            ..TagDraft::default()
        };
        let mut warnings = Vec::new();
        assert_eq!(resolve_source(&draft, &mut warnings), TagSource::User);
        assert_eq!(
            warnings,
            vec![ValidationWarning::ConfidenceIgnored(SourceKind::User)]
        );
    }
}
