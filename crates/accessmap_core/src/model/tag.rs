//! Accessibility tag domain model.
//!
//! # Responsibility
//! - Define the canonical georeferenced record shared by user, OSM and model
//!   feeds.
//! - Define the unvalidated candidate (`TagDraft`) and partial update
//!   (`TagPatch`) shapes handed in by collaborators.
//!
//! # Invariants
//! - `id` is stable and never reused for another tag.
//! - Every `Tag` carries exactly one in-range `(lat, lon)` pair.
//! - `confidence` only exists on model tags and `osm_id` only on OSM tags;
//!   `TagSource` makes other combinations unrepresentable.
//! - `readonly` is data, not an enforcement mechanism.

use crate::geo::LatLng;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable tag identifier.
///
/// Opaque string so feed-specific ids (`osm-123`, `model-4`) survive import.
pub type TagId = String;

/// Accessibility feature category.
///
/// The five named variants form the standard type set. `Other` carries
/// caller-defined types and is only accepted when validation runs with an
/// open type set. `Other` labels are kept in the folded form `parse`
/// produces (lowercase, `_`/`-` as spaces) so equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TagType {
    Ramp,
    Elevator,
    TactilePath,
    Entrance,
    Obstacle,
    Other(String),
}

impl TagType {
    /// Returns the standard closed type set.
    pub fn standard() -> Vec<TagType> {
        vec![
            Self::Ramp,
            Self::Elevator,
            Self::TactilePath,
            Self::Entrance,
            Self::Obstacle,
        ]
    }

    /// Display label used on the wire and in storage.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ramp => "Ramp",
            Self::Elevator => "Elevator",
            Self::TactilePath => "Tactile Path",
            Self::Entrance => "Entrance",
            Self::Obstacle => "Obstacle",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Parses a type label.
    ///
    /// Matching is case-insensitive and treats `_`/`-` as spaces, so
    /// `tactile_path` and `Tactile Path` are the same type. Unknown non-blank
    /// labels become `Other` with the folded label, so `Curb Cut` and
    /// `curb_cut` are the same type too. Blank input yields `None`.
    pub fn parse(value: &str) -> Option<TagType> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        let folded = trimmed.to_ascii_lowercase().replace(['_', '-'], " ");
        let parsed = match folded.as_str() {
            "ramp" => Self::Ramp,
            "elevator" => Self::Elevator,
            "tactile path" => Self::TactilePath,
            "entrance" => Self::Entrance,
            "obstacle" => Self::Obstacle,
            _ => Self::Other(folded.clone()),
        };
        Some(parsed)
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Display for TagType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a blank string is decoded as a `TagType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankTagTypeError;

impl Display for BlankTagTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag type must not be blank")
    }
}

impl Error for BlankTagTypeError {}

impl TryFrom<String> for TagType {
    type Error = BlankTagTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TagType::parse(&value).ok_or(BlankTagTypeError)
    }
}

impl From<TagType> for String {
    fn from(value: TagType) -> Self {
        match value {
            TagType::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// Field-less discriminant of `TagSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Manual entry; mutable by the end user.
    User,
    /// OpenStreetMap import; replaced wholesale on re-fetch.
    Osm,
    /// ML detector output; replaced wholesale on re-fetch.
    Model,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Osm => "osm",
            Self::Model => "model",
        }
    }

    /// Parses `user|osm|model` (case-insensitive, trimmed).
    pub fn parse(value: &str) -> Option<SourceKind> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "osm" => Some(Self::Osm),
            "model" => Some(Self::Model),
            _ => None,
        }
    }

    /// Whether tags of this source are owned by an external feed.
    pub fn is_feed(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a tag together with the metadata only that origin carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum TagSource {
    User,
    Osm {
        #[serde(rename = "osmId", default, skip_serializing_if = "Option::is_none")]
        osm_id: Option<String>,
    },
    Model {
        /// Detector score in `[0, 1]`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
}

impl TagSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::User => SourceKind::User,
            Self::Osm { .. } => SourceKind::Osm,
            Self::Model { .. } => SourceKind::Model,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Model { confidence } => *confidence,
            _ => None,
        }
    }

    pub fn osm_id(&self) -> Option<&str> {
        match self {
            Self::Osm { osm_id } => osm_id.as_deref(),
            _ => None,
        }
    }
}

/// Canonical accessibility tag record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    /// Serialized as `type` to match the external schema.
    #[serde(rename = "type")]
    pub kind: TagType,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub source: TagSource,
    /// Best-effort reverse-geocoded label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time. Later timestamps win merge ties.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub readonly: bool,
}

impl Tag {
    /// Creates a tag with a generated id and the current timestamp.
    ///
    /// `readonly` is derived from the source: feed tags are read-only.
    pub fn new(kind: TagType, position: LatLng, source: TagSource) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind, position, source)
    }

    /// Creates a tag with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally. This
    /// constructor does not validate coordinates.
    pub fn with_id(
        id: impl Into<TagId>,
        kind: TagType,
        position: LatLng,
        source: TagSource,
    ) -> Self {
        let readonly = source.kind().is_feed();
        Self {
            id: id.into(),
            kind,
            lat: position.lat,
            lon: position.lon,
            source,
            address: None,
            notes: None,
            timestamp: Utc::now(),
            readonly,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lon)
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.source.confidence()
    }

    pub fn osm_id(&self) -> Option<&str> {
        self.source.osm_id()
    }
}

/// Unvalidated candidate record built by a collaborator.
///
/// Every field is optional so validation can report all structural problems
/// at once instead of failing at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagDraft {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub osm_id: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub readonly: Option<bool>,
}

impl TagDraft {
    /// Starts a user draft with a generated id.
    pub fn new(kind: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            kind: Some(kind.into()),
            lat: Some(lat),
            lon: Some(lon),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source.as_str().to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_osm_id(mut self, osm_id: impl Into<String>) -> Self {
        self.osm_id = Some(osm_id.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<&Tag> for TagDraft {
    fn from(tag: &Tag) -> Self {
        Self {
            id: Some(tag.id.clone()),
            kind: Some(tag.kind.as_str().to_string()),
            lat: Some(tag.lat),
            lon: Some(tag.lon),
            source: Some(tag.source_kind().as_str().to_string()),
            confidence: tag.confidence(),
            osm_id: tag.osm_id().map(str::to_string),
            address: tag.address.clone(),
            notes: tag.notes.clone(),
            timestamp: Some(tag.timestamp),
            readonly: Some(tag.readonly),
        }
    }
}

/// Field-level partial update for an existing tag.
///
/// `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagPatch {
    #[serde(rename = "type")]
    pub kind: Option<TagType>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub readonly: Option<bool>,
}

impl TagPatch {
    /// Patch that only changes the tag type.
    pub fn kind(kind: TagType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merges set fields into `tag`. Identity, source and timestamp are
    /// never touched.
    pub fn apply_to(&self, tag: &mut Tag) {
        if let Some(kind) = &self.kind {
            tag.kind = kind.clone();
        }
        if let Some(lat) = self.lat {
            tag.lat = lat;
        }
        if let Some(lon) = self.lon {
            tag.lon = lon;
        }
        if let Some(address) = &self.address {
            tag.address = Some(address.clone());
        }
        if let Some(notes) = &self.notes {
            tag.notes = Some(notes.clone());
        }
        if let Some(readonly) = self.readonly {
            tag.readonly = readonly;
        }
    }
}
