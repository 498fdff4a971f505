//! ML detector output mapping.
//!
//! # Responsibility
//! - Turn classifier detections into `model` drafts for the store.
//! - Filter low-confidence detections before they reach validation.
//!
//! # Invariants
//! - Class indices follow the detector's label order: ramp, elevator,
//!   tactile path, entrance, obstacle.
//! - A detection without coordinates (explicit or encoded in the image
//!   name) is skipped; coordinates are never invented.

use crate::geo::LatLng;
use crate::model::tag::{SourceKind, TagDraft, TagType};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Detections scoring below this are dropped by default.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

static TILE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_(-?\d+(?:\.\d+)?)_(-?\d+(?:\.\d+)?)\.(?:png|jpe?g)$")
        .expect("valid tile name regex")
});

/// One classifier result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    pub class_index: usize,
    pub confidence: f64,
    #[serde(default)]
    pub position: Option<LatLng>,
    /// Source tile name, e.g. `tile_34.67_-82.48.png`.
    #[serde(default)]
    pub image_name: Option<String>,
}

impl Detection {
    /// Explicit position, falling back to coordinates in the image name.
    pub fn resolved_position(&self) -> Option<LatLng> {
        self.position
            .or_else(|| self.image_name.as_deref().and_then(coords_from_tile_name))
    }
}

/// Drafts built from a batch of detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionImport {
    pub drafts: Vec<TagDraft>,
    /// Dropped for scoring below the minimum confidence.
    pub filtered: usize,
    /// Dropped for an unknown class or missing coordinates.
    pub skipped: usize,
}

/// Maps a detector class index onto a tag type.
pub fn class_index_to_type(index: usize) -> Option<TagType> {
    match index {
        0 => Some(TagType::Ramp),
        1 => Some(TagType::Elevator),
        2 => Some(TagType::TactilePath),
        3 => Some(TagType::Entrance),
        4 => Some(TagType::Obstacle),
        _ => None,
    }
}

/// Extracts `(lat, lon)` from names like `tile_34.67_-82.48.png`.
pub fn coords_from_tile_name(name: &str) -> Option<LatLng> {
    let captures = TILE_NAME_RE.captures(name)?;
    let lat = captures.get(1)?.as_str().parse().ok()?;
    let lon = captures.get(2)?.as_str().parse().ok()?;
    Some(LatLng::new(lat, lon))
}

/// Maps detections to drafts, dropping those below `min_confidence`.
///
/// Ids are `model-<n>` with `n` counting accepted detections.
pub fn detections_to_drafts(detections: &[Detection], min_confidence: f64) -> DetectionImport {
    let mut import = DetectionImport::default();

    for detection in detections {
        if detection.confidence.is_nan() || detection.confidence < min_confidence {
            import.filtered += 1;
            continue;
        }
        let (Some(kind), Some(position)) = (
            class_index_to_type(detection.class_index),
            detection.resolved_position(),
        ) else {
            import.skipped += 1;
            continue;
        };

        let mut draft = TagDraft::new(kind.as_str(), round_to(position.lat, 6), round_to(position.lon, 6))
            .with_id(format!("model-{}", import.drafts.len()))
            .with_source(SourceKind::Model)
            .with_confidence(round_to(detection.confidence, 3));
        draft.readonly = Some(true);
        import.drafts.push(draft);
    }

    info!(
        "event=detection_import module=ingest status=ok mapped={} filtered={} skipped={}",
        import.drafts.len(),
        import.filtered,
        import.skipped
    );
    import
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
