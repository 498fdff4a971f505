//! Route-obstacle detection.
//!
//! # Responsibility
//! - Select hazard tags that lie within a corridor around a route polyline.
//!
//! # Invariants
//! - Pure: no I/O and no mutation of the route or tag inputs.
//! - Routes with fewer than two points never yield obstacles.
//! - The corridor boundary is inclusive (`distance <= corridor_m`).
//! - Output keeps the relative order of the input tags.

use crate::geo::{nearest_segment, LatLng};
use crate::model::tag::{Tag, TagType};
use std::collections::BTreeSet;

/// Default corridor half-width in meters.
pub const DEFAULT_CORRIDOR_M: f64 = 20.0;

/// Tag types that count as hazards for route warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardTypes {
    types: BTreeSet<TagType>,
}

impl Default for HazardTypes {
    fn default() -> Self {
        Self::new([TagType::Obstacle])
    }
}

impl HazardTypes {
    pub fn new(types: impl IntoIterator<Item = TagType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, kind: TagType) -> bool {
        self.types.insert(kind)
    }

    pub fn contains(&self, kind: &TagType) -> bool {
        self.types.contains(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagType> {
        self.types.iter()
    }
}

/// One hazard found along a route.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleHit {
    pub tag: Tag,
    /// Distance to the nearest route segment in meters.
    pub distance_m: f64,
    /// Index of the nearest segment's first point.
    pub segment_index: usize,
}

/// Detector configured with a hazard set and corridor width.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleDetector {
    hazards: HazardTypes,
    corridor_m: f64,
}

impl Default for ObstacleDetector {
    fn default() -> Self {
        Self::new(HazardTypes::default(), DEFAULT_CORRIDOR_M)
    }
}

impl ObstacleDetector {
    pub fn new(hazards: HazardTypes, corridor_m: f64) -> Self {
        Self {
            hazards,
            corridor_m,
        }
    }

    pub fn hazards(&self) -> &HazardTypes {
        &self.hazards
    }

    pub fn corridor_m(&self) -> f64 {
        self.corridor_m
    }

    /// Returns hazard tags within the corridor, in input order.
    pub fn detect(&self, route: &[LatLng], tags: &[Tag]) -> Vec<Tag> {
        self.detect_warnings(route, tags)
            .into_iter()
            .map(|hit| hit.tag)
            .collect()
    }

    /// Like `detect`, but keeps the distance and nearest segment of each hit.
    pub fn detect_warnings(&self, route: &[LatLng], tags: &[Tag]) -> Vec<ObstacleHit> {
        if route.len() < 2 {
            return Vec::new();
        }

        tags.iter()
            .filter(|tag| self.hazards.contains(&tag.kind))
            .filter_map(|tag| {
                let (segment_index, distance_m) = nearest_segment(tag.position(), route)?;
                (distance_m <= self.corridor_m).then(|| ObstacleHit {
                    tag: tag.clone(),
                    distance_m,
                    segment_index,
                })
            })
            .collect()
    }
}

/// Returns the hazard tags lying within `corridor_m` of `route`.
pub fn detect_obstacles(
    route: &[LatLng],
    tags: &[Tag],
    hazards: &HazardTypes,
    corridor_m: f64,
) -> Vec<Tag> {
    ObstacleDetector::new(hazards.clone(), corridor_m).detect(route, tags)
}
