//! Read-side projections over a tag collection.

use crate::geo::{distance_between, LatLng};
use crate::model::tag::{SourceKind, Tag};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate counts for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagStatistics {
    pub total_tags: usize,
    pub by_source: BTreeMap<SourceKind, usize>,
    /// Keyed by the type's display label.
    pub by_type: BTreeMap<String, usize>,
}

impl TagStatistics {
    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut stats = Self {
            total_tags: tags.len(),
            ..Self::default()
        };
        for tag in tags {
            *stats.by_source.entry(tag.source_kind()).or_default() += 1;
            *stats
                .by_type
                .entry(tag.kind.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }
}

/// Tags split by origin, each group in collection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagsBySource {
    pub user: Vec<Tag>,
    pub osm: Vec<Tag>,
    pub model: Vec<Tag>,
}

impl TagsBySource {
    pub fn from_tags(tags: &[Tag]) -> Self {
        let mut grouped = Self::default();
        for tag in tags {
            let bucket = match tag.source_kind() {
                SourceKind::User => &mut grouped.user,
                SourceKind::Osm => &mut grouped.osm,
                SourceKind::Model => &mut grouped.model,
            };
            bucket.push(tag.clone());
        }
        grouped
    }

    pub fn get(&self, kind: SourceKind) -> &[Tag] {
        match kind {
            SourceKind::User => &self.user,
            SourceKind::Osm => &self.osm,
            SourceKind::Model => &self.model,
        }
    }

    pub fn total(&self) -> usize {
        self.user.len() + self.osm.len() + self.model.len()
    }
}

/// Tags within `radius_m` meters (inclusive) of `center`, in input order.
pub fn tags_within_radius(tags: &[Tag], center: LatLng, radius_m: f64) -> Vec<Tag> {
    tags.iter()
        .filter(|tag| distance_between(center, tag.position()) <= radius_m)
        .cloned()
        .collect()
}
