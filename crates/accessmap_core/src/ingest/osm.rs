//! OpenStreetMap feature mapping.
//!
//! # Responsibility
//! - Decode Overpass API JSON elements.
//! - Map OSM key/value tags onto accessibility tag types and build
//!   `TagDraft`s for the store.
//! - Render the Overpass query that fetches those features.
//!
//! # Invariants
//! - Mapping is a pure function of the element; network lookups (reverse
//!   geocoding, the Overpass request itself) belong to the caller.
//! - Elements without usable coordinates or a mapped type are skipped and
//!   counted, never turned into half-filled drafts.

use crate::geo::LatLng;
use crate::model::tag::{SourceKind, TagDraft, TagType};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Overpass `out center;` response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OsmElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmElementKind {
    Node,
    Way,
    Relation,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OsmCenter {
    pub lat: f64,
    pub lon: f64,
}

/// One Overpass element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub kind: OsmElementKind,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Present on ways/relations queried with `out center`.
    #[serde(default)]
    pub center: Option<OsmCenter>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmElement {
    /// Node coordinates, or the computed center of a way.
    pub fn position(&self) -> Option<LatLng> {
        match self.kind {
            OsmElementKind::Node => Some(LatLng::new(self.lat?, self.lon?)),
            OsmElementKind::Way => self.center.map(|c| LatLng::new(c.lat, c.lon)),
            OsmElementKind::Relation | OsmElementKind::Unknown => None,
        }
    }
}

/// Drafts built from a batch of elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsmImport {
    pub drafts: Vec<TagDraft>,
    /// Elements without coordinates or a mapped type.
    pub skipped: usize,
}

/// Maps OSM key/value tags onto a tag type.
///
/// First matching rule wins:
/// 1. `ramp=yes` or `ramp:wheelchair=yes` → Ramp
/// 2. `highway=elevator` or `elevator=yes` → Elevator
/// 3. `tactile_paving=yes` → Tactile Path
/// 4. any `entrance` key → Entrance
/// 5. `kerb=lowered|flush` or `barrier=kerb` → Ramp (kerb cut)
/// 6. `wheelchair=yes` → Ramp
pub fn map_osm_tags_to_type(tags: &BTreeMap<String, String>) -> Option<TagType> {
    let is = |key: &str, value: &str| tags.get(key).map(String::as_str) == Some(value);

    if is("ramp", "yes") || is("ramp:wheelchair", "yes") {
        return Some(TagType::Ramp);
    }
    if is("highway", "elevator") || is("elevator", "yes") {
        return Some(TagType::Elevator);
    }
    if is("tactile_paving", "yes") {
        return Some(TagType::TactilePath);
    }
    if tags.contains_key("entrance") {
        return Some(TagType::Entrance);
    }
    if is("kerb", "lowered") || is("kerb", "flush") || is("barrier", "kerb") {
        return Some(TagType::Ramp);
    }
    if is("wheelchair", "yes") {
        return Some(TagType::Ramp);
    }
    None
}

/// Builds an `osm` draft from one element, or `None` when it is unusable.
pub fn osm_element_to_draft(element: &OsmElement) -> Option<TagDraft> {
    let position = element.position()?;
    let kind = map_osm_tags_to_type(&element.tags)?;

    let mut draft = TagDraft::new(kind.as_str(), round6(position.lat), round6(position.lon))
        .with_id(format!("osm-{}", element.id))
        .with_source(SourceKind::Osm)
        .with_osm_id(element.id.to_string());
    draft.address = address_from_tags(&element.tags);
    draft.readonly = Some(true);
    Some(draft)
}

/// Maps a batch of elements, counting the ones that were skipped.
pub fn osm_elements_to_drafts(elements: &[OsmElement]) -> OsmImport {
    let mut import = OsmImport::default();
    for element in elements {
        match osm_element_to_draft(element) {
            Some(draft) => import.drafts.push(draft),
            None => import.skipped += 1,
        }
    }

    info!(
        "event=osm_import module=ingest status=ok mapped={} skipped={}",
        import.drafts.len(),
        import.skipped
    );
    import
}

/// Renders the Overpass QL query for accessibility features around a point.
pub fn build_overpass_query(center: LatLng, radius_m: u32) -> String {
    const SELECTORS: &[(&str, &str)] = &[
        ("node", r#"["ramp"="yes"]"#),
        ("way", r#"["ramp"="yes"]"#),
        ("node", r#"["ramp:wheelchair"="yes"]"#),
        ("node", r#"["highway"="elevator"]"#),
        ("way", r#"["highway"="elevator"]"#),
        ("node", r#"["elevator"="yes"]"#),
        ("node", r#"["tactile_paving"="yes"]"#),
        ("way", r#"["tactile_paving"="yes"]"#),
        ("node", r#"["kerb"="lowered"]"#),
        ("node", r#"["kerb"="flush"]"#),
        ("node", r#"["barrier"="kerb"]"#),
        ("node", r#"["entrance"]"#),
        ("node", r#"["wheelchair"="yes"]"#),
        ("way", r#"["wheelchair"="yes"]"#),
    ];

    let around = format!("(around:{radius_m},{},{})", center.lat, center.lon);
    let mut query = String::from("[out:json][timeout:25];\n(\n");
    for (element, filter) in SELECTORS {
        let _ = writeln!(query, "  {element}{filter}{around};");
    }
    query.push_str(");\nout center;\n");
    query
}

fn address_from_tags(tags: &BTreeMap<String, String>) -> Option<String> {
    let non_empty = |key: &str| {
        tags.get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let parts: Vec<&str> = [non_empty("addr:housenumber"), non_empty("addr:street")]
        .into_iter()
        .flatten()
        .collect();
    if !parts.is_empty() {
        return Some(parts.join(" "));
    }
    non_empty("name").map(str::to_string)
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
