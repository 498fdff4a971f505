//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose tag store and route warning use cases to Dart via FRB.
//! - Flatten core types into plain envelopes the UI can render directly.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every store call is scoped to a caller-provided namespace.
//! - Store writes from this process are serialized through one lock.

use accessmap_core::db::open_db;
use accessmap_core::ingest::detection::{detections_to_drafts, Detection, DEFAULT_MIN_CONFIDENCE};
use accessmap_core::route::DEFAULT_CORRIDOR_M;
use accessmap_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    HazardTypes, LatLng, ObstacleDetector, SaveOptions, SourceKind, SqliteTagRepository, Tag,
    TagDraft, TagPatch, TagStore, TagType, TagValidator, ValidationOptions,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

const TAG_DB_FILE_NAME: &str = "accessmap_tags.sqlite3";
static TAG_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static STORE_LOCK: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Flat tag projection for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TagItem {
    pub id: String,
    /// Display label, e.g. `Tactile Path`.
    pub tag_type: String,
    pub lat: f64,
    pub lon: f64,
    /// `user|osm|model`.
    pub source: String,
    pub confidence: Option<f64>,
    pub osm_id: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub readonly: bool,
}

/// Input shape for `tag_save`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagInput {
    /// Generated when absent.
    pub id: Option<String>,
    pub tag_type: String,
    pub lat: f64,
    pub lon: f64,
    /// Defaults to `user`.
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Result envelope of `tag_save`.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSaveResponse {
    pub ok: bool,
    pub tag: Option<TagItem>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Nearby same-type tags that blocked (or accompanied) the save.
    pub duplicates: Vec<TagItem>,
    pub message: String,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct TagListResponse {
    pub ok: bool,
    pub items: Vec<TagItem>,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagActionResponse {
    pub ok: bool,
    /// Tag touched by the action, when there is exactly one.
    pub tag_id: Option<String>,
    /// Number of records written or removed.
    pub affected: u32,
    pub message: String,
}

impl TagActionResponse {
    fn success(message: impl Into<String>, tag_id: Option<String>, affected: u32) -> Self {
        Self {
            ok: true,
            tag_id,
            affected,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            tag_id: None,
            affected: 0,
            message: message.into(),
        }
    }
}

/// One route vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub lat: f64,
    pub lon: f64,
}

/// One hazard near the route.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleItem {
    pub tag: TagItem,
    pub distance_m: f64,
    pub segment_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteObstaclesResponse {
    pub ok: bool,
    pub items: Vec<ObstacleItem>,
    pub message: String,
}

/// Count per source or type label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStatsResponse {
    pub ok: bool,
    pub total: u32,
    pub by_source: Vec<TagCount>,
    pub by_type: Vec<TagCount>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceListResponse {
    pub ok: bool,
    /// Namespace name with its tag count, ordered by name.
    pub items: Vec<TagCount>,
    pub message: String,
}

/// One classifier output for `tag_import_detections`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionInput {
    pub class_index: u32,
    pub confidence: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Tile name carrying coordinates, e.g. `tile_34.67_-82.48.png`.
    pub image_name: Option<String>,
}

/// Validates and saves one tag.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Duplicates block the save unless `allow_duplicates` is set.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_save(namespace: String, input: TagInput, allow_duplicates: bool) -> TagSaveResponse {
    let mut draft = TagDraft::new(input.tag_type, input.lat, input.lon);
    if let Some(id) = input.id {
        draft.id = Some(id);
    }
    draft.source = input.source;
    draft.confidence = input.confidence;
    draft.address = input.address;
    draft.notes = input.notes;

    let options = SaveOptions {
        allow_duplicates,
        ..SaveOptions::default()
    };
    let outcome = match with_tag_store(&namespace, |store| Ok(store.save_tag(&draft, &options))) {
        Ok(outcome) => outcome,
        Err(err) => {
            return TagSaveResponse {
                ok: false,
                tag: None,
                errors: vec![err.clone()],
                warnings: Vec::new(),
                duplicates: Vec::new(),
                message: format!("tag_save failed: {err}"),
            };
        }
    };

    let message = if outcome.success {
        "Tag saved.".to_string()
    } else if outcome.validation.has_duplicates() && outcome.validation.is_valid() {
        format!(
            "Found {} similar tag(s) nearby.",
            outcome.validation.duplicates.len()
        )
    } else {
        format!("tag_save failed: {}", outcome.validation)
    };

    TagSaveResponse {
        ok: outcome.success,
        tag: outcome.saved_tag.as_ref().map(to_tag_item),
        errors: outcome.validation.error_messages(),
        warnings: outcome.validation.warning_messages(),
        duplicates: outcome.validation.duplicates.iter().map(to_tag_item).collect(),
        message,
    }
}

/// Lists every tag in the namespace in stored order.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_list(namespace: String) -> TagListResponse {
    match with_tag_store(&namespace, |store| {
        store.get_tags().map_err(|err| err.to_string())
    }) {
        Ok(tags) => TagListResponse {
            ok: true,
            message: format!("Found {} tag(s).", tags.len()),
            items: tags.iter().map(to_tag_item).collect(),
        },
        Err(err) => TagListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("tag_list failed: {err}"),
        },
    }
}

/// Re-labels one tag.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_update_type(namespace: String, tag_id: String, tag_type: String) -> TagActionResponse {
    let Some(kind) = TagType::parse(&tag_type) else {
        return TagActionResponse::failure("tag_update_type failed: tag type cannot be blank");
    };
    match with_tag_store(&namespace, |store| {
        store
            .update_tag(&tag_id, &TagPatch::kind(kind))
            .map_err(|err| err.to_string())
    }) {
        Ok(tag) => TagActionResponse::success("Tag updated.", Some(tag.id), 1),
        Err(err) => TagActionResponse::failure(format!("tag_update_type failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn tag_delete(namespace: String, tag_id: String) -> TagActionResponse {
    match with_tag_store(&namespace, |store| {
        store.delete_tag(&tag_id).map_err(|err| err.to_string())
    }) {
        Ok(()) => TagActionResponse::success("Tag deleted.", Some(tag_id), 1),
        Err(err) => TagActionResponse::failure(format!("tag_delete failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn tag_clear(namespace: String) -> TagActionResponse {
    match with_tag_store(&namespace, |store| {
        let count = store.get_tags().map_err(|err| err.to_string())?.len();
        store.clear_tags().map_err(|err| err.to_string())?;
        Ok(count)
    }) {
        Ok(count) => TagActionResponse::success("Tags cleared.", None, saturating_u32(count)),
        Err(err) => TagActionResponse::failure(format!("tag_clear failed: {err}")),
    }
}

/// Merges duplicate clusters; `affected` is the number of removed tags.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_deduplicate(namespace: String, threshold_m: f64) -> TagActionResponse {
    match with_tag_store(&namespace, |store| {
        store
            .deduplicate_tags(threshold_m)
            .map_err(|err| err.to_string())
    }) {
        Ok(removed) => TagActionResponse::success(
            format!("Removed {removed} duplicate tag(s)."),
            None,
            saturating_u32(removed),
        ),
        Err(err) => TagActionResponse::failure(format!("tag_deduplicate failed: {err}")),
    }
}

/// Replaces the namespace's model feed with fresh classifier output.
///
/// Detections below `min_confidence` (default 0.5) are dropped.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_import_detections(
    namespace: String,
    detections: Vec<DetectionInput>,
    min_confidence: Option<f64>,
) -> TagActionResponse {
    let detections: Vec<Detection> = detections
        .into_iter()
        .map(|input| Detection {
            class_index: input.class_index as usize,
            confidence: input.confidence,
            position: input.lat.zip(input.lon).map(|(lat, lon)| LatLng::new(lat, lon)),
            image_name: input.image_name,
        })
        .collect();
    let import = detections_to_drafts(
        &detections,
        min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
    );

    match with_tag_store(&namespace, |store| {
        let validator = TagValidator::new(ValidationOptions {
            check_duplicates: false,
            ..store.options().clone()
        });
        let mut tags = Vec::with_capacity(import.drafts.len());
        for draft in &import.drafts {
            match validator.resolve(draft, &[]) {
                (_, Some(tag)) => tags.push(tag),
                (report, None) => return Err(format!("detection rejected: {report}")),
            }
        }
        store
            .replace_feed(SourceKind::Model, tags)
            .map_err(|err| err.to_string())
    }) {
        Ok(replaced) => TagActionResponse::success(
            format!(
                "Imported {} detection(s); replaced {}, filtered {}, skipped {}.",
                replaced.inserted, replaced.removed, import.filtered, import.skipped
            ),
            None,
            saturating_u32(replaced.inserted),
        ),
        Err(err) => TagActionResponse::failure(format!("tag_import_detections failed: {err}")),
    }
}

/// Per-source and per-type counts for the namespace.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_stats(namespace: String) -> TagStatsResponse {
    match with_tag_store(&namespace, |store| {
        store.statistics().map_err(|err| err.to_string())
    }) {
        Ok(stats) => TagStatsResponse {
            ok: true,
            total: saturating_u32(stats.total_tags),
            by_source: stats
                .by_source
                .iter()
                .map(|(source, count)| TagCount {
                    label: source.to_string(),
                    count: saturating_u32(*count),
                })
                .collect(),
            by_type: stats
                .by_type
                .iter()
                .map(|(label, count)| TagCount {
                    label: label.clone(),
                    count: saturating_u32(*count),
                })
                .collect(),
            message: String::new(),
        },
        Err(err) => TagStatsResponse {
            ok: false,
            total: 0,
            by_source: Vec::new(),
            by_type: Vec::new(),
            message: format!("tag_stats failed: {err}"),
        },
    }
}

/// Every namespace holding tags, with its tag count.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn tag_namespaces() -> NamespaceListResponse {
    let listed = {
        let _guard = STORE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        open_db(resolve_tag_db_path())
            .map_err(|err| format!("tag DB open failed: {err}"))
            .and_then(|conn| {
                SqliteTagRepository::list_namespaces(&conn).map_err(|err| err.to_string())
            })
    };

    match listed {
        Ok(namespaces) => NamespaceListResponse {
            ok: true,
            items: namespaces
                .into_iter()
                .map(|summary| TagCount {
                    label: summary.namespace,
                    count: saturating_u32(summary.tag_count),
                })
                .collect(),
            message: String::new(),
        },
        Err(err) => NamespaceListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("tag_namespaces failed: {err}"),
        },
    }
}

/// Hazard tags within `corridor_m` meters of the route.
///
/// Input semantics:
/// - `hazard_types`: labels treated as hazards; empty means `Obstacle` only.
/// - `corridor_m`: defaults to 20m when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn route_obstacles(
    namespace: String,
    route: Vec<RoutePoint>,
    hazard_types: Vec<String>,
    corridor_m: Option<f64>,
) -> RouteObstaclesResponse {
    let hazards = {
        let parsed: Vec<TagType> = hazard_types
            .iter()
            .filter_map(|label| TagType::parse(label))
            .collect();
        if parsed.is_empty() {
            HazardTypes::default()
        } else {
            HazardTypes::new(parsed)
        }
    };
    let detector = ObstacleDetector::new(hazards, corridor_m.unwrap_or(DEFAULT_CORRIDOR_M));

    let route: Vec<LatLng> = route
        .into_iter()
        .map(|point| LatLng::new(point.lat, point.lon))
        .collect();

    match with_tag_store(&namespace, |store| {
        store.get_tags().map_err(|err| err.to_string())
    }) {
        Ok(tags) => {
            let items: Vec<ObstacleItem> = detector
                .detect_warnings(&route, &tags)
                .into_iter()
                .map(|hit| ObstacleItem {
                    tag: to_tag_item(&hit.tag),
                    distance_m: hit.distance_m,
                    segment_index: saturating_u32(hit.segment_index),
                })
                .collect();
            RouteObstaclesResponse {
                ok: true,
                message: if items.is_empty() {
                    "Route is clear.".to_string()
                } else {
                    format!("Found {} obstacle(s) near the route.", items.len())
                },
                items,
            }
        }
        Err(err) => RouteObstaclesResponse {
            ok: false,
            items: Vec::new(),
            message: format!("route_obstacles failed: {err}"),
        },
    }
}

fn resolve_tag_db_path() -> PathBuf {
    TAG_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("ACCESSMAP_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(TAG_DB_FILE_NAME)
        })
        .clone()
}

fn with_tag_store<T>(
    namespace: &str,
    f: impl FnOnce(&TagStore<SqliteTagRepository>) -> Result<T, String>,
) -> Result<T, String> {
    // A panicked holder leaves no partial state behind; the DB transaction
    // already rolled back.
    let _guard = STORE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let db_path = resolve_tag_db_path();
    let conn = open_db(&db_path).map_err(|err| {
        warn!("event=ffi_store_open module=ffi status=error error={err}");
        format!("tag DB open failed: {err}")
    })?;
    let repo = SqliteTagRepository::try_new(conn, namespace)
        .map_err(|err| format!("tag repo init failed: {err}"))?;
    let store = TagStore::new(repo);
    f(&store)
}

fn to_tag_item(tag: &Tag) -> TagItem {
    TagItem {
        id: tag.id.clone(),
        tag_type: tag.kind.to_string(),
        lat: tag.lat,
        lon: tag.lon,
        source: tag.source_kind().to_string(),
        confidence: tag.confidence(),
        osm_id: tag.osm_id().map(str::to_string),
        address: tag.address.clone(),
        notes: tag.notes.clone(),
        timestamp: tag.timestamp.to_rfc3339(),
        readonly: tag.readonly,
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
