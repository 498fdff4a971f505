use accessmap_core::db::open_db;
use accessmap_core::{
    InMemoryTagRepository, JsonFileTagRepository, LatLng, NamespaceSummary, RepoError,
    SaveOptions, SourceKind,
    SqliteTagRepository, StoreError, Tag, TagDraft, TagPatch, TagSource, TagStore, TagType,
    UnavailableTagRepository, ValidationError, ValidationOptions,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

fn memory_store() -> TagStore<InMemoryTagRepository> {
    TagStore::new(InMemoryTagRepository::new())
}

fn model_tag(id: &str, lat: f64, lon: f64) -> Tag {
    Tag::with_id(
        id,
        TagType::Obstacle,
        LatLng::new(lat, lon),
        TagSource::Model {
            confidence: Some(0.8),
        },
    )
}

#[test]
fn nearby_duplicate_is_rejected_then_allowed_then_merged() {
    let store = memory_store();
    let base = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();

    let first = store.save_tag(
        &TagDraft::new("Ramp", 34.6835, -82.8375)
            .with_id("a")
            .with_timestamp(base),
        &SaveOptions::default(),
    );
    assert!(first.success);
    assert_eq!(first.saved_tag.as_ref().map(|tag| tag.id.as_str()), Some("a"));

    let candidate = TagDraft::new("Ramp", 34.68351, -82.83751)
        .with_id("b")
        .with_timestamp(base + Duration::minutes(5));
    let rejected = store.save_tag(&candidate, &SaveOptions::default());
    assert!(!rejected.success);
    assert!(rejected.validation.is_valid());
    assert_eq!(rejected.validation.duplicates.len(), 1);
    assert_eq!(rejected.validation.duplicates[0].id, "a");
    assert!(rejected.saved_tag.is_none());
    assert_eq!(store.get_tags().unwrap().len(), 1);

    let forced = store.save_tag(&candidate, &SaveOptions::allowing_duplicates());
    assert!(forced.success);
    assert_eq!(forced.validation.duplicates.len(), 1);
    assert_eq!(store.get_tags().unwrap().len(), 2);

    assert_eq!(store.deduplicate_tags(2.0).unwrap(), 1);
    let remaining = store.get_tags().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "b");
}

#[test]
fn invalid_save_never_reaches_the_repository() {
    let store = memory_store();
    let outcome = store.save_tag(
        &TagDraft::new("Bench", 95.0, 0.0),
        &SaveOptions::default(),
    );
    assert!(!outcome.success);
    assert!(outcome.validation.errors.len() >= 2);
    assert!(store.get_tags().unwrap().is_empty());
}

#[test]
fn reused_id_is_rejected() {
    let store = memory_store();
    assert!(store
        .save_tag(&TagDraft::new("Ramp", 1.0, 1.0).with_id("same"), &SaveOptions::default())
        .success);

    let outcome = store.save_tag(
        &TagDraft::new("Elevator", 40.0, 40.0).with_id("same"),
        &SaveOptions::default(),
    );
    assert!(!outcome.success);
    assert!(outcome
        .validation
        .errors
        .contains(&ValidationError::IdConflict("same".to_string())));
}

#[test]
fn skip_validation_bypasses_type_set_and_duplicates_only() {
    let store = memory_store();
    let skip = SaveOptions {
        skip_validation: true,
        ..SaveOptions::default()
    };

    assert!(store.save_tag(&TagDraft::new("Bench", 1.0, 1.0), &skip).success);
    assert!(store.save_tag(&TagDraft::new("Bench", 1.0, 1.0), &skip).success);
    assert!(!store
        .save_tag(&TagDraft::new("Bench", 1.0, 1.0), &SaveOptions::default())
        .success);
    assert!(!store.save_tag(&TagDraft::new("Bench", 120.0, 1.0), &skip).success);
    assert_eq!(store.get_tags().unwrap().len(), 2);
}

#[test]
fn update_and_delete_distinguish_missing_tags() {
    let store = memory_store();
    let update = store.update_tag("ghost", &TagPatch::kind(TagType::Ramp));
    assert!(matches!(update, Err(StoreError::NotFound(id)) if id == "ghost"));
    assert!(matches!(
        store.delete_tag("ghost"),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn update_relabels_and_revalidates() {
    let store = memory_store();
    let saved = store
        .save_tag(&TagDraft::new("Ramp", 5.0, 5.0), &SaveOptions::default())
        .saved_tag
        .unwrap();

    let updated = store
        .update_tag(&saved.id, &TagPatch::kind(TagType::Elevator))
        .unwrap();
    assert_eq!(updated.kind, TagType::Elevator);
    assert_eq!(updated.timestamp, saved.timestamp);
    assert_eq!(store.get_tag(&saved.id).unwrap().unwrap().kind, TagType::Elevator);

    let unsupported = store.update_tag(&saved.id, &TagPatch::kind(TagType::Other("Bench".into())));
    assert!(matches!(unsupported, Err(StoreError::Validation(_))));

    let moved = TagPatch {
        lat: Some(-91.0),
        ..TagPatch::default()
    };
    assert!(matches!(
        store.update_tag(&saved.id, &moved),
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.get_tag(&saved.id).unwrap().unwrap().lat, 5.0);

    store.delete_tag(&saved.id).unwrap();
    assert!(store.get_tag(&saved.id).unwrap().is_none());
}

#[test]
fn clear_and_invalid_dedupe_threshold() {
    let store = memory_store();
    store.save_tag(&TagDraft::new("Ramp", 5.0, 5.0), &SaveOptions::default());
    store.clear_tags().unwrap();
    assert!(store.get_tags().unwrap().is_empty());

    assert!(matches!(
        store.deduplicate_tags(-1.0),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.deduplicate_tags(f64::NAN),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn unavailable_medium_is_reported_not_hidden() {
    let store = TagStore::new(UnavailableTagRepository::new("no storage"));

    let outcome = store.save_tag(&TagDraft::new("Ramp", 1.0, 1.0), &SaveOptions::default());
    assert!(!outcome.success);
    assert!(matches!(
        outcome.validation.errors.as_slice(),
        [ValidationError::Storage(_)]
    ));

    assert!(matches!(
        store.get_tags(),
        Err(StoreError::Repo(RepoError::Unavailable(_)))
    ));
    assert!(store.clear_tags().is_err());
}

#[test]
fn concurrent_saves_are_not_lost() {
    let store = Arc::new(memory_store());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for index in 0..10 {
                    let lat = f64::from(worker) + f64::from(index) * 0.01;
                    let outcome =
                        store.save_tag(&TagDraft::new("Ramp", lat, 0.0), &SaveOptions::default());
                    assert!(outcome.success, "{}", outcome.validation);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get_tags().unwrap().len(), 80);
}

#[test]
fn replace_feed_swaps_only_that_source() {
    let store = memory_store();
    store.save_tag(&TagDraft::new("Ramp", 1.0, 1.0).with_id("user-1"), &SaveOptions::default());
    store
        .replace_feed(SourceKind::Model, vec![model_tag("model-0", 2.0, 2.0)])
        .unwrap();

    let replaced = store
        .replace_feed(
            SourceKind::Model,
            vec![model_tag("model-0", 3.0, 3.0), model_tag("model-1", 4.0, 4.0)],
        )
        .unwrap();
    assert_eq!(replaced.removed, 1);
    assert_eq!(replaced.inserted, 2);

    let ids: Vec<String> = store.get_tags().unwrap().into_iter().map(|tag| tag.id).collect();
    assert_eq!(ids, vec!["user-1", "model-0", "model-1"]);

    assert!(matches!(
        store.replace_feed(SourceKind::User, Vec::new()),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.replace_feed(SourceKind::Osm, vec![model_tag("m", 1.0, 1.0)]),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.replace_feed(
            SourceKind::Model,
            vec![model_tag("dup", 1.0, 1.0), model_tag("dup", 2.0, 2.0)]
        ),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn replace_feed_drops_out_of_range_confidence_on_every_medium() {
    let overconfident = || {
        vec![Tag::with_id(
            "model-0",
            TagType::Obstacle,
            LatLng::new(2.0, 2.0),
            TagSource::Model {
                confidence: Some(1.7),
            },
        )]
    };

    let memory = memory_store();
    memory
        .replace_feed(SourceKind::Model, overconfident())
        .unwrap();
    let stored = memory.get_tags().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].confidence(), None);

    let dir = tempfile::tempdir().unwrap();
    let repo =
        SqliteTagRepository::try_new(open_db(dir.path().join("tags.db")).unwrap(), "feed").unwrap();
    let sqlite = TagStore::new(repo);
    let replaced = sqlite
        .replace_feed(SourceKind::Model, overconfident())
        .unwrap();
    assert_eq!(replaced.inserted, 1);
    let persisted = sqlite.get_tags().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, "model-0");
    assert_eq!(persisted[0].confidence(), None);
}

#[test]
fn statistics_and_groupings_follow_the_collection() {
    let store = memory_store();
    store.save_tag(&TagDraft::new("Ramp", 0.0, 0.0), &SaveOptions::default());
    store.save_tag(&TagDraft::new("Ramp", 0.0, 0.001), &SaveOptions::default());
    store
        .replace_feed(SourceKind::Model, vec![model_tag("model-0", 0.0, 0.0005)])
        .unwrap();

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_tags, 3);
    assert_eq!(stats.by_source.get(&SourceKind::User), Some(&2));
    assert_eq!(stats.by_source.get(&SourceKind::Model), Some(&1));
    assert_eq!(stats.by_type.get("Ramp"), Some(&2));
    assert_eq!(stats.by_type.get("Obstacle"), Some(&1));

    let grouped = store.tags_by_source().unwrap();
    assert_eq!(grouped.user.len(), 2);
    assert_eq!(grouped.get(SourceKind::Model).len(), 1);
    assert_eq!(grouped.total(), 3);

    let near = store.tags_near(LatLng::new(0.0, 0.0), 60.0).unwrap();
    assert_eq!(near.len(), 2);
    assert!(store.tags_near(LatLng::new(100.0, 0.0), 1.0).is_err());
}

#[test]
fn open_type_set_store_accepts_custom_labels() {
    let store = TagStore::with_options(InMemoryTagRepository::new(), ValidationOptions::default());
    assert!(store
        .save_tag(&TagDraft::new("Curb Cut", 1.0, 1.0), &SaveOptions::default())
        .success);
}

#[test]
fn sqlite_store_round_trips_and_isolates_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.db");

    let saved = {
        let repo = SqliteTagRepository::try_new(open_db(&path).unwrap(), "clemson").unwrap();
        let store = TagStore::new(repo);
        let mut draft = TagDraft::new("Tactile Path", 34.6835, -82.8375)
            .with_source(SourceKind::Osm)
            .with_osm_id("987")
            .with_address("116 Sigma Drive");
        draft.notes = Some("faded paint".to_string());
        let outcome = store.save_tag(&draft, &SaveOptions::default());
        assert!(outcome.success, "{}", outcome.validation);
        outcome.saved_tag.unwrap()
    };

    let repo = SqliteTagRepository::try_new(open_db(&path).unwrap(), "clemson").unwrap();
    let loaded = TagStore::new(repo).get_tags().unwrap();
    assert_eq!(loaded, vec![saved]);

    let other = SqliteTagRepository::try_new(open_db(&path).unwrap(), "greenville").unwrap();
    assert!(TagStore::new(other).get_tags().unwrap().is_empty());
}

#[test]
fn sqlite_repo_rejects_blank_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("tags.db")).unwrap();
    assert!(matches!(
        SqliteTagRepository::try_new(conn, "  "),
        Err(RepoError::InvalidNamespace(_))
    ));
}

#[test]
fn sqlite_store_is_shareable_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let repo =
        SqliteTagRepository::try_new(open_db(dir.path().join("tags.db")).unwrap(), "shared")
            .unwrap();
    let store = Arc::new(TagStore::new(repo));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let draft = TagDraft::new("Entrance", f64::from(worker), 0.0);
                assert!(store.save_tag(&draft, &SaveOptions::default()).success);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get_tags().unwrap().len(), 4);
}

#[test]
fn json_file_store_persists_between_instances() {
    let dir = tempfile::tempdir().unwrap();

    let store = TagStore::new(JsonFileTagRepository::new(dir.path(), "campus.v2").unwrap());
    assert!(store.get_tags().unwrap().is_empty());
    let saved = store
        .save_tag(&TagDraft::new("Elevator", 10.0, 20.0), &SaveOptions::default())
        .saved_tag
        .unwrap();

    let reopened = TagStore::new(JsonFileTagRepository::new(dir.path(), "campus.v2").unwrap());
    assert_eq!(reopened.get_tags().unwrap(), vec![saved]);
    assert!(dir.path().join("campus.v2.json").exists());
    assert!(!dir.path().join("campus.v2.json.tmp").exists());

    assert!(JsonFileTagRepository::new(dir.path(), "../escape").is_err());
}

fn summary(namespace: &str, tag_count: usize) -> NamespaceSummary {
    NamespaceSummary {
        namespace: namespace.to_string(),
        tag_count,
    }
}

#[test]
fn sqlite_namespaces_are_listed_with_tag_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.db");
    assert!(SqliteTagRepository::list_namespaces(&open_db(&path).unwrap())
        .unwrap()
        .is_empty());

    for (namespace, count) in [("greenville", 1), ("clemson", 2)] {
        let repo = SqliteTagRepository::try_new(open_db(&path).unwrap(), namespace).unwrap();
        let store = TagStore::new(repo);
        for index in 0..count {
            let draft = TagDraft::new("Ramp", f64::from(index), 0.0);
            assert!(store.save_tag(&draft, &SaveOptions::default()).success);
        }
    }

    let listed = SqliteTagRepository::list_namespaces(&open_db(&path).unwrap()).unwrap();
    assert_eq!(listed, vec![summary("clemson", 2), summary("greenville", 1)]);
}

#[test]
fn json_file_namespaces_are_listed_from_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(JsonFileTagRepository::list_namespaces(dir.path().join("missing"))
        .unwrap()
        .is_empty());

    let campus = TagStore::new(JsonFileTagRepository::new(dir.path(), "campus.v2").unwrap());
    campus.save_tag(&TagDraft::new("Elevator", 10.0, 20.0), &SaveOptions::default());
    campus.save_tag(&TagDraft::new("Ramp", 11.0, 20.0), &SaveOptions::default());
    let cleared = TagStore::new(JsonFileTagRepository::new(dir.path(), "downtown").unwrap());
    cleared.save_tag(&TagDraft::new("Ramp", 1.0, 1.0), &SaveOptions::default());
    cleared.clear_tags().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a namespace").unwrap();
    std::fs::write(dir.path().join("stale.json.tmp"), "[]").unwrap();

    let listed = JsonFileTagRepository::list_namespaces(dir.path()).unwrap();
    assert_eq!(listed, vec![summary("campus.v2", 2)]);
}
