use accessmap_core::{
    detect_obstacles, distance_to_segment, HazardTypes, LatLng, ObstacleDetector, Tag, TagSource,
    TagType,
};

fn route() -> Vec<LatLng> {
    vec![
        LatLng::new(0.0, 0.0),
        LatLng::new(0.0, 0.001),
        LatLng::new(0.0, 0.002),
    ]
}

fn tag(id: &str, kind: TagType, lat: f64, lon: f64) -> Tag {
    Tag::with_id(id, kind, LatLng::new(lat, lon), TagSource::User)
}

#[test]
fn obstacle_near_route_respects_corridor_width() {
    let tags = vec![tag("rock", TagType::Obstacle, 0.0001, 0.001)];
    let hazards = HazardTypes::default();

    let wide = detect_obstacles(&route(), &tags, &hazards, 20.0);
    assert_eq!(wide.len(), 1);
    assert_eq!(wide[0].id, "rock");

    assert!(detect_obstacles(&route(), &tags, &hazards, 5.0).is_empty());
}

#[test]
fn corridor_boundary_is_inclusive() {
    let obstacle = tag("edge", TagType::Obstacle, 0.00015, 0.0005);
    let d = distance_to_segment(obstacle.position(), route()[0], route()[1]);
    let tags = vec![obstacle];

    assert_eq!(
        detect_obstacles(&route(), &tags, &HazardTypes::default(), d).len(),
        1
    );
    assert!(detect_obstacles(&route(), &tags, &HazardTypes::default(), d - 1.0).is_empty());
}

#[test]
fn short_routes_never_warn() {
    let tags = vec![tag("rock", TagType::Obstacle, 0.0, 0.0)];
    let detector = ObstacleDetector::default();
    assert!(detector.detect(&[], &tags).is_empty());
    assert!(detector.detect(&[LatLng::new(0.0, 0.0)], &tags).is_empty());
}

#[test]
fn non_hazard_types_are_ignored_by_default() {
    let tags = vec![
        tag("ramp", TagType::Ramp, 0.0, 0.001),
        tag("lift", TagType::Elevator, 0.0, 0.0015),
    ];
    assert!(ObstacleDetector::default().detect(&route(), &tags).is_empty());
}

#[test]
fn hits_keep_input_order_and_report_segment() {
    let tags = vec![
        tag("late", TagType::Obstacle, 0.00005, 0.0018),
        tag("far", TagType::Obstacle, 0.01, 0.001),
        tag("early", TagType::Obstacle, -0.00005, 0.0002),
    ];

    let hits = ObstacleDetector::default().detect_warnings(&route(), &tags);
    let ids: Vec<&str> = hits.iter().map(|hit| hit.tag.id.as_str()).collect();
    assert_eq!(ids, vec!["late", "early"]);
    assert_eq!(hits[0].segment_index, 1);
    assert_eq!(hits[1].segment_index, 0);
    assert!(hits.iter().all(|hit| hit.distance_m <= 20.0));
}

#[test]
fn custom_hazard_set_widens_detection() {
    let tags = vec![
        tag("rock", TagType::Obstacle, 0.0, 0.001),
        tag("works", TagType::Other("construction".to_string()), 0.0, 0.0015),
        tag("ramp", TagType::Ramp, 0.0, 0.0005),
    ];
    let mut hazards = HazardTypes::new([TagType::Other("construction".to_string())]);
    assert!(!hazards.contains(&TagType::Obstacle));
    hazards.insert(TagType::Obstacle);

    let detector = ObstacleDetector::new(hazards, 20.0);
    let ids: Vec<String> = detector
        .detect(&route(), &tags)
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    assert_eq!(ids, vec!["rock", "works"]);
}

#[test]
fn custom_hazard_labels_match_regardless_of_case() {
    let kind = TagType::parse("Road Works").unwrap();
    let hazards = HazardTypes::new(TagType::parse("road_works"));
    let tags = vec![tag("works", kind, 0.0, 0.001)];

    let detector = ObstacleDetector::new(hazards, 20.0);
    assert_eq!(detector.detect(&route(), &tags).len(), 1);
}
