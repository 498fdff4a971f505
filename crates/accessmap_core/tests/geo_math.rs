use accessmap_core::geo::{nearest_segment, polyline_distance, EARTH_RADIUS_M};
use accessmap_core::{distance, distance_between, distance_to_segment, LatLng};

#[test]
fn distance_is_zero_for_identical_points() {
    assert_eq!(distance(34.6835, -82.8375, 34.6835, -82.8375), 0.0);
}

#[test]
fn distance_is_symmetric() {
    let forward = distance(34.6835, -82.8375, 34.6901, -82.8302);
    let backward = distance(34.6901, -82.8302, 34.6835, -82.8375);
    assert!((forward - backward).abs() < 1e-9);
}

#[test]
fn one_degree_of_latitude_matches_earth_radius() {
    let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let measured = distance(0.0, 0.0, 1.0, 0.0);
    assert!((measured - expected).abs() < 1e-6, "measured {measured}");
    assert!((measured - 111_195.0).abs() < 1.0);
}

#[test]
fn micro_degree_offsets_measure_about_one_meter() {
    let a = LatLng::new(34.6835, -82.8375);
    let b = LatLng::new(34.68351, -82.83751);
    let meters = distance_between(a, b);
    assert!(meters > 1.0 && meters < 2.0, "measured {meters}");
}

#[test]
fn antipodal_points_do_not_produce_nan() {
    let meters = distance(0.0, 0.0, 0.0, 180.0);
    assert!(meters.is_finite());
    assert!((meters - EARTH_RADIUS_M * std::f64::consts::PI).abs() < 1.0);
}

#[test]
fn degenerate_segment_measures_to_its_start() {
    let start = LatLng::new(10.0, 10.0);
    let point = LatLng::new(10.001, 10.0);
    let to_segment = distance_to_segment(point, start, start);
    assert!((to_segment - distance_between(point, start)).abs() < 1e-9);
}

#[test]
fn point_beyond_segment_end_measures_to_the_endpoint() {
    let start = LatLng::new(0.0, 0.0);
    let end = LatLng::new(0.0, 0.001);
    let point = LatLng::new(0.0, 0.002);
    let to_segment = distance_to_segment(point, start, end);
    assert!((to_segment - distance_between(point, end)).abs() < 1e-6);
}

#[test]
fn point_on_segment_measures_zero() {
    let start = LatLng::new(0.0, 0.0);
    let end = LatLng::new(0.0, 0.002);
    let to_segment = distance_to_segment(LatLng::new(0.0, 0.001), start, end);
    assert!(to_segment < 1e-6);
}

#[test]
fn polyline_helpers_need_two_points() {
    let point = LatLng::new(0.0, 0.0);
    assert_eq!(polyline_distance(point, &[]), None);
    assert_eq!(polyline_distance(point, &[LatLng::new(1.0, 1.0)]), None);
    assert_eq!(nearest_segment(point, &[LatLng::new(1.0, 1.0)]), None);
}

#[test]
fn nearest_segment_reports_the_closest_leg() {
    let track = [
        LatLng::new(0.0, 0.0),
        LatLng::new(0.0, 0.01),
        LatLng::new(0.01, 0.01),
    ];
    let (index, meters) = nearest_segment(LatLng::new(0.005, 0.0101), &track).unwrap();
    assert_eq!(index, 1);
    assert!(meters < 15.0, "measured {meters}");
}
