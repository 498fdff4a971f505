//! Great-circle geometry on WGS84 degrees.
//!
//! # Responsibility
//! - Compute point-to-point and point-to-segment distances in meters.
//! - Stay pure: no I/O, no allocation beyond the caller's slices.
//!
//! # Invariants
//! - `distance(a, b) == distance(b, a)` and `distance(a, a) == 0`.
//! - Segment distance never undershoots the distance to the closest point of
//!   the finite segment (the infinite line is never used).

use serde::{Deserialize, Serialize};

/// Fixed mean Earth radius used by every distance in this crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degenerate-segment cutoff in squared scaled degrees.
const DEGENERATE_SEGMENT_SQ: f64 = 1e-20;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns whether both components are finite and inside WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        is_valid_lat(self.lat) && is_valid_lon(self.lon)
    }
}

pub fn is_valid_lat(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_lon(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

/// Haversine distance in meters between two coordinates.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);

    // Rounding can push `h` marginally above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Haversine distance in meters between two points.
pub fn distance_between(a: LatLng, b: LatLng) -> f64 {
    distance(a.lat, a.lon, b.lat, b.lon)
}

/// Shortest distance in meters from `point` to the segment `start..=end`.
///
/// The closest location is found with an equirectangular projection scaled
/// by the cosine of the segment's mean latitude, clamped to the segment, and
/// then measured with the haversine distance. This is accurate for the
/// short segments produced by walking-route providers.
///
/// A zero-length segment reduces to `distance_between(point, start)`.
pub fn distance_to_segment(point: LatLng, start: LatLng, end: LatLng) -> f64 {
    let closest = closest_point_on_segment(point, start, end);
    distance_between(point, closest)
}

/// Minimum distance in meters from `point` to any segment of `polyline`.
///
/// Returns `None` when the polyline has fewer than two points.
pub fn polyline_distance(point: LatLng, polyline: &[LatLng]) -> Option<f64> {
    nearest_segment(point, polyline).map(|(_, distance_m)| distance_m)
}

/// Returns `(segment_index, distance_m)` of the segment closest to `point`.
///
/// Ties keep the earliest segment.
pub fn nearest_segment(point: LatLng, polyline: &[LatLng]) -> Option<(usize, f64)> {
    polyline
        .windows(2)
        .map(|pair| distance_to_segment(point, pair[0], pair[1]))
        .enumerate()
        .fold(None, |best, (index, distance_m)| match best {
            Some((_, best_m)) if best_m <= distance_m => best,
            _ => Some((index, distance_m)),
        })
}

fn closest_point_on_segment(point: LatLng, start: LatLng, end: LatLng) -> LatLng {
    let cos_lat = ((start.lat + end.lat) / 2.0).to_radians().cos();

    let dx = (end.lon - start.lon) * cos_lat;
    let dy = end.lat - start.lat;
    let px = (point.lon - start.lon) * cos_lat;
    let py = point.lat - start.lat;

    let len_sq = dx * dx + dy * dy;
    if len_sq < DEGENERATE_SEGMENT_SQ {
        return start;
    }

    let t = ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0);
    LatLng {
        lat: start.lat + t * (end.lat - start.lat),
        lon: start.lon + t * (end.lon - start.lon),
    }
}

#[cfg(test)]
mod tests {
    use super::{closest_point_on_segment, nearest_segment, LatLng};

    #[test]
    fn closest_point_clamps_before_segment_start() {
        let start = LatLng::new(48.0, 16.0);
        let end = LatLng::new(48.0, 17.0);
        let closest = closest_point_on_segment(LatLng::new(48.0, 15.5), start, end);
        assert_eq!(closest, start);
    }

    #[test]
    fn closest_point_projects_onto_interior() {
        let start = LatLng::new(48.0, 16.0);
        let end = LatLng::new(48.0, 17.0);
        let closest = closest_point_on_segment(LatLng::new(48.1, 16.5), start, end);
        assert!((closest.lat - 48.0).abs() < 1e-9);
        assert!((closest.lon - 16.5).abs() < 1e-9);
    }

    #[test]
    fn nearest_segment_picks_second_leg_of_l_shape() {
        let track = [
            LatLng::new(48.0, 16.0),
            LatLng::new(48.0, 17.0),
            LatLng::new(49.0, 17.0),
        ];
        let (index, _) = nearest_segment(LatLng::new(48.5, 17.1), &track).unwrap();
        assert_eq!(index, 1);
    }
}
