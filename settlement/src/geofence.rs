//! Geo-fence evaluation
//!
//! Haversine great-circle distance is the single canonical arrival check:
//! every "has this vehicle arrived" decision in the system goes through
//! [`is_within`]. Pure and deterministic.

use crate::types::{GeoFence, GeoPoint};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (Haversine)
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Whether a reported position is inside the delivery fence
pub fn is_within(point: GeoPoint, fence: &GeoFence) -> bool {
    distance_m(point, fence.center) <= fence.radius_m
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAIROBI: GeoPoint = GeoPoint {
        lat: -1.2921,
        lng: 36.8219,
    };
    const MOMBASA: GeoPoint = GeoPoint {
        lat: -4.0435,
        lng: 39.6682,
    };

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_m(NAIROBI, NAIROBI), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let forward = distance_m(NAIROBI, MOMBASA);
        let back = distance_m(MOMBASA, NAIROBI);
        assert!((forward - back).abs() < 1e-6);
    }

    #[test]
    fn test_known_distance() {
        // Nairobi to Mombasa is roughly 440 km great-circle
        let d = distance_m(NAIROBI, MOMBASA);
        assert!(d > 430_000.0 && d < 450_000.0, "got {}", d);
    }

    #[test]
    fn test_within_at_exact_center() {
        let fence = GeoFence {
            center: NAIROBI,
            radius_m: 200.0,
        };
        assert!(is_within(NAIROBI, &fence));
    }

    #[test]
    fn test_within_boundary() {
        let fence = GeoFence {
            center: NAIROBI,
            radius_m: 200.0,
        };
        // ~111 m north of center (0.001 degrees of latitude)
        let near = GeoPoint::new(NAIROBI.lat + 0.001, NAIROBI.lng);
        assert!(is_within(near, &fence));

        // ~1.1 km north is outside a 200 m fence
        let far = GeoPoint::new(NAIROBI.lat + 0.01, NAIROBI.lng);
        assert!(!is_within(far, &fence));
    }
}
