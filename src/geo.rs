//! Great-circle distance for the arrive-at-gate geofence.

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(distance_meters(12.97, 77.59, 12.97, 77.59) < 1e-6);
    }

    #[test]
    fn fifty_meter_geofence_boundary() {
        // ~0.00045 degrees of latitude is ~50 m.
        let near = distance_meters(12.9700, 77.5900, 12.97040, 77.5900);
        let far = distance_meters(12.9700, 77.5900, 12.97090, 77.5900);
        assert!(near < 50.0, "expected {near} < 50");
        assert!(far > 50.0, "expected {far} > 50");
    }

    #[test]
    fn known_city_pair_is_plausible() {
        // Bengaluru to Chennai is roughly 290 km.
        let d = distance_meters(12.9716, 77.5946, 13.0827, 80.2707);
        assert!((250_000.0..350_000.0).contains(&d), "got {d}");
    }
}
