// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance on a spherical Earth.

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers.
///
/// Inputs are decimal degrees; no range validation is performed.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRAGUE: (f64, f64) = (50.097416, 14.462274);
    const LONDON: (f64, f64) = (51.507222, -0.1275);

    #[test]
    fn test_identical_points_zero_distance() {
        assert_eq!(distance_km(PRAGUE.0, PRAGUE.1, PRAGUE.0, PRAGUE.1), 0.0);
        assert_eq!(distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let forward = distance_km(PRAGUE.0, PRAGUE.1, LONDON.0, LONDON.1);
        let backward = distance_km(LONDON.0, LONDON.1, PRAGUE.0, PRAGUE.1);
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn test_prague_to_london() {
        // Known great-circle distance is ~1034 km
        let d = distance_km(PRAGUE.0, PRAGUE.1, LONDON.0, LONDON.1);
        assert!((1020.0..1050.0).contains(&d), "got {} km", d);
    }

    #[test]
    fn test_short_distance() {
        // ~111 m per 0.001 degree of latitude
        let d = distance_km(50.0, 14.0, 50.001, 14.0);
        assert!((0.10..0.13).contains(&d), "got {} km", d);
    }
}
